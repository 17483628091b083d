//! Learned flood risk model.
//!
//! A fixed-architecture convolutional image-to-image network: two input
//! channels (normalized precipitation and terrain), one output channel of
//! risk, same height/width. Weights come from a JSON checkpoint loaded
//! non-strictly at process start; with no checkpoint the network runs on
//! its freshly-initialized weights, which is degraded but not an error.

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use flood_common::{BoundingBox, FloodError, FloodResult, ScalarRaster};

use crate::estimator::RiskEstimator;

/// Precipitation saturation for model input normalization, mm.
const PRECIP_CLIP_MM: f32 = 200.0;

/// A 3x3 same-padding convolution layer.
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Weights indexed [out][in][ky][kx], flattened.
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Conv2d {
    /// Kaiming-uniform initialized layer.
    fn new(in_channels: usize, out_channels: usize, rng: &mut impl Rng) -> Self {
        let fan_in = (in_channels * 9) as f32;
        let bound = (6.0 / fan_in).sqrt();
        let weight = (0..out_channels * in_channels * 9)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        Self {
            in_channels,
            out_channels,
            weight,
            bias: vec![0.0; out_channels],
        }
    }

    /// Forward pass over channel planes of `width` x `height` pixels,
    /// zero-padded at the borders. Output channels compute in parallel.
    fn forward(&self, input: &[Vec<f32>], width: usize, height: usize) -> Vec<Vec<f32>> {
        debug_assert_eq!(input.len(), self.in_channels);

        (0..self.out_channels)
            .into_par_iter()
            .map(|o| {
                let mut plane = vec![0.0f32; width * height];
                for (i, in_plane) in input.iter().enumerate() {
                    let kernel_base = (o * self.in_channels + i) * 9;
                    let kernel = &self.weight[kernel_base..kernel_base + 9];
                    for y in 0..height {
                        for x in 0..width {
                            let mut acc = 0.0f32;
                            for ky in 0..3usize {
                                let sy = y as isize + ky as isize - 1;
                                if sy < 0 || sy >= height as isize {
                                    continue;
                                }
                                for kx in 0..3usize {
                                    let sx = x as isize + kx as isize - 1;
                                    if sx < 0 || sx >= width as isize {
                                        continue;
                                    }
                                    acc += kernel[ky * 3 + kx]
                                        * in_plane[sy as usize * width + sx as usize];
                                }
                            }
                            plane[y * width + x] += acc;
                        }
                    }
                }
                let bias = self.bias[o];
                for v in plane.iter_mut() {
                    *v += bias;
                }
                plane
            })
            .collect()
    }
}

/// The fixed 2 -> 16 -> 16 -> 1 convolutional architecture.
#[derive(Debug, Clone)]
pub struct FloodNet {
    pub conv1: Conv2d,
    pub conv2: Conv2d,
    pub conv3: Conv2d,
}

impl FloodNet {
    /// Freshly-initialized (untrained) network.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self {
            conv1: Conv2d::new(2, 16, rng),
            conv2: Conv2d::new(16, 16, rng),
            conv3: Conv2d::new(16, 1, rng),
        }
    }

    /// Load a network, applying a checkpoint when one exists.
    ///
    /// A missing or unreadable checkpoint is not fatal: the network keeps
    /// its initialized weights and a warning is logged, matching the
    /// degraded-but-alive behavior of the rest of the pipeline.
    pub fn load(path: &Path, rng: &mut impl Rng) -> Self {
        let mut net = Self::new(rng);

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Checkpoint not found, using untrained weights");
                return net;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(checkpoint) => {
                net.apply_checkpoint(&checkpoint);
                info!(path = %path.display(), "Model checkpoint loaded");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid checkpoint, using untrained weights");
            }
        }

        net
    }

    /// Apply a checkpoint non-strictly.
    ///
    /// The container may be a bare name->tensor map or wrapped under a
    /// `state_dict` / `model_state_dict` key. Unknown entries are
    /// ignored, missing entries keep their initialized values, and
    /// length mismatches skip that entry with a warning.
    pub fn apply_checkpoint(&mut self, checkpoint: &Value) {
        let map = match checkpoint {
            Value::Object(map) => {
                if let Some(Value::Object(inner)) = map.get("state_dict") {
                    inner
                } else if let Some(Value::Object(inner)) = map.get("model_state_dict") {
                    inner
                } else {
                    map
                }
            }
            _ => {
                warn!("Checkpoint is not an object, keeping initialized weights");
                return;
            }
        };

        let mut applied = 0usize;
        for (key, value) in map {
            let slot: Option<&mut Vec<f32>> = match key.as_str() {
                "conv1.weight" => Some(&mut self.conv1.weight),
                "conv1.bias" => Some(&mut self.conv1.bias),
                "conv2.weight" => Some(&mut self.conv2.weight),
                "conv2.bias" => Some(&mut self.conv2.bias),
                "conv3.weight" => Some(&mut self.conv3.weight),
                "conv3.bias" => Some(&mut self.conv3.bias),
                _ => {
                    warn!(key = %key, "Ignoring unknown checkpoint entry");
                    None
                }
            };

            let Some(slot) = slot else { continue };
            let Some(values) = flatten_numbers(value) else {
                warn!(key = %key, "Checkpoint entry is not a numeric tensor, skipping");
                continue;
            };
            if values.len() != slot.len() {
                warn!(
                    key = %key,
                    expected = slot.len(),
                    actual = values.len(),
                    "Checkpoint tensor size mismatch, skipping"
                );
                continue;
            }
            slot.copy_from_slice(&values);
            applied += 1;
        }

        if applied < 6 {
            warn!(
                applied = applied,
                "Checkpoint applied partially, remaining layers keep initialized weights"
            );
        }
    }

    /// Run inference on pre-normalized input channels.
    ///
    /// Both inputs must already share the request grid.
    pub fn infer(&self, precip_norm: &ScalarRaster, terrain_norm: &ScalarRaster) -> ScalarRaster {
        let (height, width) = precip_norm.shape();
        let input = vec![precip_norm.data.clone(), terrain_norm.data.clone()];

        let mut x = self.conv1.forward(&input, width, height);
        relu(&mut x);
        let mut x = self.conv2.forward(&x, width, height);
        relu(&mut x);
        let x = self.conv3.forward(&x, width, height);

        let data = x[0].iter().map(|&v| sigmoid(v)).collect();
        ScalarRaster::from_data(width, height, data)
    }
}

fn relu(planes: &mut [Vec<f32>]) {
    for plane in planes {
        for v in plane.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Flatten an arbitrarily nested JSON array of numbers.
fn flatten_numbers(value: &Value) -> Option<Vec<f32>> {
    fn walk(value: &Value, out: &mut Vec<f32>) -> bool {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => {
                    out.push(f as f32);
                    true
                }
                None => false,
            },
            Value::Array(items) => items.iter().all(|item| walk(item, out)),
            _ => false,
        }
    }

    let mut out = Vec::new();
    walk(value, &mut out).then_some(out)
}

/// The learned-model estimation strategy.
pub struct LearnedModel {
    net: Arc<FloodNet>,
}

impl LearnedModel {
    pub fn new(net: Arc<FloodNet>) -> Self {
        Self { net }
    }
}

impl RiskEstimator for LearnedModel {
    fn name(&self) -> &'static str {
        "learned-model"
    }

    fn estimate(
        &self,
        precipitation: &ScalarRaster,
        terrain: &ScalarRaster,
        _bbox: &BoundingBox,
    ) -> FloodResult<ScalarRaster> {
        if precipitation.shape() != terrain.shape() {
            return Err(FloodError::ShapeMismatch {
                expected: precipitation.shape(),
                actual: terrain.shape(),
            });
        }

        let precip_norm = precipitation.map(|v| v.clamp(0.0, PRECIP_CLIP_MM) / PRECIP_CLIP_MM);

        // Terrain normalizes against its own observed range.
        let t_min = terrain.min();
        let t_max = terrain.max();
        let terrain_norm = if t_max > t_min {
            terrain.map(|v| (v.clamp(t_min, t_max) - t_min) / (t_max - t_min))
        } else {
            ScalarRaster::zeros(terrain.width, terrain.height)
        };

        Ok(self.net.infer(&precip_norm, &terrain_norm))
    }
}
