//! Scalar raster storage and statistics.

use serde::{Deserialize, Serialize};

/// A 2-D grid of scalar values in row-major order.
///
/// The physical unit depends on the producer: precipitation in mm over the
/// forecast horizon, elevation in meters, risk as a dimensionless score.
/// Rasters are created by one stage and passed by value to the next; no
/// stage mutates a raster it did not create.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRaster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl ScalarRaster {
    /// Create a raster filled with a constant value.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Create a raster of zeros.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Wrap an existing row-major buffer.
    ///
    /// Panics if the buffer length does not match `width * height`; that is
    /// a programming error, not a runtime condition.
    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "raster buffer length {} does not match {}x{}",
            data.len(),
            width,
            height
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Shape as (height, width), matching the row-major layout.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, col: usize, row: usize, value: f32) {
        self.data[row * self.width + col] = value;
    }

    /// Minimum over all values; 0 for an empty raster.
    pub fn min(&self) -> f32 {
        let min = self.data.iter().copied().fold(f32::INFINITY, f32::min);
        if min.is_finite() {
            min
        } else {
            0.0
        }
    }

    /// Maximum over all values; 0 for an empty raster.
    pub fn max(&self) -> f32 {
        let max = self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max.is_finite() {
            max
        } else {
            0.0
        }
    }

    /// Arithmetic mean; 0 for an empty raster.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        (self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64) as f32
    }

    /// Summary statistics over the raw values.
    pub fn stats(&self) -> RasterStats {
        RasterStats {
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
        }
    }

    /// Linear-interpolated percentile (0-100), matching numpy semantics.
    ///
    /// Non-finite values are excluded. Returns 0 when no finite values
    /// remain.
    pub fn percentile(&self, p: f32) -> f32 {
        let mut sorted: Vec<f32> = self.data.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_by(f32::total_cmp);

        let rank = (p.clamp(0.0, 100.0) as f64 / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        if lower == upper {
            return sorted[lower];
        }
        let frac = (rank - lower as f64) as f32;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }

    /// Apply a function to every value, producing a new raster.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Resample to a different resolution with bilinear interpolation.
    ///
    /// Total for any source shape down to a single row or column.
    pub fn resampled(&self, dst_width: usize, dst_height: usize) -> Self {
        if self.width == dst_width && self.height == dst_height {
            return self.clone();
        }

        let mut output = vec![0.0f32; dst_width * dst_height];

        let x_ratio = if dst_width > 1 {
            self.width.saturating_sub(1) as f32 / (dst_width - 1) as f32
        } else {
            0.0
        };
        let y_ratio = if dst_height > 1 {
            self.height.saturating_sub(1) as f32 / (dst_height - 1) as f32
        } else {
            0.0
        };

        for y in 0..dst_height {
            for x in 0..dst_width {
                let src_x = x as f32 * x_ratio;
                let src_y = y as f32 * y_ratio;

                let x1 = src_x.floor() as usize;
                let y1 = src_y.floor() as usize;
                let x2 = (x1 + 1).min(self.width - 1);
                let y2 = (y1 + 1).min(self.height - 1);

                let dx = src_x - x1 as f32;
                let dy = src_y - y1 as f32;

                let v11 = self.data[y1 * self.width + x1];
                let v21 = self.data[y1 * self.width + x2];
                let v12 = self.data[y2 * self.width + x1];
                let v22 = self.data[y2 * self.width + x2];

                let v1 = v11 * (1.0 - dx) + v21 * dx;
                let v2 = v12 * (1.0 - dx) + v22 * dx;
                output[y * dst_width + x] = v1 * (1.0 - dy) + v2 * dy;
            }
        }

        Self {
            width: dst_width,
            height: dst_height,
            data: output,
        }
    }
}

/// Min/max/mean summary reported at the response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}
