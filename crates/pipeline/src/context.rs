//! Shared pipeline resources.
//!
//! Everything that is loaded once at process start lives here and is
//! passed by reference into the orchestrator on every request: the
//! weather client, the optional terrain dataset, and the model weights.
//! There is no hidden global state; concurrent requests share the context
//! read-only. Both in-process engines are pure functions over their
//! inputs, so no execution lock is needed around them.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use risk_engine::{FloodNet, HeuristicFallback, LearnedModel, PhysicsSimulation, RiskEstimator};
use terrain::ElevationDataset;
use weather_sampler::source::WeatherSource;

/// Pipeline tuning knobs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Output raster width in pixels.
    pub image_width: usize,
    /// Output raster height in pixels.
    pub image_height: usize,
    /// Whether the physics tier participates in the estimator chain.
    pub enable_physics: bool,
    /// Fixed seed for the stochastic paths (synthetic weather, synthetic
    /// terrain). `None` seeds each request from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_width: 512,
            image_height: 512,
            enable_physics: true,
            rng_seed: None,
        }
    }
}

/// Load-once shared resources for the prediction pipeline.
pub struct PipelineContext {
    pub weather: Arc<dyn WeatherSource>,
    pub terrain: Option<ElevationDataset>,
    pub model: Arc<FloodNet>,
    pub config: PipelineConfig,
}

impl PipelineContext {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        terrain: Option<ElevationDataset>,
        model: Arc<FloodNet>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            weather,
            terrain,
            model,
            config,
        }
    }

    /// RNG for one request's stochastic paths.
    pub fn request_rng(&self) -> ChaCha8Rng {
        match self.config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::thread_rng().next_u64()),
        }
    }

    /// The estimator chain in fixed precedence order.
    ///
    /// Physics first (when enabled), then the learned model, then the
    /// heuristic, which cannot fail.
    pub fn estimator_chain(&self) -> Vec<Box<dyn RiskEstimator>> {
        let mut chain: Vec<Box<dyn RiskEstimator>> = Vec::with_capacity(3);
        if self.config.enable_physics {
            chain.push(Box::new(PhysicsSimulation));
        }
        chain.push(Box::new(LearnedModel::new(self.model.clone())));
        chain.push(Box::new(HeuristicFallback));
        chain
    }
}
