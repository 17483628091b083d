//! Application state and shared resources.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use pipeline::{PipelineConfig, PipelineContext};
use risk_engine::FloodNet;
use terrain::ElevationDataset;
use weather_sampler::OpenMeteoClient;

use crate::config::Settings;

/// Shared application state.
///
/// `ctx` is `None` only before startup loading completes; the predict
/// handler answers 503 in that window.
pub struct AppState {
    pub ctx: Option<PipelineContext>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load all shared resources: model weights, terrain dataset, and
    /// the weather client.
    pub fn new(settings: &Settings) -> Result<Self> {
        info!("Loading flood prediction model...");
        let model = Arc::new(FloodNet::load(&settings.model_path, &mut rand::thread_rng()));

        let terrain = match ElevationDataset::open(&settings.terrain_path) {
            Ok(dataset) => {
                info!(
                    path = %settings.terrain_path.display(),
                    width = dataset.width,
                    height = dataset.height,
                    crs = %dataset.crs,
                    "Terrain dataset loaded"
                );
                Some(dataset)
            }
            Err(e) => {
                warn!(
                    path = %settings.terrain_path.display(),
                    error = %e,
                    "Terrain unavailable, predictions will use synthetic elevation"
                );
                None
            }
        };

        let weather = Arc::new(OpenMeteoClient::new(settings.weather_api_url.as_str())?);

        let config = PipelineConfig {
            image_width: settings.image_width,
            image_height: settings.image_height,
            enable_physics: settings.enable_physics,
            rng_seed: None,
        };

        let ctx = PipelineContext::new(weather, terrain, model, config);

        Ok(Self {
            ctx: Some(ctx),
            started_at: Utc::now(),
        })
    }

    /// State with no pipeline, as seen before startup loading completes.
    pub fn uninitialized() -> Self {
        Self {
            ctx: None,
            started_at: Utc::now(),
        }
    }

    /// Whether the inference model finished startup loading.
    pub fn model_ready(&self) -> bool {
        self.ctx.is_some()
    }
}
