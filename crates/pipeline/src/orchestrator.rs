//! The bounding-box to risk-raster sequence.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use flood_common::{
    BoundingBox, FloodError, FloodResult, RasterGrid, RasterStats, ScalarRaster,
};
use risk_engine::{RiskEstimator, RiskNormalizer};
use terrain::TerrainAligner;
use weather_sampler::{GridSampler, SyntheticWeatherGenerator};

use crate::context::PipelineContext;

/// The outcome of one prediction request.
///
/// Never mutated after construction: the HTTP layer reads the risk raster
/// for encoding and the stats/labels for response metadata.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Normalized risk in [0, 1] on the request grid.
    pub risk: ScalarRaster,
    /// Min/max/mean of the precipitation raster fed to the estimator,
    /// before any normalization.
    pub precipitation: RasterStats,
    /// Which weather path produced the precipitation field.
    pub weather_source: &'static str,
    /// Which estimator tier produced the risk field.
    pub estimator: &'static str,
    pub generated_at: DateTime<Utc>,
}

/// Composes the pipeline stages and owns the fallback decision logic.
pub struct PredictionOrchestrator;

impl PredictionOrchestrator {
    /// Run the full pipeline for one bounding box.
    #[instrument(skip(ctx), fields(min_lon = bbox.min_lon, min_lat = bbox.min_lat))]
    pub async fn predict(
        ctx: &PipelineContext,
        bbox: &BoundingBox,
    ) -> FloodResult<PredictionResult> {
        let chain = ctx.estimator_chain();
        Self::predict_with(ctx, bbox, &chain).await
    }

    /// Run the pipeline with an explicit estimator chain.
    ///
    /// Exposed so the chain is testable in isolation; `predict` passes
    /// the context's standard chain.
    pub async fn predict_with(
        ctx: &PipelineContext,
        bbox: &BoundingBox,
        estimators: &[Box<dyn RiskEstimator>],
    ) -> FloodResult<PredictionResult> {
        bbox.validate()?;
        let width = ctx.config.image_width;
        let height = ctx.config.image_height;
        let mut rng = ctx.request_rng();

        // Stage 1: precipitation. Total source outage switches to the
        // synthetic generator instead of failing the request.
        let (precipitation, grid, weather_source) =
            match GridSampler::sample(ctx.weather.as_ref(), bbox, width, height).await {
                Ok((raster, grid)) => (raster, grid, ctx.weather.label()),
                Err(FloodError::AllSourcesUnavailable) => {
                    warn!("All weather fetches failed, generating synthetic precipitation");
                    let raster = SyntheticWeatherGenerator::generate(width, height, &mut rng);
                    let grid = RasterGrid::from_bbox(bbox, width, height);
                    (raster, grid, SyntheticWeatherGenerator::label())
                }
                Err(e) => return Err(e),
            };

        // Reported stats come from the raster the estimator actually
        // consumes, before any normalization touches it.
        let precipitation_stats = precipitation.stats();

        // Stage 2: terrain on the same grid. Never aborts.
        let terrain = TerrainAligner::align(ctx.terrain.as_ref(), &grid, &mut rng);

        // Stage 3: estimator chain in fixed precedence, each tier
        // catching its own failure and falling through.
        let mut raw: Option<(ScalarRaster, &'static str)> = None;
        for estimator in estimators {
            match estimator.estimate(&precipitation, &terrain, bbox) {
                Ok(raster) => {
                    info!(estimator = estimator.name(), "Risk estimation complete");
                    raw = Some((raster, estimator.name()));
                    break;
                }
                Err(e) => {
                    warn!(estimator = estimator.name(), error = %e, "Estimator failed, falling through");
                }
            }
        }
        let (raw, estimator) = raw.ok_or_else(|| {
            FloodError::Internal("every estimation strategy failed".to_string())
        })?;

        // Stage 4: normalize, then normalize again. The second pass is
        // deliberate: it re-ranges physics/model outputs whose dynamic
        // range differs from the heuristic's, and is a near-no-op
        // otherwise.
        let normalized = RiskNormalizer::normalize(&raw);
        let normalized = RiskNormalizer::normalize(&normalized);

        Ok(PredictionResult {
            risk: normalized,
            precipitation: precipitation_stats,
            weather_source,
            estimator,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use risk_engine::{FloodNet, HeuristicFallback, LearnedModel};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use weather_sampler::source::WeatherSource;

    use crate::context::PipelineConfig;

    struct DeadSource;

    #[async_trait]
    impl WeatherSource for DeadSource {
        async fn hourly_precipitation(&self, lat: f64, lon: f64) -> FloodResult<Vec<f32>> {
            Err(FloodError::FetchFailure {
                lat,
                lon,
                message: "connection refused".into(),
            })
        }

        fn label(&self) -> &'static str {
            "Open-Meteo"
        }
    }

    struct SteadySource;

    #[async_trait]
    impl WeatherSource for SteadySource {
        async fn hourly_precipitation(&self, _lat: f64, _lon: f64) -> FloodResult<Vec<f32>> {
            Ok(vec![3.0, 12.0, 7.5])
        }

        fn label(&self) -> &'static str {
            "Open-Meteo"
        }
    }

    /// Estimator that always fails, standing in for a broken simulator.
    struct AlwaysFails;

    impl RiskEstimator for AlwaysFails {
        fn name(&self) -> &'static str {
            "physics-simulation"
        }

        fn estimate(
            &self,
            _precipitation: &ScalarRaster,
            _terrain: &ScalarRaster,
            _bbox: &BoundingBox,
        ) -> FloodResult<ScalarRaster> {
            Err(FloodError::SimulationFailure("mesh construction".into()))
        }
    }

    /// Wrapper that records whether its inner estimator ran.
    struct Recording<E> {
        inner: E,
        invoked: Arc<AtomicBool>,
    }

    impl<E: RiskEstimator> RiskEstimator for Recording<E> {
        fn name(&self) -> &'static str {
            self.inner.name()
        }

        fn estimate(
            &self,
            precipitation: &ScalarRaster,
            terrain: &ScalarRaster,
            bbox: &BoundingBox,
        ) -> FloodResult<ScalarRaster> {
            self.invoked.store(true, Ordering::SeqCst);
            self.inner.estimate(precipitation, terrain, bbox)
        }
    }

    fn nyc_bbox() -> BoundingBox {
        BoundingBox::new(-74.006, 40.7128, -73.935, 40.758)
    }

    fn context(weather: Arc<dyn WeatherSource>, config: PipelineConfig) -> PipelineContext {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        PipelineContext::new(weather, None, Arc::new(FloodNet::new(&mut rng)), config)
    }

    #[tokio::test]
    async fn test_unreachable_weather_uses_synthetic_generator() {
        // Source down: the request still succeeds with the synthetic
        // label and a full-size output.
        let ctx = context(
            Arc::new(DeadSource),
            PipelineConfig {
                rng_seed: Some(4),
                ..Default::default()
            },
        );

        let result = PredictionOrchestrator::predict(&ctx, &nyc_bbox()).await.unwrap();
        assert_eq!(result.weather_source, "Synthetic (Typhoon Simulation)");
        assert_eq!(result.risk.shape(), (512, 512));
        assert!(result.risk.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Synthetic precipitation is clamped to [5, 80].
        assert!(result.precipitation.min >= 5.0);
        assert!(result.precipitation.max <= 80.0);
    }

    #[tokio::test]
    async fn test_live_weather_labeled() {
        let ctx = context(
            Arc::new(SteadySource),
            PipelineConfig {
                image_width: 32,
                image_height: 32,
                rng_seed: Some(4),
                ..Default::default()
            },
        );

        let result = PredictionOrchestrator::predict(&ctx, &nyc_bbox()).await.unwrap();
        assert_eq!(result.weather_source, "Open-Meteo");
        assert_eq!(result.risk.shape(), (32, 32));
    }

    #[tokio::test]
    async fn test_stats_are_pre_normalization() {
        // Flat 12 mm everywhere in (series max); stats must reflect the
        // raw mm field, not the normalized [0, 1] risk.
        let ctx = context(
            Arc::new(SteadySource),
            PipelineConfig {
                image_width: 24,
                image_height: 24,
                rng_seed: Some(4),
                ..Default::default()
            },
        );

        let result = PredictionOrchestrator::predict(&ctx, &nyc_bbox()).await.unwrap();
        assert!((result.precipitation.max - 12.0).abs() < 1e-3);
        assert!((result.precipitation.min - 12.0).abs() < 1e-3);
        assert!((result.precipitation.mean - 12.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_failing_physics_falls_to_learned_model() {
        let ctx = context(
            Arc::new(SteadySource),
            PipelineConfig {
                image_width: 16,
                image_height: 16,
                rng_seed: Some(4),
                ..Default::default()
            },
        );

        let learned_ran = Arc::new(AtomicBool::new(false));
        let heuristic_ran = Arc::new(AtomicBool::new(false));
        let chain: Vec<Box<dyn RiskEstimator>> = vec![
            Box::new(AlwaysFails),
            Box::new(Recording {
                inner: LearnedModel::new(ctx.model.clone()),
                invoked: learned_ran.clone(),
            }),
            Box::new(Recording {
                inner: HeuristicFallback,
                invoked: heuristic_ran.clone(),
            }),
        ];

        let result = PredictionOrchestrator::predict_with(&ctx, &nyc_bbox(), &chain)
            .await
            .unwrap();

        // The untrained model does not error, so the heuristic never runs.
        assert!(learned_ran.load(Ordering::SeqCst));
        assert!(!heuristic_ran.load(Ordering::SeqCst));
        assert_eq!(result.estimator, "learned-model");
    }

    #[tokio::test]
    async fn test_invalid_bbox_rejected_up_front() {
        let ctx = context(Arc::new(SteadySource), PipelineConfig::default());
        let bad = BoundingBox::new(-74.0, 41.0, -74.5, 41.5);
        let err = PredictionOrchestrator::predict(&ctx, &bad).await.unwrap_err();
        assert!(matches!(err, FloodError::InvalidBbox(_)));
    }

    #[tokio::test]
    async fn test_colorized_end_to_end() {
        // The whole sequence down to PNG bytes.
        let ctx = context(
            Arc::new(DeadSource),
            PipelineConfig {
                image_width: 64,
                image_height: 64,
                rng_seed: Some(4),
                ..Default::default()
            },
        );

        let result = PredictionOrchestrator::predict(&ctx, &nyc_bbox()).await.unwrap();
        let png = renderer::RiskColorizer::colorize(&result.risk).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
