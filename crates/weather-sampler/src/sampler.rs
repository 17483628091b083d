//! Sparse weather sampling over a bounding box.

use futures::future::join_all;
use tracing::{debug, warn};

use flood_common::{BoundingBox, FloodError, FloodResult, RasterGrid, ScalarRaster};

use crate::interpolate;
use crate::source::WeatherSource;

/// A single weather sample taken during grid construction.
///
/// Ephemeral: samples exist only between fetch and interpolation.
#[derive(Debug, Clone, Copy)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f32,
}

/// Samples precipitation on a coarse lattice and interpolates it onto the
/// dense output raster.
pub struct GridSampler;

/// Bounds on the sample lattice side, keeping external-call fan-out
/// between 9 and 25 requests per prediction.
const MIN_SIDE: usize = 3;
const MAX_SIDE: usize = 5;

impl GridSampler {
    /// Side length of the square sample lattice for a bounding box.
    ///
    /// Larger areas get more samples; the bounds keep fan-out predictable.
    pub fn sample_side(bbox: &BoundingBox) -> usize {
        let span = bbox.angular_span();
        if span < 0.1 {
            MIN_SIDE
        } else if span < 0.5 {
            4
        } else {
            MAX_SIDE
        }
    }

    /// Fetch precipitation over `bbox` and interpolate onto a
    /// `width` x `height` raster.
    ///
    /// One concurrent fetch per lattice point, joined as a batch: a failed
    /// or malformed fetch degrades that point to 0 rather than aborting.
    /// Only when every fetch fails does the sampler give up with
    /// `AllSourcesUnavailable`.
    pub async fn sample(
        source: &dyn WeatherSource,
        bbox: &BoundingBox,
        width: usize,
        height: usize,
    ) -> FloodResult<(ScalarRaster, RasterGrid)> {
        bbox.validate()?;

        let side = Self::sample_side(bbox);
        let lon_step = bbox.width() / (side - 1) as f64;
        let lat_step = bbox.height() / (side - 1) as f64;

        // Row 0 at the northern edge, matching raster orientation.
        let mut coords = Vec::with_capacity(side * side);
        for row in 0..side {
            let lat = bbox.max_lat - row as f64 * lat_step;
            for col in 0..side {
                let lon = bbox.min_lon + col as f64 * lon_step;
                coords.push((lat, lon));
            }
        }

        debug!(points = coords.len(), side = side, "Fetching weather samples");

        // Each fetch writes to its own slot; join-all, not first-success.
        let fetches = coords
            .iter()
            .map(|&(lat, lon)| source.hourly_precipitation(lat, lon));
        let results = join_all(fetches).await;

        let mut samples = Vec::with_capacity(coords.len());
        let mut failed = 0usize;
        for (&(lat, lon), result) in coords.iter().zip(results) {
            let value = match result {
                // Worst case over the forecast window.
                Ok(series) => series.iter().copied().fold(0.0f32, f32::max),
                Err(e) => {
                    warn!(lat = lat, lon = lon, error = %e, "Weather fetch failed, sampling 0");
                    failed += 1;
                    0.0
                }
            };
            samples.push(SamplePoint { lat, lon, value });
        }

        if failed == samples.len() {
            return Err(FloodError::AllSourcesUnavailable);
        }

        let grid = RasterGrid::from_bbox(bbox, width, height);
        let values: Vec<f32> = samples.iter().map(|s| s.value).collect();

        let raster = match interpolate::interpolate_lattice(&values, side, side, width, height) {
            Some(dense) => ScalarRaster::from_data(width, height, dense),
            None => {
                // Degenerate lattice: fall back to plain bilinear upsizing.
                warn!(side = side, "Sample lattice too small to triangulate, resampling");
                ScalarRaster::from_data(side, side, values).resampled(width, height)
            }
        };

        Ok((raster, grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
        fail_every: Option<usize>,
        fail_all: bool,
    }

    impl FakeSource {
        fn healthy() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every: None,
                fail_all: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every: None,
                fail_all: true,
            }
        }

        fn flaky(every: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every: Some(every),
                fail_all: false,
            }
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        async fn hourly_precipitation(&self, lat: f64, lon: f64) -> FloodResult<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_all || self.fail_every.is_some_and(|k| n % k == 0);
            if fail {
                return Err(FloodError::FetchFailure {
                    lat,
                    lon,
                    message: "connection refused".into(),
                });
            }
            // Max of this series is 4.0 regardless of point.
            Ok(vec![1.0, 4.0, 2.0])
        }

        fn label(&self) -> &'static str {
            "Fake"
        }
    }

    fn nyc_bbox() -> BoundingBox {
        BoundingBox::new(-74.006, 40.7128, -73.935, 40.758)
    }

    #[tokio::test]
    async fn test_sample_output_shape_and_bounds() {
        let source = FakeSource::healthy();
        let bbox = nyc_bbox();
        let (raster, grid) = GridSampler::sample(&source, &bbox, 64, 48).await.unwrap();

        assert_eq!(raster.shape(), (48, 64));
        assert_eq!((grid.width, grid.height), (64, 48));
        let bounds = grid.bounds();
        assert!((bounds.min_lon - bbox.min_lon).abs() < 1e-9);
        assert!((bounds.max_lat - bbox.max_lat).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sample_takes_series_max() {
        let source = FakeSource::healthy();
        let (raster, _) = GridSampler::sample(&source, &nyc_bbox(), 16, 16)
            .await
            .unwrap();
        // All samples are 4.0, so the interpolated field is flat 4.0.
        assert!(raster.data.iter().all(|&v| (v - 4.0).abs() < 1e-4));
    }

    #[tokio::test]
    async fn test_all_failures_reported() {
        let source = FakeSource::failing();
        let err = GridSampler::sample(&source, &nyc_bbox(), 16, 16)
            .await
            .unwrap_err();
        assert!(matches!(err, FloodError::AllSourcesUnavailable));
    }

    #[tokio::test]
    async fn test_partial_failures_zero_filled() {
        let source = FakeSource::flaky(2);
        let (raster, _) = GridSampler::sample(&source, &nyc_bbox(), 16, 16)
            .await
            .unwrap();
        // Half the samples are 0, half 4.0; the interpolated field must
        // stay within that envelope and touch both regimes.
        assert!(raster.data.iter().all(|&v| (0.0..=4.0).contains(&v)));
        assert!(raster.data.iter().any(|&v| v > 1.0));
    }

    #[tokio::test]
    async fn test_invalid_bbox_rejected() {
        let source = FakeSource::healthy();
        let bad = BoundingBox::new(10.0, 0.0, -10.0, 1.0);
        let err = GridSampler::sample(&source, &bad, 16, 16).await.unwrap_err();
        assert!(matches!(err, FloodError::InvalidBbox(_)));
    }

    #[test]
    fn test_sample_side_bounds() {
        // Tiny box: minimum lattice.
        assert_eq!(GridSampler::sample_side(&nyc_bbox()), 3);
        // Large box: maximum lattice, fan-out capped at 25.
        let big = BoundingBox::new(-80.0, 35.0, -70.0, 45.0);
        assert_eq!(GridSampler::sample_side(&big), 5);
        // Mid box.
        let mid = BoundingBox::new(-74.2, 40.5, -73.9, 40.8);
        assert_eq!(GridSampler::sample_side(&mid), 4);
    }
}
