//! Deterministic heuristic estimator.
//!
//! The last tier of the fallback chain: a pure combination of normalized
//! precipitation and inverted normalized elevation. It cannot fail, so a
//! prediction request always produces some risk field even with both the
//! simulator and the model out of action.

use flood_common::{BoundingBox, FloodResult, ScalarRaster};

use crate::estimator::RiskEstimator;

/// Precipitation saturation point, mm over the forecast window.
const PRECIP_CLIP_MM: f32 = 100.0;

/// Elevation saturation point, meters.
const TERRAIN_CLIP_M: f32 = 5000.0;

/// Heuristic flood estimation: high rain on low ground scores high.
pub struct HeuristicFallback;

impl HeuristicFallback {
    /// Combine precipitation and terrain into a bounded risk score.
    ///
    /// Total for any finite inputs of matching shape: the output is
    /// finite and within [0, 1] even for all-zero or flat fields.
    pub fn estimate_field(precipitation: &ScalarRaster, terrain: &ScalarRaster) -> ScalarRaster {
        assert_eq!(
            precipitation.shape(),
            terrain.shape(),
            "heuristic inputs must share the request grid"
        );

        let data: Vec<f32> = precipitation
            .data
            .iter()
            .zip(terrain.data.iter())
            .map(|(&p, &t)| {
                let p_scaled = p.clamp(0.0, PRECIP_CLIP_MM) / PRECIP_CLIP_MM;
                // Inverted: low terrain drives the factor toward 1.
                let t_scaled = 1.0 - t.clamp(0.0, TERRAIN_CLIP_M) / TERRAIN_CLIP_M;

                let risk = p_scaled * (0.5 + 0.5 * t_scaled);
                // Gamma boost for mid/high values.
                risk.powf(0.7)
            })
            .collect();

        let mut risk = ScalarRaster::from_data(precipitation.width, precipitation.height, data);

        // Percentile stretch for dynamic range; outliers clamp. A flat
        // field has coinciding percentiles and is returned unscaled.
        let lo = risk.percentile(5.0);
        let hi = risk.percentile(95.0);
        if hi > lo {
            risk = risk.map(|v| (v - lo) / (hi - lo));
        }

        risk.map(|v| v.clamp(0.0, 1.0))
    }
}

impl RiskEstimator for HeuristicFallback {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn estimate(
        &self,
        precipitation: &ScalarRaster,
        terrain: &ScalarRaster,
        _bbox: &BoundingBox,
    ) -> FloodResult<ScalarRaster> {
        Ok(Self::estimate_field(precipitation, terrain))
    }
}
