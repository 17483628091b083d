//! Output contrast normalization.

use flood_common::ScalarRaster;

/// Percentile-based contrast stretch applied to every estimator's output.
///
/// This is the single point where "looks good visually" contrast is
/// guaranteed, regardless of which strategy produced the raw raster.
pub struct RiskNormalizer;

impl RiskNormalizer {
    /// Normalize a raw risk raster into [0, 1].
    ///
    /// Non-finite values become 0 and everything is clipped to [0, 1]
    /// before the 2nd/98th percentile stretch. Degenerate distributions
    /// fall back to a min/max stretch, and a perfectly flat field becomes
    /// all zeros. Idempotent on already-stretched input.
    pub fn normalize(raw: &ScalarRaster) -> ScalarRaster {
        let cleaned = raw.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 });

        let p2 = cleaned.percentile(2.0);
        let p98 = cleaned.percentile(98.0);
        if p98 > p2 {
            return cleaned.map(|v| ((v - p2) / (p98 - p2)).clamp(0.0, 1.0));
        }

        let min = cleaned.min();
        let max = cleaned.max();
        if max > min {
            return cleaned.map(|v| (v - min) / (max - min));
        }

        ScalarRaster::zeros(cleaned.width, cleaned.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrubs_non_finite() {
        let raw = ScalarRaster::from_data(4, 1, vec![f32::NAN, f32::INFINITY, 0.5, 0.9]);
        let out = RiskNormalizer::normalize(&raw);
        assert!(out.data.iter().all(|v| v.is_finite()));
        assert!(out.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_stretch_spans_unit_interval() {
        let data: Vec<f32> = (0..100).map(|i| 0.4 + 0.002 * i as f32).collect();
        let raw = ScalarRaster::from_data(10, 10, data);
        let out = RiskNormalizer::normalize(&raw);

        assert!(out.min() <= 1e-6);
        assert!(out.max() >= 1.0 - 1e-6);
    }

    #[test]
    fn test_flat_field_goes_to_zero() {
        let raw = ScalarRaster::filled(8, 8, 0.7);
        let out = RiskNormalizer::normalize(&raw);
        assert!(out.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_idempotent_on_stretched_input() {
        let data: Vec<f32> = (0..256).map(|i| (i as f32 / 255.0).powf(1.3)).collect();
        let raw = ScalarRaster::from_data(16, 16, data);

        let once = RiskNormalizer::normalize(&raw);
        let twice = RiskNormalizer::normalize(&once);

        for (a, b) in once.data.iter().zip(twice.data.iter()) {
            assert!((a - b).abs() < 1e-3, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_outliers_clipped() {
        // Values below the 2nd percentile clamp to 0 and values above the
        // 98th clamp to 1 instead of compressing the body of the ramp.
        let data: Vec<f32> = (0..100).map(|i| i as f32 / 99.0).collect();
        let raw = ScalarRaster::from_data(10, 10, data);
        let out = RiskNormalizer::normalize(&raw);

        assert_eq!(out.data[0], 0.0);
        assert_eq!(out.data[1], 0.0); // below p2, clamped
        assert_eq!(out.data[99], 1.0);
        assert_eq!(out.data[98], 1.0); // above p98, clamped
        let mid = out.data[50];
        assert!(mid > 0.45 && mid < 0.55);
    }
}
