//! Flood risk color ramp.

use flood_common::{FloodError, FloodResult, ScalarRaster};

use crate::png;

/// Gamma applied before the ramp to lift mid-range detail.
const DISPLAY_GAMMA: f32 = 0.8;

/// Flood risk color scale (normalized 0-1)
/// Maps risk values to colors
///
/// Three-segment ramp, a compatibility requirement for visual parity:
/// 0.0: Blue (safe)
/// 0.33: Green
/// 0.5: Yellow-green
/// 0.66: Yellow turning red
/// 1.0: Red (severe)
pub fn risk_color(value: f32) -> (u8, u8, u8) {
    let v = value.clamp(0.0, 1.0).powf(DISPLAY_GAMMA);

    if v < 0.33 {
        // Blue with green creeping in.
        (0, channel(v * 100.0), 255)
    } else if v < 0.66 {
        // Green dominant, red ramping up, residual blue fading out.
        (
            channel((v - 0.33) / 0.33 * 255.0),
            255,
            channel((0.66 - v) * 100.0),
        )
    } else {
        // Red dominant, green fading out.
        (255, channel((1.0 - v) / 0.34 * 255.0), 0)
    }
}

#[inline]
fn channel(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Encodes normalized risk rasters as color-mapped PNG images.
pub struct RiskColorizer;

impl RiskColorizer {
    /// Render a normalized [0, 1] risk raster to PNG bytes.
    pub fn colorize(normalized: &ScalarRaster) -> FloodResult<Vec<u8>> {
        let mut pixels = Vec::with_capacity(normalized.data.len() * 3);
        for &v in &normalized.data {
            let (r, g, b) = risk_color(v);
            pixels.push(r);
            pixels.push(g);
            pixels.push(b);
        }

        png::create_png_auto(&pixels, normalized.width, normalized.height)
            .map_err(FloodError::RenderError)
    }
}
