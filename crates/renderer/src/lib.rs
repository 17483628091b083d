//! Flood risk visualization.
//!
//! Maps normalized risk rasters through a fixed blue-green-yellow-red
//! color ramp and encodes the result as a lossless PNG.

pub mod png;
pub mod ramp;

pub use ramp::{risk_color, RiskColorizer};
