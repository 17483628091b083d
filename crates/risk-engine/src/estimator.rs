//! The common estimation interface.

use flood_common::{BoundingBox, FloodResult, ScalarRaster};

/// A flood risk prediction strategy.
///
/// Takes the precipitation raster (mm), the aligned terrain raster (m),
/// and the request bounding box; returns a raw risk raster on the same
/// grid. Implementations are pure with respect to process state and safe
/// to call concurrently; a failing strategy returns its error and the
/// orchestrator falls through to the next tier.
pub trait RiskEstimator: Send + Sync {
    /// Short label for logs and response metadata.
    fn name(&self) -> &'static str;

    /// Estimate flood risk over the shared request grid.
    fn estimate(
        &self,
        precipitation: &ScalarRaster,
        terrain: &ScalarRaster,
        bbox: &BoundingBox,
    ) -> FloodResult<ScalarRaster>;
}
