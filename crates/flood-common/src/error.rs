//! Error types for the flood prediction pipeline.

use thiserror::Error;

/// Result type alias using FloodError.
pub type FloodResult<T> = Result<T, FloodError>;

/// Primary error type for pipeline operations.
///
/// Most variants are recovered internally: a single failed weather fetch
/// degrades to a zero sample, total weather failure switches to the
/// synthetic generator, terrain absence switches to synthetic terrain, and
/// estimator failures fall through to the next strategy. Only request
/// validation, a missing model at startup, and the orchestrator catch-all
/// are user-visible.
#[derive(Debug, Error)]
pub enum FloodError {
    // === Weather source ===
    #[error("Weather fetch failed for point ({lat}, {lon}): {message}")]
    FetchFailure { lat: f64, lon: f64, message: String },

    #[error("All weather sample fetches failed")]
    AllSourcesUnavailable,

    // === Terrain ===
    #[error("Terrain source unavailable: {0}")]
    TerrainUnavailable(String),

    // === Estimators ===
    #[error("Shape mismatch: precipitation {expected:?} != terrain {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Simulation failed: {0}")]
    SimulationFailure(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    // === Request boundary ===
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    // === Rendering ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    // === Catch-all at the orchestrator boundary ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FloodError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            FloodError::InvalidBbox(_) => 400,
            FloodError::ModelNotLoaded => 503,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for FloodError {
    fn from(err: std::io::Error) -> Self {
        FloodError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FloodError::InvalidBbox("x".into()).http_status_code(), 400);
        assert_eq!(FloodError::ModelNotLoaded.http_status_code(), 503);
        assert_eq!(
            FloodError::SimulationFailure("diverged".into()).http_status_code(),
            500
        );
        assert_eq!(FloodError::AllSourcesUnavailable.http_status_code(), 500);
    }

    #[test]
    fn test_display_messages() {
        let err = FloodError::FetchFailure {
            lat: 40.7,
            lon: -74.0,
            message: "timeout".into(),
        };
        assert!(err.to_string().contains("40.7"));
        assert!(err.to_string().contains("timeout"));
    }
}
