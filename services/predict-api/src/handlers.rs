//! HTTP request handlers for the prediction API.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

use flood_common::BoundingBox;
use pipeline::PredictionOrchestrator;
use renderer::RiskColorizer;

use crate::state::AppState;

/// Request body for bounding-box flood prediction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoundingBoxRequest {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBoxRequest {
    pub fn into_bbox(self) -> BoundingBox {
        BoundingBox::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

/// Generate a flood prediction image for a bounding box.
///
/// Success is an `image/png` body; bounds, precipitation statistics, and
/// the weather source travel in response headers so map clients can
/// georeference the overlay without a second request.
#[instrument(skip(state, request), fields(min_lon = request.min_lon, min_lat = request.min_lat))]
pub async fn predict_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<BoundingBoxRequest>,
) -> Response {
    let Some(ctx) = &state.ctx else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Model not loaded. Server may still be initializing.",
        );
    };

    let bbox = request.into_bbox();
    if let Err(e) = bbox.validate() {
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    info!(
        min_lon = bbox.min_lon,
        min_lat = bbox.min_lat,
        max_lon = bbox.max_lon,
        max_lat = bbox.max_lat,
        "Prediction request"
    );

    let result = match PredictionOrchestrator::predict(ctx, &bbox).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Prediction pipeline failed");
            return error_response(
                StatusCode::from_u16(e.http_status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                &format!("Failed to generate prediction: {}", e),
            );
        }
    };

    let png = match RiskColorizer::colorize(&result.risk) {
        Ok(png) => png,
        Err(e) => {
            error!(error = %e, "Image encoding failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to generate prediction: {}", e),
            );
        }
    };

    info!(
        estimator = result.estimator,
        weather_source = result.weather_source,
        bytes = png.len(),
        "Prediction complete"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header("X-Bounds-MinLon", bbox.min_lon.to_string())
        .header("X-Bounds-MinLat", bbox.min_lat.to_string())
        .header("X-Bounds-MaxLon", bbox.max_lon.to_string())
        .header("X-Bounds-MaxLat", bbox.max_lat.to_string())
        .header("X-Weather-MinPrecip", result.precipitation.min.to_string())
        .header("X-Weather-MaxPrecip", result.precipitation.max.to_string())
        .header("X-Weather-AvgPrecip", result.precipitation.mean.to_string())
        .header("X-Weather-Source", result.weather_source)
        .header("X-Estimator", result.estimator)
        .body(png.into())
        .unwrap()
}

/// Health check endpoint.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.model_ready(),
    }))
    .into_response()
}

/// Root info endpoint.
pub async fn root_handler() -> Response {
    Json(json!({
        "name": "FloodLert",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
    .into_response()
}

/// JSON error body in the `{"detail": ...}` shape clients expect.
fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"min_lon": -74.006, "min_lat": 40.7128, "max_lon": -73.935, "max_lat": 40.758}"#;
        let request: BoundingBoxRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.min_lon, -74.006);

        let bbox = request.into_bbox();
        assert!(bbox.validate().is_ok());
    }

    #[test]
    fn test_request_missing_field_rejected() {
        let json = r#"{"min_lon": -74.006, "min_lat": 40.7128, "max_lon": -73.935}"#;
        assert!(serde_json::from_str::<BoundingBoxRequest>(json).is_err());
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let state = Arc::new(AppState::uninitialized());
        let request = BoundingBoxRequest {
            min_lon: -74.006,
            min_lat: 40.7128,
            max_lon: -73.935,
            max_lat: 40.758,
        };

        let response = predict_handler(Extension(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
