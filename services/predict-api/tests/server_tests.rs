//! Tests for the predict-api HTTP contract.
//!
//! The handler modules are private to the binary, so these tests pin the
//! request/response wire shapes the frontend depends on.

use serde_json;

// ============================================================================
// Request serialization tests
// ============================================================================

#[test]
fn test_predict_request_shape() {
    let json = r#"{
        "min_lon": -74.006,
        "min_lat": 40.7128,
        "max_lon": -73.935,
        "max_lat": 40.758
    }"#;
    let request: serde_json::Value = serde_json::from_str(json).unwrap();

    assert_eq!(request["min_lon"], -74.006);
    assert_eq!(request["min_lat"], 40.7128);
    assert_eq!(request["max_lon"], -73.935);
    assert_eq!(request["max_lat"], 40.758);
}

// ============================================================================
// Response serialization tests
// ============================================================================

#[test]
fn test_health_response_serialization() {
    let response = serde_json::json!({
        "status": "healthy",
        "model_loaded": true
    });

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"status\":\"healthy\""));
    assert!(json.contains("\"model_loaded\":true"));
}

#[test]
fn test_root_response_serialization() {
    let response = serde_json::json!({
        "name": "FloodLert",
        "version": "0.1.0",
        "status": "running"
    });

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"name\":\"FloodLert\""));
    assert!(json.contains("\"status\":\"running\""));
}

#[test]
fn test_error_response_serialization() {
    let response = serde_json::json!({
        "detail": "Model not loaded. Server may still be initializing."
    });

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"detail\""));
    assert!(json.contains("still be initializing"));
}

// ============================================================================
// Metadata header contract
// ============================================================================

/// The headers the CORS layer must expose for map clients. Renaming any
/// of these breaks the frontend overlay georeferencing.
#[test]
fn test_metadata_header_names_are_valid() {
    let headers = [
        "x-bounds-minlon",
        "x-bounds-minlat",
        "x-bounds-maxlon",
        "x-bounds-maxlat",
        "x-weather-minprecip",
        "x-weather-maxprecip",
        "x-weather-avgprecip",
        "x-weather-source",
        "x-estimator",
    ];

    for name in headers {
        // Lowercase, no underscores: valid HTTP header names.
        assert_eq!(name, name.to_ascii_lowercase());
        assert!(!name.contains('_'), "header {} must use dashes", name);
    }
}
