//! Service configuration from environment variables.

use std::env;
use std::path::PathBuf;

use weather_sampler::OpenMeteoClient;

/// Application settings, resolved once at startup.
///
/// Every knob has a code default; `.env` files are honored via dotenvy in
/// `main` before this is read.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the model weight checkpoint (JSON state map).
    pub model_path: PathBuf,
    /// Path to the terrain elevation GeoTIFF.
    pub terrain_path: PathBuf,
    /// Weather API base URL.
    pub weather_api_url: String,
    /// Output image dimensions.
    pub image_width: usize,
    pub image_height: usize,
    /// Whether the physics tier participates in the estimator chain.
    pub enable_physics: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "data/flood_model.json".to_string())
                .into(),
            terrain_path: env::var("TERRAIN_DATA_PATH")
                .unwrap_or_else(|_| "data/terrain_data.tif".to_string())
                .into(),
            weather_api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| OpenMeteoClient::DEFAULT_BASE_URL.to_string()),
            image_width: parse_or("PREDICTION_IMAGE_WIDTH", 512),
            image_height: parse_or("PREDICTION_IMAGE_HEIGHT", 512),
            enable_physics: env::var("FLOOD_ENABLE_PHYSICS")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
        }
    }
}

fn parse_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("OFF"));
        assert!(!parse_bool(" no "));
    }
}
