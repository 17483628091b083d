//! Weather source abstraction and the Open-Meteo HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use flood_common::{FloodError, FloodResult};

/// A provider of short-horizon precipitation forecasts for a point.
///
/// Implementations must be safe to call concurrently: the sampler issues
/// one fetch per sample point and joins them all.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Hourly precipitation series in mm for the next forecast day.
    ///
    /// A soft failure (network error, bad status, malformed body, empty
    /// series) is reported as `FetchFailure`; the caller decides how to
    /// degrade.
    async fn hourly_precipitation(&self, lat: f64, lon: f64) -> FloodResult<Vec<f32>>;

    /// Label reported at the response boundary when this source was used.
    fn label(&self) -> &'static str;
}

/// Open-Meteo forecast API client.
///
/// One GET per sample point:
/// `/v1/forecast?latitude=..&longitude=..&hourly=precipitation&forecast_days=1&timezone=UTC`.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

/// Per-fetch request timeout. A slow point degrades to a zero sample
/// rather than holding up the whole batch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl OpenMeteoClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.open-meteo.com";

    /// Create a client against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> FloodResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FloodError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn fetch_failure(lat: f64, lon: f64, message: impl Into<String>) -> FloodError {
        FloodError::FetchFailure {
            lat,
            lon,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    precipitation: Option<Vec<Option<f32>>>,
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn hourly_precipitation(&self, lat: f64, lon: f64) -> FloodResult<Vec<f32>> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", "precipitation".to_string()),
                ("forecast_days", "1".to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Self::fetch_failure(lat, lon, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::fetch_failure(
                lat,
                lon,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| Self::fetch_failure(lat, lon, format!("malformed body: {}", e)))?;

        let series: Vec<f32> = body
            .hourly
            .and_then(|h| h.precipitation)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();

        if series.is_empty() {
            return Err(Self::fetch_failure(lat, lon, "empty precipitation series"));
        }

        Ok(series)
    }

    fn label(&self) -> &'static str {
        "Open-Meteo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing_with_nulls() {
        let json = r#"{"hourly": {"precipitation": [0.1, null, 2.5, null, 0.0]}}"#;
        let parsed: ForecastResponse = serde_json::from_str(json).unwrap();
        let series: Vec<f32> = parsed
            .hourly
            .and_then(|h| h.precipitation)
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(series, vec![0.1, 2.5, 0.0]);
    }

    #[test]
    fn test_response_parsing_missing_key() {
        let json = r#"{"latitude": 40.7}"#;
        let parsed: ForecastResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.hourly.is_none());
    }

    #[test]
    fn test_client_label() {
        let client = OpenMeteoClient::new(OpenMeteoClient::DEFAULT_BASE_URL).unwrap();
        assert_eq!(client.label(), "Open-Meteo");
    }
}
