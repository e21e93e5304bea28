//! Weather provider access — current conditions and multi-day forecast
//!
//! Each call is a single bounded-timeout GET with `lat`, `lon`, the API key and
//! a fixed unit system. Non-2xx and transport failures become
//! `WeatherlogError::WeatherFetch`. There are no retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::WeatherConfig;
use crate::error::WeatherlogError;

/// Stored documents and every export assume Celsius and m/s.
const UNITS: &str = "metric";

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError>;

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError>;
}

/// OpenWeatherMap `data/2.5` client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Current,
    Forecast,
}

impl Resource {
    fn path(self) -> &'static str {
        match self {
            Resource::Current => "weather",
            Resource::Forecast => "forecast",
        }
    }
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherlogError> {
        let api_key = config.require_api_key()?.to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherlogError::WeatherFetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(
        &self,
        resource: Resource,
        latitude: f64,
        longitude: f64,
    ) -> Result<Value, WeatherlogError> {
        let url = format!("{}/{}", self.base_url, resource.path());
        let fail = |detail: String| {
            WeatherlogError::WeatherFetch(format!(
                "Error fetching {} data: {}",
                resource.path(),
                detail
            ))
        };

        tracing::debug!(latitude, longitude, resource = resource.path(), "Fetching weather");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", UNITS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), body = %body, "OpenWeatherMap API error");
            return Err(fail(format!("{} for {}", status, resource.path())));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| fail(e.without_url().to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError> {
        self.fetch(Resource::Current, latitude, longitude).await
    }

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError> {
        self.fetch(Resource::Forecast, latitude, longitude).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str, api_key: Option<&str>) -> WeatherConfig {
        WeatherConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = OpenWeatherClient::new(&test_config("http://unused", None));
        assert!(matches!(result, Err(WeatherlogError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_current_weather_sends_key_and_metric_units() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::new(&test_config(&mock_server.uri(), Some("test-key"))).unwrap();

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "48.8566"))
            .and(query_param("lon", "2.3522"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "main": { "temp": 18.4 },
                "weather": [{ "description": "light rain" }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let current = client.current_weather(48.8566, 2.3522).await.unwrap();
        assert_eq!(current["main"]["temp"], 18.4);
        assert_eq!(current["weather"][0]["description"], "light rain");
    }

    #[tokio::test]
    async fn test_unit_system_ignores_config_file() {
        let mock_server = MockServer::start().await;
        let config = crate::config::WeatherlogConfig::from_toml_str(&format!(
            r#"
            [weather]
            base_url = "{}"
            api_key = "test-key"
            units = "imperial"
            "#,
            mock_server.uri()
        ))
        .unwrap();
        let client = OpenWeatherClient::new(&config.weather).unwrap();

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "list": [] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forecast = client.forecast(48.8566, 2.3522).await.unwrap();
        assert_eq!(forecast["list"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_forecast_hits_forecast_endpoint() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::new(&test_config(&mock_server.uri(), Some("test-key"))).unwrap();

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cnt": 1,
                "list": [{ "dt": 1718798400, "main": { "temp": 21.0 } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forecast = client.forecast(1.0, 2.0).await.unwrap();
        assert_eq!(forecast["cnt"], 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::new(&test_config(&mock_server.uri(), Some("bad-key"))).unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401, "message": "Invalid API key"
            })))
            .mount(&mock_server)
            .await;

        let err = client.current_weather(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeatherlogError::WeatherFetch(_)));
        assert!(err.to_string().starts_with("Error fetching weather data"));

        let err = client.forecast(1.0, 2.0).await.unwrap_err();
        assert!(err.to_string().starts_with("Error fetching forecast data"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_fetch_error() {
        // Nothing listens on port 9 locally
        let client = OpenWeatherClient::new(&test_config("http://127.0.0.1:9", Some("k"))).unwrap();
        let err = client.current_weather(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, WeatherlogError::WeatherFetch(_)));
    }
}
