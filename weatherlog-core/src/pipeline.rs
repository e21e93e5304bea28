//! Weather pipeline — resolve, then current conditions, then forecast
//!
//! Stages run strictly in order and the first failure is returned unchanged;
//! later stages are never started. Callers get a complete `WeatherDocument`
//! or exactly one error.

use std::sync::Arc;

use crate::error::WeatherlogError;
use crate::geocode::LocationResolver;
use crate::models::WeatherDocument;
use crate::weather::WeatherProvider;

#[derive(Clone)]
pub struct WeatherPipeline {
    resolver: LocationResolver,
    weather: Arc<dyn WeatherProvider>,
}

impl WeatherPipeline {
    pub fn new(resolver: LocationResolver, weather: Arc<dyn WeatherProvider>) -> Self {
        Self { resolver, weather }
    }

    pub async fn fetch_by_location(&self, input: &str) -> Result<WeatherDocument, WeatherlogError> {
        let location = self.resolver.resolve(input).await?;
        tracing::debug!(
            input = %input,
            resolved = %location.display_name,
            "Location resolved"
        );

        let current = self
            .weather
            .current_weather(location.latitude, location.longitude)
            .await?;

        let forecast = self
            .weather
            .forecast(location.latitude, location.longitude)
            .await?;

        Ok(WeatherDocument {
            location,
            current,
            forecast,
        })
    }
}
