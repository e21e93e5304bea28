//! Location resolution — free-form text or `"lat,lon"` to coordinates + address
//!
//! Provides a `Geocoder` trait with a Nominatim (OpenStreetMap) implementation,
//! and the `LocationResolver` that applies the lookup chain:
//! 1. input containing a comma is tried as `"<lat>,<lon>"` and reverse-geocoded
//! 2. if that parse fails or the reverse lookup has no match, the original
//!    string is forward-geocoded as a place name
//! 3. no forward match is `LocationNotResolved`; any transport failure is
//!    `LocationResolution`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GeocodingConfig;
use crate::error::WeatherlogError;
use crate::models::ResolvedLocation;

// ============================================================================
// Geocoder trait
// ============================================================================

/// A forward geocoding hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoding service returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed geocoding response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Place name to coordinates. `Ok(None)` when nothing matches.
    async fn geocode(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Option<GeocodeMatch>, GeocodeError>;

    /// Coordinates to a formatted address. `Ok(None)` when nothing matches.
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
        language: &str,
    ) -> Result<Option<String>, GeocodeError>;
}

// ============================================================================
// Nominatim
// ============================================================================

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GeocodeError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), body = %body, "Nominatim error");
            return Err(GeocodeError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GeocodeError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Option<GeocodeMatch>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!(query = %query, "Forward geocoding");

        let request = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .timeout(timeout);

        let places: Vec<NominatimPlace> = self.get_json(request).await?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude = place
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|e| GeocodeError::Malformed(format!("lat '{}': {}", place.lat, e)))?;
        let longitude = place
            .lon
            .trim()
            .parse::<f64>()
            .map_err(|e| GeocodeError::Malformed(format!("lon '{}': {}", place.lon, e)))?;

        Ok(Some(GeocodeMatch {
            latitude,
            longitude,
            address: place.display_name,
        }))
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
        language: &str,
    ) -> Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        tracing::debug!(latitude, longitude, "Reverse geocoding");

        let request = self.client.get(&url).query(&[
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("format", "json".to_string()),
            ("accept-language", language.to_string()),
        ]);

        let body: NominatimReverse = self.get_json(request).await?;

        if let Some(err) = body.error {
            tracing::debug!(error = %err, "Reverse geocode found no address");
            return Ok(None);
        }

        Ok(body.display_name.filter(|name| !name.is_empty()))
    }
}

// ============================================================================
// LocationResolver
// ============================================================================

#[derive(Clone)]
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
    language: String,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, config: &GeocodingConfig) -> Self {
        Self {
            geocoder,
            timeout: Duration::from_secs(config.timeout_secs),
            language: config.language.clone(),
        }
    }

    pub async fn resolve(&self, input: &str) -> Result<ResolvedLocation, WeatherlogError> {
        if let Some((latitude, longitude)) = parse_coordinates(input) {
            match self.geocoder.reverse(latitude, longitude, &self.language).await {
                Ok(Some(address)) => {
                    return Ok(ResolvedLocation {
                        latitude,
                        longitude,
                        display_name: address,
                    });
                }
                Ok(None) => {
                    tracing::debug!(input = %input, "No reverse match, trying forward geocoding");
                }
                Err(e) => return Err(WeatherlogError::LocationResolution(e.to_string())),
            }
        }

        match self.geocoder.geocode(input, self.timeout).await {
            Ok(Some(hit)) => Ok(ResolvedLocation {
                latitude: hit.latitude,
                longitude: hit.longitude,
                display_name: hit.address,
            }),
            Ok(None) => Err(WeatherlogError::LocationNotResolved(input.to_string())),
            Err(e) => Err(WeatherlogError::LocationResolution(e.to_string())),
        }
    }
}

/// `"<lat>,<lon>"` with optional whitespace. Parts beyond the second are ignored.
pub fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
    if !input.contains(',') {
        return None;
    }

    let mut parts = input.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    Some((latitude, longitude))
}

// ============================================================================
// TESTS
// ============================================================================
