use serde::{Deserialize, Serialize};

/// Coordinates plus the geocoder's formatted address for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub display_name: String,
}

/// One complete pipeline run: where, what it is like now, and what is coming.
///
/// `current` and `forecast` are the provider's payloads, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDocument {
    pub location: ResolvedLocation,
    pub current: serde_json::Value,
    pub forecast: serde_json::Value,
}
