//! In-memory stand-ins for the geocoder, weather provider and repository.
//!
//! Enabled for this crate's tests and for dependents via the `test-util` feature.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::WeatherlogError;
use crate::geocode::{GeocodeError, GeocodeMatch, Geocoder};
use crate::models::{QueryFields, QueryRecord};
use crate::repository::QueryRepository;
use crate::weather::WeatherProvider;

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// FakeGeocoder
// ============================================================================

#[derive(Default)]
struct GeocoderCalls {
    reverse: usize,
    forward: Vec<String>,
}

/// Scripted geocoder. Unscripted lookups return no match.
#[derive(Default)]
pub struct FakeGeocoder {
    reverse: Option<Result<Option<String>, String>>,
    forward: Option<Result<Option<GeocodeMatch>, String>>,
    calls: Mutex<GeocoderCalls>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reverse(mut self, address: Option<&str>) -> Self {
        self.reverse = Some(Ok(address.map(str::to_string)));
        self
    }

    pub fn with_forward(mut self, hit: Option<(f64, f64, &str)>) -> Self {
        self.forward = Some(Ok(hit.map(|(latitude, longitude, address)| GeocodeMatch {
            latitude,
            longitude,
            address: address.to_string(),
        })));
        self
    }

    pub fn failing_reverse(mut self, message: &str) -> Self {
        self.reverse = Some(Err(message.to_string()));
        self
    }

    pub fn failing_forward(mut self, message: &str) -> Self {
        self.forward = Some(Err(message.to_string()));
        self
    }

    pub fn reverse_calls(&self) -> usize {
        locked(&self.calls).reverse
    }

    pub fn forward_calls(&self) -> usize {
        locked(&self.calls).forward.len()
    }

    pub fn forward_queries(&self) -> Vec<String> {
        locked(&self.calls).forward.clone()
    }
}

fn unavailable(message: &str) -> GeocodeError {
    GeocodeError::Status {
        code: 503,
        body: message.to_string(),
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(
        &self,
        query: &str,
        _timeout: Duration,
    ) -> Result<Option<GeocodeMatch>, GeocodeError> {
        locked(&self.calls).forward.push(query.to_string());
        match &self.forward {
            Some(Ok(hit)) => Ok(hit.clone()),
            Some(Err(message)) => Err(unavailable(message)),
            None => Ok(None),
        }
    }

    async fn reverse(
        &self,
        _latitude: f64,
        _longitude: f64,
        _language: &str,
    ) -> Result<Option<String>, GeocodeError> {
        locked(&self.calls).reverse += 1;
        match &self.reverse {
            Some(Ok(address)) => Ok(address.clone()),
            Some(Err(message)) => Err(unavailable(message)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// FakeWeather
// ============================================================================

struct WeatherScript {
    current: Result<Value, String>,
    forecast: Result<Value, String>,
    current_calls: Vec<(f64, f64)>,
    forecast_calls: Vec<(f64, f64)>,
}

/// Weather provider returning fixed payloads, with call recording.
pub struct FakeWeather {
    script: Mutex<WeatherScript>,
}

impl Default for FakeWeather {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWeather {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(WeatherScript {
                current: Ok(json!({
                    "name": "Paris",
                    "main": { "temp": 18.5, "feels_like": 17.9, "humidity": 72, "pressure": 1015 },
                    "weather": [{ "description": "scattered clouds", "icon": "03d" }],
                    "wind": { "speed": 4.1 }
                })),
                forecast: Ok(json!({
                    "cnt": 2,
                    "list": [
                        { "dt": 1718798400, "main": { "temp": 21.0, "temp_min": 19.0, "temp_max": 22.0 },
                          "weather": [{ "description": "clear sky" }] },
                        { "dt": 1718884800, "main": { "temp": 23.5, "temp_min": 20.0, "temp_max": 24.0 },
                          "weather": [{ "description": "few clouds" }] }
                    ]
                })),
                current_calls: Vec::new(),
                forecast_calls: Vec::new(),
            }),
        }
    }

    pub fn failing_current(self, message: &str) -> Self {
        locked(&self.script).current = Err(message.to_string());
        self
    }

    pub fn failing_forecast(self, message: &str) -> Self {
        self.fail_forecast_with(message);
        self
    }

    pub fn fail_forecast_with(&self, message: &str) {
        locked(&self.script).forecast = Err(message.to_string());
    }

    pub fn set_current_payload(&self, payload: Value) {
        locked(&self.script).current = Ok(payload);
    }

    pub fn current_payload(&self) -> Value {
        locked(&self.script).current.clone().unwrap_or(Value::Null)
    }

    pub fn forecast_payload(&self) -> Value {
        locked(&self.script).forecast.clone().unwrap_or(Value::Null)
    }

    pub fn current_calls(&self) -> usize {
        locked(&self.script).current_calls.len()
    }

    pub fn forecast_calls(&self) -> usize {
        locked(&self.script).forecast_calls.len()
    }

    pub fn current_coordinates(&self) -> Vec<(f64, f64)> {
        locked(&self.script).current_calls.clone()
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError> {
        let mut script = locked(&self.script);
        script.current_calls.push((latitude, longitude));
        script.current.clone().map_err(WeatherlogError::WeatherFetch)
    }

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Value, WeatherlogError> {
        let mut script = locked(&self.script);
        script.forecast_calls.push((latitude, longitude));
        script.forecast.clone().map_err(WeatherlogError::WeatherFetch)
    }
}

// ============================================================================
// MemoryQueryRepository
// ============================================================================

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: Vec<QueryRecord>,
}

/// Vec-backed repository with monotonically increasing ids.
#[derive(Default)]
pub struct MemoryQueryRepository {
    table: Mutex<Table>,
}

impl MemoryQueryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        locked(&self.table).rows.is_empty()
    }
}

#[async_trait]
impl QueryRepository for MemoryQueryRepository {
    async fn insert(
        &self,
        fields: QueryFields,
        created_at: DateTime<Utc>,
    ) -> Result<QueryRecord, WeatherlogError> {
        let mut table = locked(&self.table);
        table.last_id += 1;
        let record = QueryRecord {
            id: table.last_id,
            location_input: fields.location_input,
            resolved_location: fields.resolved_location,
            start_date: fields.start_date,
            end_date: fields.end_date,
            weather_result: fields.weather_result,
            created_at,
        };
        table.rows.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<QueryRecord>, WeatherlogError> {
        Ok(locked(&self.table).rows.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<QueryRecord>, WeatherlogError> {
        Ok(locked(&self.table).rows.iter().find(|r| r.id == id).cloned())
    }

    async fn replace(
        &self,
        id: i64,
        fields: QueryFields,
    ) -> Result<Option<QueryRecord>, WeatherlogError> {
        let mut table = locked(&self.table);
        let Some(record) = table.rows.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        record.location_input = fields.location_input;
        record.resolved_location = fields.resolved_location;
        record.start_date = fields.start_date;
        record.end_date = fields.end_date;
        record.weather_result = fields.weather_result;
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, WeatherlogError> {
        let mut table = locked(&self.table);
        let before = table.rows.len();
        table.rows.retain(|r| r.id != id);
        Ok(table.rows.len() < before)
    }

    async fn health_check(&self) -> Result<String, WeatherlogError> {
        Ok("in-memory".to_string())
    }
}
