use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::location::WeatherDocument;
use crate::error::WeatherlogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub location_input: String,
    pub resolved_location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weather_result: WeatherDocument,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /weather/query`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewQuery {
    pub location_input: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Body of `PUT /weather/query/{id}`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryUpdate {
    #[serde(default)]
    pub location_input: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// The mutable part of a record, written as a unit on insert and refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFields {
    pub location_input: String,
    pub resolved_location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weather_result: WeatherDocument,
}

impl QueryFields {
    pub fn new(
        location_input: String,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        weather_result: WeatherDocument,
    ) -> Self {
        Self {
            location_input,
            resolved_location: weather_result.location.display_name.clone(),
            start_date,
            end_date,
            weather_result,
        }
    }
}

/// `start <= end` whenever both are present.
pub fn validate_date_range(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(), WeatherlogError> {
    match (start_date, end_date) {
        (Some(start), Some(end)) if start > end => Err(WeatherlogError::InvalidDateRange),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolvedLocation;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_range_ordering() {
        assert!(validate_date_range(None, None).is_ok());
        assert!(validate_date_range(Some(date("2024-05-01")), None).is_ok());
        assert!(validate_date_range(None, Some(date("2024-05-01"))).is_ok());
        assert!(validate_date_range(Some(date("2024-05-01")), Some(date("2024-05-01"))).is_ok());
        assert!(matches!(
            validate_date_range(Some(date("2024-05-02")), Some(date("2024-05-01"))),
            Err(WeatherlogError::InvalidDateRange)
        ));
    }

    #[test]
    fn test_fields_take_resolved_location_from_document() {
        let doc = WeatherDocument {
            location: ResolvedLocation {
                latitude: 48.8566,
                longitude: 2.3522,
                display_name: "Paris, France".to_string(),
            },
            current: serde_json::json!({}),
            forecast: serde_json::json!({}),
        };
        let fields = QueryFields::new("48.8566,2.3522".to_string(), None, None, doc);
        assert_eq!(fields.resolved_location, "Paris, France");
    }

    #[test]
    fn test_update_body_allows_partial_fields() {
        let update: QueryUpdate = serde_json::from_value(serde_json::json!({
            "start_date": "2024-06-01"
        }))
        .unwrap();
        assert!(update.location_input.is_none());
        assert_eq!(update.start_date, Some(date("2024-06-01")));
        assert!(update.end_date.is_none());
    }

    #[test]
    fn test_document_uses_lat_lon_keys() {
        let doc = WeatherDocument {
            location: ResolvedLocation {
                latitude: 1.5,
                longitude: -2.25,
                display_name: "Somewhere".to_string(),
            },
            current: serde_json::json!({"main": {"temp": 20.0}}),
            forecast: serde_json::json!({"list": []}),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["location"]["lat"], 1.5);
        assert_eq!(value["location"]["lon"], -2.25);
        assert_eq!(value["location"]["display_name"], "Somewhere");
        assert_eq!(value["current"]["main"]["temp"], 20.0);
    }
}
