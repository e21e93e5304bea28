use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherlogError {
    #[error("Could not resolve location: {0}")]
    LocationNotResolved(String),

    #[error("Error resolving location: {0}")]
    LocationResolution(String),

    #[error("{0}")]
    WeatherFetch(String),

    #[error("Start date must be before end date")]
    InvalidDateRange,

    #[error("Weather query not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("OPENWEATHER_API_KEY not found in environment variables or config")]
    MissingApiKey,

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeatherlogError {
    /// Errors caused by the caller's input or by an upstream lookup for it.
    /// These surface as 400 at the HTTP boundary.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WeatherlogError::LocationNotResolved(_)
                | WeatherlogError::LocationResolution(_)
                | WeatherlogError::WeatherFetch(_)
                | WeatherlogError::InvalidDateRange
        )
    }
}

pub type Result<T, E = WeatherlogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_are_client_errors() {
        assert!(WeatherlogError::LocationNotResolved("x".into()).is_client_error());
        assert!(WeatherlogError::LocationResolution("x".into()).is_client_error());
        assert!(WeatherlogError::WeatherFetch("x".into()).is_client_error());
        assert!(WeatherlogError::InvalidDateRange.is_client_error());
    }

    #[test]
    fn test_infrastructure_errors_are_not_client_errors() {
        assert!(!WeatherlogError::NotFound(1).is_client_error());
        assert!(!WeatherlogError::MissingApiKey.is_client_error());
        assert!(!WeatherlogError::Export("boom".into()).is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            WeatherlogError::LocationNotResolved("Atlantis".into()).to_string(),
            "Could not resolve location: Atlantis"
        );
        assert_eq!(
            WeatherlogError::InvalidDateRange.to_string(),
            "Start date must be before end date"
        );
        assert_eq!(WeatherlogError::NotFound(7).to_string(), "Weather query not found");
    }
}
