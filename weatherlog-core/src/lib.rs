pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod geocode;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod store;
pub mod weather;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::WeatherlogConfig;
pub use error::WeatherlogError;
pub use export::ExportFormat;
pub use geocode::{Geocoder, LocationResolver, NominatimGeocoder};
pub use models::{NewQuery, QueryRecord, QueryUpdate, ResolvedLocation, WeatherDocument};
pub use pipeline::WeatherPipeline;
pub use repository::{PgQueryRepository, QueryRepository};
pub use store::QueryStore;
pub use weather::{OpenWeatherClient, WeatherProvider};
