pub mod location;
pub mod query;

pub use location::{ResolvedLocation, WeatherDocument};
pub use query::{validate_date_range, NewQuery, QueryFields, QueryRecord, QueryUpdate};
