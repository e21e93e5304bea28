//! weatherlog-cli — terminal client for the Weatherlog HTTP API
//!
//! # Subcommands
//! - `live <location>`                         — current conditions, not stored
//! - `forecast <location>`                     — one entry per day at 12:00 UTC
//! - `create <location> [--start] [--end]`     — resolve, fetch and store
//! - `list` / `show <id>`                      — stored queries
//! - `update <id> [--location] [--start] [--end]`
//! - `delete <id>`
//! - `export <json|csv|xml|pdf> [-o <path>]`   — download every stored query
//! - `status`                                  — show server health

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8001";
const FORECAST_DAYS: usize = 5;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "weatherlog-cli",
    version,
    about = "Weatherlog — look up, record and export weather queries"
)]
struct Cli {
    /// Weatherlog HTTP server URL (overrides WEATHERLOG_HTTP_URL env var)
    #[arg(long, env = "WEATHERLOG_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show current weather for a location without storing it
    Live {
        /// Place name, postal code or "lat,lon"
        location: String,

        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },

    /// Show the daily forecast for a location without storing it
    Forecast {
        location: String,

        #[arg(long)]
        json: bool,
    },

    /// Resolve a location, fetch its weather and store the query
    Create {
        location: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// List stored queries
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one stored query
    Show {
        id: i64,
    },

    /// Change a stored query and refresh its weather
    Update {
        id: i64,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Delete a stored query
    Delete {
        id: i64,
    },

    /// Download every stored query as json, csv, xml or pdf
    Export {
        format: String,

        /// Output path (defaults to weather_queries.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show Weatherlog server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// A stored query as returned by the HTTP API
#[derive(Debug, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub location_input: String,
    pub resolved_location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weather_result: Value,
    pub created_at: DateTime<Utc>,
}

/// One row of the daily forecast view
#[derive(Debug, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub description: String,
    pub temp: i64,
    pub temp_min: i64,
    pub temp_max: i64,
}

// ============================================================================
// Formatting (pure)
// ============================================================================

fn rounded(value: &Value) -> i64 {
    value.as_f64().map(|v| v.round() as i64).unwrap_or(0)
}

fn description(entry: &Value) -> String {
    entry["weather"][0]["description"]
        .as_str()
        .unwrap_or("No description")
        .to_string()
}

/// Forecast entries stamped 12:00 UTC, one per day, at most five.
pub fn daily_forecast(forecast: &Value) -> Vec<DailyForecast> {
    let Some(list) = forecast["list"].as_array() else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let at = DateTime::<Utc>::from_timestamp(entry["dt"].as_i64()?, 0)?;
            (at.hour() == 12).then(|| DailyForecast {
                date: at.date_naive(),
                description: description(entry),
                temp: rounded(&entry["main"]["temp"]),
                temp_min: rounded(&entry["main"]["temp_min"]),
                temp_max: rounded(&entry["main"]["temp_max"]),
            })
        })
        .take(FORECAST_DAYS)
        .collect()
}

/// Human-readable summary of a `{location, current, forecast}` document.
pub fn format_current(document: &Value) -> String {
    let current = &document["current"];
    let name = current["name"]
        .as_str()
        .filter(|n| !n.is_empty())
        .or_else(|| document["location"]["display_name"].as_str())
        .unwrap_or("Unknown Location");

    let main = &current["main"];
    let mut out = String::new();
    out.push_str(&format!("{}\n", name));
    out.push_str(&format!("{}\n\n", description(current)));
    out.push_str(&format!(
        "Temperature:  {}°C (feels like {}°C)\n",
        rounded(&main["temp"]),
        rounded(&main["feels_like"])
    ));
    out.push_str(&format!("Humidity:     {}%\n", rounded(&main["humidity"])));
    out.push_str(&format!(
        "Wind:         {} m/s\n",
        current["wind"]["speed"].as_f64().unwrap_or(0.0)
    ));
    out.push_str(&format!("Pressure:     {} hPa\n", rounded(&main["pressure"])));
    out
}

pub fn format_forecast(days: &[DailyForecast]) -> String {
    if days.is_empty() {
        return "No daily forecast available\n".to_string();
    }
    days.iter()
        .map(|d| {
            format!(
                "{}  {:>4}°C  {:>3}° / {:>3}°  {}\n",
                d.date.format("%a %b %-d"),
                d.temp,
                d.temp_min,
                d.temp_max,
                d.description
            )
        })
        .collect()
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn format_record_row(record: &QueryRecord) -> String {
    let temp = record.weather_result["current"]["main"]["temp"]
        .as_f64()
        .map(|t| format!("{}°C", t.round() as i64))
        .unwrap_or_else(|| "N/A".to_string());
    let resolved: String = record.resolved_location.chars().take(40).collect();

    format!(
        "#{:<5} {:<20} {:<40} {:>7}  {} → {}  {}",
        record.id,
        record.location_input,
        resolved,
        temp,
        date_or_dash(record.start_date),
        date_or_dash(record.end_date),
        record.created_at.format("%Y-%m-%d %H:%M"),
    )
}

/// The `detail` message of an error body, or the raw body.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Update body with only the provided fields.
pub fn update_body(
    location: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(location) = location {
        body.insert("location_input".to_string(), json!(location));
    }
    if let Some(start) = start {
        body.insert("start_date".to_string(), json!(start));
    }
    if let Some(end) = end {
        body.insert("end_date".to_string(), json!(end));
    }
    Value::Object(body)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct ApiClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    fn new(server: &str) -> anyhow::Result<Self> {
        // Live lookups chain three upstream calls of up to 10s each
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(40))
            .build()?;
        Ok(Self {
            base: format!("{}/api", server.trim_end_matches('/')),
            http,
        })
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> anyhow::Result<reqwest::blocking::Response> {
        let resp = req
            .send()
            .with_context(|| format!("connection failed to {}", self.base))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            bail!("server returned {}: {}", status, error_detail(&body));
        }
        Ok(resp)
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        let req = self.http.get(format!("{}{}", self.base, path)).query(query);
        Ok(self.send(req)?.json()?)
    }

    fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let req = self.http.post(format!("{}{}", self.base, path)).json(body);
        Ok(self.send(req)?.json()?)
    }

    fn put(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let req = self.http.put(format!("{}{}", self.base, path)).json(body);
        Ok(self.send(req)?.json()?)
    }

    fn delete(&self, path: &str) -> anyhow::Result<Value> {
        let req = self.http.delete(format!("{}{}", self.base, path));
        Ok(self.send(req)?.json()?)
    }

    fn download(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let req = self.http.get(format!("{}{}", self.base, path));
        Ok(self.send(req)?.bytes()?.to_vec())
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_record(record: &QueryRecord) {
    println!("Query #{}", record.id);
    println!("Location:     {}", record.location_input);
    println!("Resolved:     {}", record.resolved_location);
    println!(
        "Dates:        {} → {}",
        date_or_dash(record.start_date),
        date_or_dash(record.end_date)
    );
    println!("Created:      {}\n", record.created_at.to_rfc3339());
    print!("{}", format_current(&record.weather_result));
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let client = ApiClient::new(&cli.server)?;

    match cli.command {
        Commands::Live { location, json } => {
            let document = client.get("/weather/live", &[("location", &location)])?;
            if json {
                print_json(&document)?;
            } else {
                print!("{}", format_current(&document));
            }
        }
        Commands::Forecast { location, json } => {
            let forecast = client.get("/weather/forecast", &[("location", &location)])?;
            if json {
                print_json(&forecast)?;
            } else {
                print!("{}", format_forecast(&daily_forecast(&forecast)));
            }
        }
        Commands::Create {
            location,
            start,
            end,
        } => {
            let body = json!({
                "location_input": location,
                "start_date": start,
                "end_date": end,
            });
            let record: QueryRecord = serde_json::from_value(client.post("/weather/query", &body)?)?;
            print_record(&record);
        }
        Commands::List { json } => {
            let listed = client.get("/weather/query", &[])?;
            if json {
                return print_json(&listed);
            }
            let records: Vec<QueryRecord> = serde_json::from_value(listed)?;
            if records.is_empty() {
                eprintln!("No stored queries");
            }
            for record in &records {
                println!("{}", format_record_row(record));
            }
        }
        Commands::Show { id } => {
            let record: QueryRecord =
                serde_json::from_value(client.get(&format!("/weather/query/{}", id), &[])?)?;
            print_record(&record);
        }
        Commands::Update {
            id,
            location,
            start,
            end,
        } => {
            let body = update_body(location, start, end);
            let record: QueryRecord =
                serde_json::from_value(client.put(&format!("/weather/query/{}", id), &body)?)?;
            print_record(&record);
        }
        Commands::Delete { id } => {
            let body = client.delete(&format!("/weather/query/{}", id))?;
            println!("{}", body["message"].as_str().unwrap_or("Deleted"));
        }
        Commands::Export { format, output } => {
            let format = format.to_ascii_lowercase();
            let path = output.unwrap_or_else(|| PathBuf::from(format!("weather_queries.{}", format)));
            let bytes = client.download(&format!("/export/{}", format))?;
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        Commands::Status => {
            let body = client.get("/health", &[])?;
            println!("Weatherlog server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:           {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:           {}", body["storage"].as_str().unwrap_or("?"));
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("weatherlog-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 2024-06-19 00:00:00 UTC
    const DAY0: i64 = 1_718_755_200;

    fn entry(dt: i64, temp: f64, desc: &str) -> Value {
        json!({
            "dt": dt,
            "main": { "temp": temp, "temp_min": temp - 2.0, "temp_max": temp + 1.4 },
            "weather": [{ "description": desc }]
        })
    }

    #[test]
    fn test_daily_forecast_picks_noon_entries() {
        let list: Vec<Value> = (0..8)
            .map(|i| entry(DAY0 + i * 3 * 3600, 10.0 + i as f64, "clear sky"))
            .collect();
        let days = daily_forecast(&json!({ "list": list }));

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 6, 19).unwrap());
        assert_eq!(days[0].temp, 14);
        assert_eq!(days[0].temp_min, 12);
        assert_eq!(days[0].temp_max, 15);
    }

    #[test]
    fn test_daily_forecast_caps_at_five_days() {
        let list: Vec<Value> = (0..7)
            .map(|d| entry(DAY0 + d * 86_400 + 12 * 3600, 20.0, "rain"))
            .collect();
        let days = daily_forecast(&json!({ "list": list }));
        assert_eq!(days.len(), 5);
        assert_eq!(days[4].date, NaiveDate::from_ymd_opt(2024, 6, 23).unwrap());
    }

    #[test]
    fn test_daily_forecast_tolerates_missing_fields() {
        assert!(daily_forecast(&json!({})).is_empty());
        assert!(daily_forecast(&json!({ "list": "nope" })).is_empty());

        let days = daily_forecast(&json!({ "list": [{ "dt": DAY0 + 12 * 3600 }] }));
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].temp, 0);
        assert_eq!(days[0].description, "No description");
    }

    #[test]
    fn test_format_current_prefers_provider_name() {
        let doc = json!({
            "location": { "lat": 1.0, "lon": 2.0, "display_name": "Paris, France" },
            "current": {
                "name": "Paris",
                "main": { "temp": 18.5, "feels_like": 17.4, "humidity": 72, "pressure": 1015 },
                "weather": [{ "description": "scattered clouds" }],
                "wind": { "speed": 4.1 }
            },
            "forecast": {}
        });
        let text = format_current(&doc);
        assert!(text.starts_with("Paris\nscattered clouds\n"));
        assert!(text.contains("Temperature:  19°C (feels like 17°C)"));
        assert!(text.contains("Humidity:     72%"));
        assert!(text.contains("Wind:         4.1 m/s"));
    }

    #[test]
    fn test_format_current_falls_back_to_display_name() {
        let doc = json!({
            "location": { "display_name": "Somewhere, Earth" },
            "current": {},
        });
        let text = format_current(&doc);
        assert!(text.starts_with("Somewhere, Earth\nNo description\n"));

        assert!(format_current(&json!({})).starts_with("Unknown Location\n"));
    }

    #[test]
    fn test_format_forecast_lines() {
        let days = vec![DailyForecast {
            date: NaiveDate::from_ymd_opt(2024, 6, 19).unwrap(),
            description: "light rain".to_string(),
            temp: 14,
            temp_min: 12,
            temp_max: 15,
        }];
        let text = format_forecast(&days);
        assert!(text.starts_with("Wed Jun 19"));
        assert!(text.contains("light rain"));
        assert_eq!(format_forecast(&[]), "No daily forecast available\n");
    }

    #[test]
    fn test_record_row_and_missing_temperature() {
        let record: QueryRecord = serde_json::from_value(json!({
            "id": 3,
            "location_input": "Oslo",
            "resolved_location": "Oslo, Norway",
            "start_date": "2024-01-01",
            "end_date": null,
            "weather_result": { "current": {} },
            "created_at": "2024-01-01T09:30:00Z"
        }))
        .unwrap();

        let row = format_record_row(&record);
        assert!(row.starts_with("#3 "));
        assert!(row.contains("N/A"));
        assert!(row.contains("2024-01-01 → -"));
        assert!(row.ends_with("2024-01-01 09:30"));
    }

    #[test]
    fn test_error_detail_extraction() {
        assert_eq!(
            error_detail(r#"{"detail":"Weather query not found"}"#),
            "Weather query not found"
        );
        assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_detail(r#"{"other":1}"#), r#"{"other":1}"#);
    }

    #[test]
    fn test_update_body_only_includes_given_fields() {
        assert_eq!(update_body(None, None, None), json!({}));
        assert_eq!(
            update_body(
                Some("Rome".to_string()),
                None,
                NaiveDate::from_ymd_opt(2024, 2, 1)
            ),
            json!({ "location_input": "Rome", "end_date": "2024-02-01" })
        );
    }

    #[test]
    fn test_cli_parses_export_output() {
        let cli = Cli::try_parse_from([
            "weatherlog-cli",
            "--server",
            "http://example:9000",
            "export",
            "pdf",
            "-o",
            "/tmp/report.pdf",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://example:9000");
        match cli.command {
            Commands::Export { format, output } => {
                assert_eq!(format, "pdf");
                assert_eq!(output, Some(PathBuf::from("/tmp/report.pdf")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
