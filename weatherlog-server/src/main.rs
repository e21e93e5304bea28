use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use weatherlog_core::{
    LocationResolver, NominatimGeocoder, OpenWeatherClient, PgQueryRepository, QueryStore,
    WeatherPipeline, WeatherlogConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "weatherlog.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match WeatherlogConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // No key, no service
    if let Err(e) = config.weather.require_api_key() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Connect to DB
    let pool = match weatherlog_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match weatherlog_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Weatherlog DB health check passed");
        return Ok(());
    }

    if let Err(e) = weatherlog_core::db::ensure_schema(&pool).await {
        eprintln!("Failed to create schema: {}", e);
        std::process::exit(1);
    }

    // Upstream clients
    let geocoder = NominatimGeocoder::new(&config.geocoding)?;
    let weather = OpenWeatherClient::new(&config.weather)?;
    let resolver = LocationResolver::new(Arc::new(geocoder), &config.geocoding);
    let pipeline = WeatherPipeline::new(resolver, Arc::new(weather));
    let store = QueryStore::new(pipeline, Arc::new(PgQueryRepository::new(pool.clone())));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let result = weatherlog_server::http::start_http_server(store, config, tx.subscribe()).await;

    pool.close().await;
    tracing::info!("Database pool closed");

    result
}
