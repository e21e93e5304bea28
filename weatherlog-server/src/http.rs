//! Weatherlog HTTP REST API
//!
//! Axum-based HTTP server mounted under `/api`. Each endpoint has a thin axum
//! handler that delegates to an inner function; the inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /api/                      — service banner
//! - GET    /api/health                — health check with storage status
//! - POST   /api/weather/query         — resolve, fetch and store a query
//! - GET    /api/weather/query         — list stored queries
//! - GET    /api/weather/query/:id     — one stored query
//! - PUT    /api/weather/query/:id     — merge, refetch and overwrite
//! - DELETE /api/weather/query/:id     — delete a stored query
//! - GET    /api/weather/live          — current + forecast, not stored
//! - GET    /api/weather/forecast      — forecast only, not stored
//! - GET    /api/export/:format        — download every stored query

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};

use weatherlog_core::export::{self, ExportFormat};
use weatherlog_core::{NewQuery, QueryStore, QueryUpdate, WeatherlogConfig, WeatherlogError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: QueryStore,
    pub config: WeatherlogConfig,
}

/// Build the Axum router with all endpoints under `/api`
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = build_cors_layer(&state.config.http.cors_origins);

    Router::new()
        .route("/api", get(root_handler))
        .route("/api/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/weather/query", get(list_handler).post(create_handler))
        .route(
            "/api/weather/query/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/api/weather/live", get(live_handler))
        .route("/api/weather/forecast", get(forecast_handler))
        .route("/api/export/:format", get(export_handler))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.len() == 1 && origins[0] == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| origin.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([HeaderName::from_static("content-disposition")])
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    store: QueryStore,
    config: WeatherlogConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { store, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Weatherlog HTTP API listening on http://{}/api", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs and error mapping
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LocationParams {
    pub location: String,
}

/// Map a store/pipeline error to `(status, {"detail": message})`.
pub fn error_response(err: &WeatherlogError) -> (StatusCode, serde_json::Value) {
    let status = match err {
        WeatherlogError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::debug!("Request rejected: {}", err);
    }

    (status, json!({ "detail": err.to_string() }))
}

fn to_body<T: serde::Serialize>(
    result: Result<T, WeatherlogError>,
) -> (StatusCode, serde_json::Value) {
    match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    json!({ "message": "Weather App API" })
}

pub async fn health_inner(store: &QueryStore) -> (StatusCode, serde_json::Value) {
    match store.health_check().await {
        Ok(storage) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": storage,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

pub async fn create_inner(store: &QueryStore, req: NewQuery) -> (StatusCode, serde_json::Value) {
    to_body(store.create(req).await)
}

pub async fn list_inner(store: &QueryStore) -> (StatusCode, serde_json::Value) {
    to_body(store.list().await)
}

pub async fn get_inner(store: &QueryStore, id: i64) -> (StatusCode, serde_json::Value) {
    to_body(store.get(id).await)
}

pub async fn update_inner(
    store: &QueryStore,
    id: i64,
    req: QueryUpdate,
) -> (StatusCode, serde_json::Value) {
    to_body(store.update(id, req).await)
}

pub async fn delete_inner(store: &QueryStore, id: i64) -> (StatusCode, serde_json::Value) {
    match store.delete(id).await {
        Ok(()) => (
            StatusCode::OK,
            json!({ "message": "Weather query deleted successfully" }),
        ),
        Err(e) => error_response(&e),
    }
}

/// Full pipeline run; nothing is stored.
pub async fn live_inner(store: &QueryStore, location: &str) -> (StatusCode, serde_json::Value) {
    to_body(store.pipeline().fetch_by_location(location).await)
}

/// Full pipeline run; only the forecast sub-document is returned.
pub async fn forecast_inner(store: &QueryStore, location: &str) -> (StatusCode, serde_json::Value) {
    match store.pipeline().fetch_by_location(location).await {
        Ok(document) => (StatusCode::OK, document.forecast),
        Err(e) => error_response(&e),
    }
}

/// Rendered export, or an error body. Unknown formats are a 404 like any
/// other unrouted path.
pub async fn export_inner(
    store: &QueryStore,
    format: &str,
) -> Result<(ExportFormat, Bytes), (StatusCode, serde_json::Value)> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: WeatherlogError| (StatusCode::NOT_FOUND, json!({ "detail": e.to_string() })))?;

    export::render_all(store, format)
        .await
        .map(|bytes| (format, bytes))
        .map_err(|e| error_response(&e))
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.store).await;
    (status, Json(body))
}

pub async fn create_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<NewQuery>,
) -> impl IntoResponse {
    let (status, body) = create_inner(&state.store, req).await;
    (status, Json(body))
}

pub async fn list_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_inner(&state.store).await;
    (status, Json(body))
}

pub async fn get_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = get_inner(&state.store, id).await;
    (status, Json(body))
}

pub async fn update_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
    Json(req): Json<QueryUpdate>,
) -> impl IntoResponse {
    let (status, body) = update_inner(&state.store, id, req).await;
    (status, Json(body))
}

pub async fn delete_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = delete_inner(&state.store, id).await;
    (status, Json(body))
}

pub async fn live_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<LocationParams>,
) -> impl IntoResponse {
    let (status, body) = live_inner(&state.store, &params.location).await;
    (status, Json(body))
}

pub async fn forecast_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<LocationParams>,
) -> impl IntoResponse {
    let (status, body) = forecast_inner(&state.store, &params.location).await;
    (status, Json(body))
}

pub async fn export_handler(
    State(state): State<Arc<HttpState>>,
    Path(format): Path<String>,
) -> Response {
    match export_inner(&state.store, &format).await {
        Ok((format, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, format.content_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", format.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
