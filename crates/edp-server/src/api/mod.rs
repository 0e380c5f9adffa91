//! HTTP API surface
//!
//! Route table, shared state, and the middleware stack.

pub mod evictions;
pub mod response;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::{Config, CorsConfig};
use crate::db;
use crate::query::{PgStore, QueryBuilder, QueryExecutor};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub builder: QueryBuilder,
    pub executor: QueryExecutor<PgStore>,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            builder: QueryBuilder::new(config.active_table()),
            executor: QueryExecutor::new(PgStore::new(db.clone())),
            db,
        }
    }
}

/// Build the application router with all routes and middleware.
pub fn create_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/summary", get(evictions::get_summary))
        .route("/filings", get(evictions::get_filings))
        .route("/locations", get(evictions::get_locations))
        .route("/meta", get(evictions::get_meta))
        .route("/precincts", get(evictions::get_precincts))
        .route("/health", get(health_check))
        .fallback(unknown_path)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(tracing_layer())
        .layer(cors_layer(&config.cors))
}

/// Create CORS layer from configuration. The API is read-only, so only GET
/// and preflight are allowed through.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::CONTENT_TYPE,
        ])
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
        if config.allow_credentials {
            cors = cors.allow_credentials(true);
        }
    }

    cors
}

/// Create tracing/logging layer.
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Health check handler; verifies database connectivity.
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match db::health_check(&state.db).await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(err) => {
            tracing::error!("Database health check failed: {:?}", err);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Any path outside the route table gets the fixed rejection body.
async fn unknown_path() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "invalid API path" })),
    )
}
