//! `tally serve` -- HTTP JSON API over the tally engine.
//!
//! Endpoints:
//! - GET  /                        - Liveness (`{"status": "running"}`)
//! - GET  /health                  - Store connectivity, 503 when unreachable
//! - POST /import                  - Ingest a results report (multipart `file` or raw body)
//! - GET  /constituencies          - Every constituency breakdown, ordered by name
//! - GET  /constituencies/{name}   - One breakdown, 404 when unknown
//! - GET  /totals                  - National vote and seat totals
//! - GET  /parties                 - Seeded parties
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tally_core::PartyRegistry;
use tally_storage::{MemoryStorage, TallyStorage};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use self::handlers::{
    handle_get_constituency, handle_health, handle_import, handle_list_constituencies,
    handle_not_found, handle_parties, handle_root, handle_totals,
};
use self::state::AppState;
use crate::config::{ConfigError, ServeConfig};
use crate::{startup, StoreKind};

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// CORS for the configured origins; `*` allows any origin.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).map_err(|_| ConfigError::InvalidOrigin {
                    origin: o.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any))
}

pub(crate) fn build_router<S: TallyStorage>(
    storage: S,
    registry: PartyRegistry,
    cors_origins: &[String],
) -> Result<Router, ConfigError> {
    let state = Arc::new(AppState { storage, registry });

    Ok(Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health::<S>))
        .route("/import", post(handle_import::<S>))
        .route("/constituencies", get(handle_list_constituencies::<S>))
        .route("/constituencies/{name}", get(handle_get_constituency::<S>))
        .route("/totals", get(handle_totals::<S>))
        .route("/parties", get(handle_parties::<S>))
        .fallback(handle_not_found)
        .layer(cors_layer(cors_origins)?)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state))
}

/// Open the selected store, seed the registry and serve until Ctrl+C.
pub(crate) async fn run(
    port: u16,
    store: StoreKind,
    config: &ServeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = config.registry()?;
    match store {
        StoreKind::Postgres => {
            let storage =
                startup::connect_postgres(config.database_url()?, config.startup).await?;
            tally_engine::seed_parties(&storage, &registry).await?;
            start_server(storage, registry, port, &config.cors_origins).await
        }
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; results are lost on exit");
            let storage = MemoryStorage::new();
            tally_engine::seed_parties(&storage, &registry).await?;
            start_server(storage, registry, port, &config.cors_origins).await
        }
    }
}

async fn start_server<S: TallyStorage>(
    storage: S,
    registry: PartyRegistry,
    port: u16,
    cors_origins: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(storage, registry, cors_origins)?;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, origins = ?cors_origins, "tally server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
