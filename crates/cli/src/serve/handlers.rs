//! HTTP route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tally_storage::TallyStorage;

use super::json_error;
use super::state::AppState;
use crate::output::summary_json;

/// Multipart field carrying the report file.
const FILE_FIELD: &str = "file";

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /
pub(crate) async fn handle_root() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "running" })))
}

/// GET /health
pub(crate) async fn handle_health<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match state.storage.ping().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// POST /import
///
/// Accepts the report as the `file` field of a multipart form, or as the raw
/// request body.
pub(crate) async fn handle_import<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
    request: Request,
) -> Response {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let bytes = if is_multipart {
        match read_file_field(request).await {
            Ok(bytes) => bytes,
            Err(response) => return response,
        }
    } else {
        match Bytes::from_request(request, &()).await {
            Ok(bytes) => bytes,
            Err(rejection) => return rejection.into_response(),
        }
    };

    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        Err(_) => {
            return json_error(StatusCode::BAD_REQUEST, "File must be UTF-8 encoded text")
                .into_response()
        }
    };

    match tally_engine::ingest(&state.storage, &state.registry, text).await {
        Ok(summary) => (StatusCode::OK, Json(summary_json(&summary))).into_response(),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Import failed: {}", e),
        )
        .into_response(),
    }
}

async fn read_file_field(request: Request) -> Result<Bytes, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("missing '{}' field", FILE_FIELD),
                )
                .into_response())
            }
            Err(e) => return Err(e.into_response()),
        };
        if field.name() == Some(FILE_FIELD) {
            return field.bytes().await.map_err(IntoResponse::into_response);
        }
    }
}

/// GET /constituencies
pub(crate) async fn handle_list_constituencies<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match tally_engine::all_constituency_views(&state.storage).await {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response(),
    }
}

/// GET /constituencies/{name}
pub(crate) async fn handle_get_constituency<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Response {
    match tally_engine::constituency_view(&state.storage, &name).await {
        Ok(Some(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(None) => json_error(
            StatusCode::NOT_FOUND,
            &format!("Constituency '{}' not found", name),
        )
        .into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response(),
    }
}

/// GET /totals
pub(crate) async fn handle_totals<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match tally_engine::national_totals(&state.storage).await {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response(),
    }
}

/// GET /parties
pub(crate) async fn handle_parties<S: TallyStorage>(
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    match tally_engine::parties(&state.storage).await {
        Ok(parties) => (StatusCode::OK, Json(parties)).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response(),
    }
}
