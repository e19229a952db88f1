use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flagcache_lib::{Error, FlagRequest};

use super::metrics::metrics;
use super::state::AppState;

// ── Helper: map service errors to responses ─────────────────

fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::BlankKey => StatusCode::BAD_REQUEST,
        Error::Store(_) | Error::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if err.is_unavailable() {
        tracing::warn!(error = %err, "request failed");
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

fn not_found(key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "flag not found", "flag": key})),
    )
        .into_response()
}

fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::BlankKey => "blank_key",
        Error::Store(_) => "store",
        Error::Cache(_) => "cache",
    }
}

fn record_write(op: &str, result: &str) {
    metrics()
        .admin_writes
        .with_label_values(&[op, result])
        .inc();
}

// ── Health ───────────────────────────────────────────────────

pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "cache": state.cache_backend,
        "cache_ttl_secs": state.service.ttl().as_secs(),
    }))
}

// ── GET /flags ───────────────────────────────────────────────

pub async fn handle_list(State(state): State<Arc<AppState>>) -> Response {
    match state.service.list_flags().await {
        Ok(flags) => {
            metrics().flags_total.set(flags.len() as i64);
            (StatusCode::OK, Json(flags)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ── GET /flags/{key} ─────────────────────────────────────────

pub async fn handle_get(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> Response {
    match state.service.get_flag(&key).await {
        Ok(Some(flag)) => (StatusCode::OK, Json(flag)).into_response(),
        Ok(None) => not_found(&key),
        Err(e) => error_response(&e),
    }
}

// ── POST /flags ──────────────────────────────────────────────

pub async fn handle_create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FlagRequest>,
) -> Response {
    match state.service.create_flag(&request).await {
        Ok(flag) => {
            record_write("create", "ok");
            (StatusCode::CREATED, Json(flag)).into_response()
        }
        Err(e) => {
            record_write("create", "error");
            error_response(&e)
        }
    }
}

// ── PUT /flags/{key} ─────────────────────────────────────────

pub async fn handle_update(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<FlagRequest>,
) -> Response {
    match state.service.update_flag(&key, &request).await {
        Ok(Some(flag)) => {
            record_write("update", "ok");
            (StatusCode::OK, Json(flag)).into_response()
        }
        Ok(None) => {
            record_write("update", "not_found");
            not_found(&key)
        }
        Err(e) => {
            record_write("update", "error");
            error_response(&e)
        }
    }
}

// ── DELETE /flags/{key} ──────────────────────────────────────

pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    match state.service.delete_flag(&key).await {
        Ok(true) => {
            record_write("delete", "ok");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => {
            record_write("delete", "not_found");
            not_found(&key)
        }
        Err(e) => {
            record_write("delete", "error");
            error_response(&e)
        }
    }
}

// ── GET /flags/evaluate/{key}?targetId= ─────────────────────

#[derive(serde::Deserialize)]
pub struct EvalQuery {
    #[serde(rename = "targetId")]
    pub target_id: Option<String>,
}

/// Evaluate a flag. The body is a bare JSON boolean; an unknown flag answers
/// `false` exactly like a disabled one.
pub async fn handle_evaluate(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<EvalQuery>,
) -> Response {
    let start = Instant::now();
    let m = metrics();

    match state.service.evaluate(&key, query.target_id.as_deref()).await {
        Ok(evaluation) => {
            let source = evaluation.source.as_str();
            m.eval_total.with_label_values(&[source]).inc();
            m.eval_duration
                .with_label_values(&[source])
                .observe(start.elapsed().as_secs_f64());
            (StatusCode::OK, Json(evaluation.enabled)).into_response()
        }
        Err(e) => {
            m.eval_errors.with_label_values(&[error_kind(&e)]).inc();
            error_response(&e)
        }
    }
}
