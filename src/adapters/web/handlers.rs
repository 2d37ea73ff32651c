//! HTTP request handlers for web adapter.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::checker::check_signal;
use crate::domain::signal::Signal;

use super::{AppState, WebError};

/// Runs a signal check on the blocking pool; retries may sleep.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(signal): Json<Signal>,
) -> Result<Response, WebError> {
    info!(
        base = %signal.base_asset,
        quote = %signal.quote_asset,
        exchange = %signal.exchange,
        "check requested"
    );
    let output = tokio::task::spawn_blocking(move || {
        check_signal(signal, &state.exchanges, &state.options)
    })
    .await
    .map_err(|e| WebError::internal(format!("check task failed: {e}")))?;

    let status = StatusCode::from_u16(output.http_status).unwrap_or(StatusCode::OK);
    Ok((status, Json(output)).into_response())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "exchanges": state.exchanges.names(),
    }))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Page not found")
}
