//! Web server adapter.
//!
//! Exposes the signal check over HTTP: `POST /check` takes a signal as JSON
//! and answers with the check output, using the output's status code.

mod error;
mod handlers;

pub use error::{WebError, status_from_error};
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::domain::checker::CheckOptions;
use crate::ports::exchange_port::ExchangeRegistry;

pub struct AppState {
    pub exchanges: Arc<ExchangeRegistry>,
    pub options: CheckOptions,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/check", post(handlers::check))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(Arc::new(state))
}
