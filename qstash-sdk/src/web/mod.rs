//! Web server module for receiving QStash deliveries.
//!
//! This module provides a small web server that:
//! - Receives callbacks delivered by QStash
//! - Verifies the `Upstash-Signature` token before accepting them
//! - Rejects unverified requests with 401

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, qstash_webhook, AppState, HealthResponse, Verification, WebhookResponse,
    MESSAGE_ID_HEADER, RETRIED_HEADER, SIGNATURE_HEADER,
};

/// Build the receiver router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/qstash", post(qstash_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
