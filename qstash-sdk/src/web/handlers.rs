//! Webhook endpoint handlers.
//!
//! The QStash handler verifies the `Upstash-Signature` header against the
//! raw body before trusting anything in the request.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::receiver::{Receiver, VerifyRequest};
use crate::Config;

/// Header carrying the signature token.
pub const SIGNATURE_HEADER: &str = "Upstash-Signature";

/// Header carrying the QStash message id.
pub const MESSAGE_ID_HEADER: &str = "Upstash-Message-Id";

/// Header carrying the number of previous delivery attempts.
pub const RETRIED_HEADER: &str = "Upstash-Retried";

/// How inbound deliveries are authenticated.
#[derive(Debug, Clone)]
pub enum Verification {
    /// No signing keys configured; deliveries are accepted unverified.
    Disabled,
    /// Both signing keys configured.
    Enabled(Receiver),
    /// Only one signing key configured; every delivery is rejected.
    Misconfigured,
}

impl Verification {
    pub fn from_config(config: &Config) -> Self {
        match config.signing_key() {
            Some(key) => Verification::Enabled(Receiver::from_signing_key(key)),
            None if config.has_partial_signing_key() => Verification::Misconfigured,
            None => Verification::Disabled,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verification: Verification,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let verification = Verification::from_config(&config);
        Self {
            config: Arc::new(config),
            verification,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// QStash Webhook
// =============================================================================

/// Webhook response.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    fn unauthorized(error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::UNAUTHORIZED,
            Json(Self {
                status: "unauthorized",
                message_id: None,
                error: Some(error.into()),
            }),
        )
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// QStash delivery endpoint.
///
/// This endpoint:
/// 1. Verifies the signature (if signing keys are configured)
/// 2. Rejects everything with 401 if only one signing key is configured
/// 3. Returns 200 OK with the message id
pub async fn qstash_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let message_id = header(&headers, MESSAGE_ID_HEADER).map(str::to_string);
    let retried: u32 = header(&headers, RETRIED_HEADER)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    info!(
        message_id = ?message_id,
        retried = retried,
        body_length = body.len(),
        has_signature = headers.contains_key(SIGNATURE_HEADER),
        "qstash_webhook_received"
    );

    match &state.verification {
        Verification::Enabled(receiver) => {
            let Some(signature) = header(&headers, SIGNATURE_HEADER) else {
                warn!(message_id = ?message_id, "qstash_signature_missing");
                return WebhookResponse::unauthorized("missing signature");
            };

            let mut request = VerifyRequest::new(signature, &body)
                .with_clock_tolerance(state.config.clock_tolerance_secs);
            if let Some(url) = state.config.receiver_url.as_deref() {
                request = request.with_url(url);
            }

            if let Err(e) = receiver.verify(&request) {
                warn!(message_id = ?message_id, error = %e, "qstash_signature_invalid");
                return WebhookResponse::unauthorized("invalid signature");
            }
        }
        Verification::Misconfigured => {
            error!(message_id = ?message_id, "qstash_signing_key_misconfigured");
            return WebhookResponse::unauthorized("invalid signature");
        }
        Verification::Disabled => {
            // No signing keys configured, allow through
            warn!("qstash_signature_not_configured");
        }
    }

    info!(message_id = ?message_id, "qstash_webhook_accepted");

    (
        StatusCode::OK,
        Json(WebhookResponse {
            status: "accepted",
            message_id,
            error: None,
        }),
    )
}
