//! QStash SDK - async client and webhook receiver for Upstash QStash.
//!
//! This library provides:
//! - `Receiver`: verification of the `Upstash-Signature` token on inbound deliveries
//! - `QStash`: a client for the QStash REST API (signing keys)
//! - `web`: an axum router that verifies deliveries before accepting them
//!
//! ## Verification
//!
//! ```text
//! QStash → POST /webhooks/qstash (Upstash-Signature) → Receiver::verify → 200 | 401
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod receiver;
pub mod signing_key;
pub mod web;

// Re-export commonly used types
pub use client::QStash;
pub use config::Config;
pub use error::{QStashError, SignatureError};
pub use http::{RetryConfig, Timeouts};
pub use receiver::{Receiver, VerifyRequest};
pub use signing_key::SigningKey;
pub use web::AppState;
