//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables, using the same
//! variable names as the other QStash SDKs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::http::{RetryConfig, Timeouts, BASE_URL};
use crate::signing_key::SigningKey;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// QStash API token
    pub token: Option<String>,

    /// Base URL of the QStash API
    pub base_url: String,

    /// Current signing key for verifying deliveries
    pub current_signing_key: Option<String>,

    /// Next signing key for verifying deliveries during rotation
    pub next_signing_key: Option<String>,

    /// Maximum number of retries on transport failures
    pub retries: u32,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// HTTP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    // =========================================================================
    // Receiver Configuration
    // =========================================================================

    /// Port for the receiver to listen on
    pub port: u16,

    /// Public URL of the receiver endpoint, checked against the token subject
    pub receiver_url: Option<String>,

    /// Seconds of leeway when checking token expiry and not-before
    pub clock_tolerance_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            token: parse_string("QSTASH_TOKEN"),

            base_url: parse_string("QSTASH_URL").unwrap_or_else(|| BASE_URL.to_string()),

            current_signing_key: parse_string("QSTASH_CURRENT_SIGNING_KEY"),

            next_signing_key: parse_string("QSTASH_NEXT_SIGNING_KEY"),

            retries: parse_or("QSTASH_RETRIES", 5),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 600_000),

            connect_timeout_ms: parse_or("CONNECT_TIMEOUT_MS", 5_000),

            port: parse_or("PORT", 8080),

            receiver_url: parse_string("RECEIVER_URL"),

            clock_tolerance_secs: parse_or("CLOCK_TOLERANCE_SECS", 0),
        }
    }

    /// Signing keys, when both are configured.
    pub fn signing_key(&self) -> Option<SigningKey> {
        match (&self.current_signing_key, &self.next_signing_key) {
            (Some(current), Some(next)) => Some(SigningKey {
                current: current.clone(),
                next: next.clone(),
            }),
            (None, None) => None,
            _ => {
                warn!(
                    has_current = self.current_signing_key.is_some(),
                    has_next = self.next_signing_key.is_some(),
                    "signing_key_partially_configured"
                );
                None
            }
        }
    }

    /// Exactly one of the two signing keys is configured.
    pub fn has_partial_signing_key(&self) -> bool {
        self.current_signing_key.is_some() != self.next_signing_key.is_some()
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::with_retries(self.retries)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            request: Duration::from_millis(self.request_timeout_ms),
            connect: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

/// Read a non-blank string variable.
fn parse_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
