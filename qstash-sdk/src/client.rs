//! QStash API client.

use crate::config::Config;
use crate::error::{QStashError, Result};
use crate::http::{HttpClient, RetryConfig, Timeouts};
use crate::signing_key::SigningKeyApi;

/// Async client for the QStash REST API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct QStash {
    http: HttpClient,
}

impl QStash {
    /// Create a client with the default retry policy against the hosted API.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_options(token, RetryConfig::default(), None, Timeouts::default())
    }

    pub fn with_options(
        token: &str,
        retry: RetryConfig,
        base_url: Option<&str>,
        timeouts: Timeouts,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(token, retry, base_url, timeouts)?,
        })
    }

    /// Build a client from environment configuration.
    ///
    /// # Errors
    ///
    /// Fails when `QSTASH_TOKEN` is not set or the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.token.as_deref().ok_or(QStashError::MissingToken)?;

        Self::with_options(
            token,
            config.retry(),
            Some(&config.base_url),
            config.timeouts(),
        )
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Signing key api.
    pub fn signing_key(&self) -> SigningKeyApi<'_> {
        SigningKeyApi::new(&self.http)
    }
}
