//! Signing key API.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::http::HttpClient;

/// The pair of keys QStash signs deliveries with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// The current signing key.
    pub current: String,
    /// The next signing key.
    pub next: String,
}

impl SigningKey {
    /// Render the pair as environment variable assignments.
    pub fn to_env(&self) -> String {
        format!(
            "QSTASH_CURRENT_SIGNING_KEY={}\nQSTASH_NEXT_SIGNING_KEY={}\n",
            self.current, self.next
        )
    }
}

/// Access to `/v2/keys`.
#[derive(Debug, Clone, Copy)]
pub struct SigningKeyApi<'a> {
    http: &'a HttpClient,
}

impl<'a> SigningKeyApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Get the current and next signing keys.
    pub async fn get(&self) -> Result<SigningKey> {
        let key = self.http.request_json(Method::GET, "/v2/keys").await?;
        info!("qstash_signing_key_fetched");
        Ok(key)
    }

    /// Rotate the signing keys.
    ///
    /// The next signing key becomes the current one, and a new key is issued
    /// as the next signing key. Receivers must be given the returned pair.
    pub async fn rotate(&self) -> Result<SigningKey> {
        let key = self.http.request_json(Method::POST, "/v2/keys/rotate").await?;
        info!("qstash_signing_key_rotated");
        Ok(key)
    }
}
