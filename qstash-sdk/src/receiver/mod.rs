//! Verification of inbound QStash deliveries.
//!
//! QStash keeps two signing keys so that keys can be rotated without
//! breaking deliveries already in flight:
//! - `current`: the key tokens are normally signed with
//! - `next`: the key that becomes current after the next rotation
//!
//! A [`Receiver`] tries the current key first and falls back to the next key.

pub mod signature;

use tracing::debug;

use crate::error::SignatureError;
use crate::signing_key::SigningKey;

pub use signature::{body_hash, verify_with_key, Claims, VerifyRequest, ISSUER};

/// Verifies the `Upstash-Signature` header of inbound requests.
///
/// Holds the signing keys immutably, so a single instance can be shared
/// between tasks and threads.
#[derive(Debug, Clone)]
pub struct Receiver {
    current_signing_key: String,
    next_signing_key: String,
}

impl Receiver {
    pub fn new(current_signing_key: impl Into<String>, next_signing_key: impl Into<String>) -> Self {
        Self {
            current_signing_key: current_signing_key.into(),
            next_signing_key: next_signing_key.into(),
        }
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        Self::new(key.current, key.next)
    }

    /// Verify the signature of a request.
    ///
    /// Tries the current signing key, then the next signing key. Returns as
    /// soon as one of them succeeds. If both fail, the error from the next
    /// key is returned and the current key's error is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] when the token does not verify with either key.
    pub fn verify(&self, request: &VerifyRequest<'_>) -> Result<(), SignatureError> {
        let keys = [
            ("current", self.current_signing_key.as_str()),
            ("next", self.next_signing_key.as_str()),
        ];

        let mut last_error = None;
        for (name, key) in keys {
            match verify_with_key(key, request) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(signing_key = name, error = %e, "qstash_signature_key_rejected");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SignatureError::new("no signing keys configured")))
    }
}
