//! Single-key verification of the `Upstash-Signature` token.
//!
//! QStash signs every delivery with an HS256 JWT. The token binds the
//! delivery to its destination URL (`sub`) and to the exact request body
//! (`body`, the unpadded base64url SHA-256 of the body bytes).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SignatureError;

/// Issuer every QStash token must carry.
pub const ISSUER: &str = "Upstash";

/// Claims that must be present for a token to decode.
const REQUIRED_CLAIMS: &[&str] = &["iss", "sub", "exp", "nbf"];

/// Claims carried by a QStash signature token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Destination URL the message was delivered to.
    pub sub: String,
    pub exp: u64,
    pub nbf: u64,
    /// Unpadded base64url SHA-256 of the request body.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<serde_json::Value>,
}

/// An inbound request to check against the signing keys.
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    /// Value of the `Upstash-Signature` header.
    pub signature: &'a str,
    /// Raw request body, exactly as received.
    pub body: &'a str,
    /// Expected destination URL. `None` skips the subject check.
    pub url: Option<&'a str>,
    /// Leeway in seconds applied to `exp` and `nbf`.
    pub clock_tolerance: u64,
}

impl<'a> VerifyRequest<'a> {
    pub fn new(signature: &'a str, body: &'a str) -> Self {
        Self {
            signature,
            body,
            url: None,
            clock_tolerance: 0,
        }
    }

    pub fn with_url(mut self, url: &'a str) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_clock_tolerance(mut self, seconds: u64) -> Self {
        self.clock_tolerance = seconds;
        self
    }
}

/// Compute the body hash the way QStash embeds it in the `body` claim.
pub fn body_hash(body: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(body.as_bytes()))
}

/// Verify a signature token against a single signing key.
///
/// Fails fast on the first failing check.
pub fn verify_with_key(key: &str, request: &VerifyRequest<'_>) -> Result<(), SignatureError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(REQUIRED_CLAIMS);
    validation.leeway = request.clock_tolerance;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // `aud` is present but empty on QStash tokens.
    validation.validate_aud = false;

    let decoded = decode::<Claims>(
        request.signature,
        &DecodingKey::from_secret(key.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => SignatureError::new("Signature has expired"),
        _ => SignatureError::new(format!("Error while decoding signature: {}", e)),
    })?;
    let claims = decoded.claims;

    if let Some(url) = request.url {
        if claims.sub != url {
            return Err(SignatureError::new(format!(
                "Invalid subject: {}, want: {}",
                claims.sub, url
            )));
        }
    }

    let expected = body_hash(request.body);
    if claims.body.trim_end_matches('=') != expected {
        return Err(SignatureError::new(format!(
            "Invalid body hash: {}, want: {}",
            claims.body, expected
        )));
    }

    Ok(())
}
