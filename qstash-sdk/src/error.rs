//! Error types shared by the client and the receiver.

use thiserror::Error;

/// Failure to verify an inbound QStash signature.
///
/// Every verification failure (expired token, malformed token, subject or
/// body hash mismatch) is reported through this single type. The message is
/// the only thing that distinguishes the causes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SignatureError {
    message: String,
}

impl SignatureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by the QStash client.
#[derive(Debug, Error)]
pub enum QStashError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(
        "Exceeded burst rate limit: Limit: {}, remaining: {}, reset: {}",
        or_none(.limit),
        or_none(.remaining),
        or_none(.reset)
    )]
    RateLimitExceeded {
        limit: Option<String>,
        remaining: Option<String>,
        reset: Option<String>,
    },

    #[error(
        "Exceeded daily message limit: Limit: {}, remaining: {}, reset: {}",
        or_none(.limit),
        or_none(.remaining),
        or_none(.reset)
    )]
    DailyMessageLimitExceeded {
        limit: Option<String>,
        remaining: Option<String>,
        reset: Option<String>,
    },

    #[error(
        "Exceeded chat rate limit: request limit: {}, token limit: {}, \
         remaining requests: {}, remaining tokens: {}, \
         reset requests: {}, reset tokens: {}",
        or_none(.limit_requests),
        or_none(.limit_tokens),
        or_none(.remaining_requests),
        or_none(.remaining_tokens),
        or_none(.reset_requests),
        or_none(.reset_tokens)
    )]
    ChatRateLimitExceeded {
        limit_requests: Option<String>,
        limit_tokens: Option<String>,
        remaining_requests: Option<String>,
        remaining_tokens: Option<String>,
        reset_requests: Option<String>,
        reset_tokens: Option<String>,
    },

    /// Any other non-2xx response.
    #[error("Request failed with status: {status}, body: {body}")]
    Request { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("QSTASH_TOKEN is not configured")]
    MissingToken,

    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Rate-limit header value as shown in error messages.
fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

pub type Result<T, E = QStashError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_message() {
        let err = SignatureError::new("Signature has expired");
        assert_eq!(err.message(), "Signature has expired");
        assert_eq!(err.to_string(), "Signature has expired");
    }

    #[test]
    fn test_signature_error_converts_transparently() {
        let err: QStashError = SignatureError::new("Invalid subject: a, want: b").into();
        assert_eq!(err.to_string(), "Invalid subject: a, want: b");
    }

    #[test]
    fn test_burst_rate_limit_display() {
        let err = QStashError::RateLimitExceeded {
            limit: Some("100".to_string()),
            remaining: Some("0".to_string()),
            reset: None,
        };
        assert_eq!(
            err.to_string(),
            "Exceeded burst rate limit: Limit: 100, remaining: 0, reset: None"
        );
    }

    #[test]
    fn test_daily_message_limit_display() {
        let err = QStashError::DailyMessageLimitExceeded {
            limit: Some("500".to_string()),
            remaining: Some("0".to_string()),
            reset: Some("1700000000".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Exceeded daily message limit: Limit: 500, remaining: 0, reset: 1700000000"
        );
    }

    #[test]
    fn test_chat_rate_limit_display() {
        let err = QStashError::ChatRateLimitExceeded {
            limit_requests: Some("10".to_string()),
            limit_tokens: Some("1000".to_string()),
            remaining_requests: Some("0".to_string()),
            remaining_tokens: Some("250".to_string()),
            reset_requests: Some("1s".to_string()),
            reset_tokens: None,
        };
        assert_eq!(
            err.to_string(),
            "Exceeded chat rate limit: request limit: 10, token limit: 1000, \
             remaining requests: 0, remaining tokens: 250, \
             reset requests: 1s, reset tokens: None"
        );
    }

    #[test]
    fn test_request_error_display() {
        let err = QStashError::Request {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request failed with status: 404, body: not found"
        );
    }
}
