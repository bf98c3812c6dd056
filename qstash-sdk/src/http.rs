//! HTTP transport for the QStash REST API.
//!
//! Every request carries the bearer token. Transport failures (connection
//! refused, timeouts) are retried according to a [`RetryConfig`]; HTTP error
//! responses are not retried and are mapped to [`QStashError`] variants.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::HeaderMap, Client, Method, Response};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::error::{QStashError, Result};

/// Base URL of the hosted QStash API.
pub const BASE_URL: &str = "https://qstash.upstash.io";

/// Computes the delay before the given retry attempt (0-based).
pub type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Controls how transport failures are retried.
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial request fails.
    pub retries: u32,
    pub backoff: Backoff,
}

impl RetryConfig {
    pub fn new(retries: u32, backoff: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            retries,
            backoff: Arc::new(backoff),
        }
    }

    /// Perform a single attempt only.
    pub fn none() -> Self {
        Self::new(0, |_| Duration::ZERO)
    }

    /// Default backoff with a custom number of retries.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5, |attempt| {
            Duration::from_secs_f64((1.0 + attempt as f64).exp() * 50.0 / 1000.0)
        })
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Request timeouts for the underlying HTTP client.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(600),
            connect: Duration::from_secs(5),
        }
    }
}

/// Authenticated HTTP client with retry on transport failures.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    authorization: String,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Fails when `base_url` is not a valid URL or the underlying HTTP client
    /// cannot be built.
    pub fn new(
        token: &str,
        retry: RetryConfig,
        base_url: Option<&str>,
        timeouts: Timeouts,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.unwrap_or(BASE_URL))?;

        let client = Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;

        Ok(Self {
            client,
            base_url,
            authorization: format!("Bearer {}", token),
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request and deserialize the JSON response body.
    pub async fn request_json<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let response = self.send(method, path).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Append `path` to the base URL, keeping any path prefix on the base.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    async fn send(&self, method: Method, path: &str) -> Result<Response> {
        let url = self.endpoint(path)?;
        let max_attempts = 1 + self.retry.retries;

        let mut attempt = 0;
        let response = loop {
            let result = self
                .client
                .request(method.clone(), url.clone())
                .header(reqwest::header::AUTHORIZATION, &self.authorization)
                .send()
                .await;

            match result {
                Ok(response) => break response,
                Err(e) if attempt + 1 < max_attempts => {
                    let backoff = (self.retry.backoff)(attempt);
                    warn!(
                        method = %method,
                        path = path,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "qstash_request_retry"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        method = %method,
                        path = path,
                        attempts = max_attempts,
                        error = %e,
                        "qstash_request_failed"
                    );
                    return Err(e.into());
                }
            }
        };

        info!(
            method = %method,
            path = path,
            status_code = response.status().as_u16(),
            "qstash_request_complete"
        );

        raise_for_status(response).await
    }
}

/// Map a non-2xx response to the matching [`QStashError`].
///
/// 429 responses are classified by the rate-limit headers they carry.
pub async fn raise_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        return Err(rate_limit_error(response.headers()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(QStashError::Request {
        status: status.as_u16(),
        body,
    })
}

fn rate_limit_error(headers: &HeaderMap) -> QStashError {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if headers.contains_key("x-ratelimit-limit-requests") {
        QStashError::ChatRateLimitExceeded {
            limit_requests: get("x-ratelimit-limit-requests"),
            limit_tokens: get("x-ratelimit-limit-tokens"),
            remaining_requests: get("x-ratelimit-remaining-requests"),
            remaining_tokens: get("x-ratelimit-remaining-tokens"),
            reset_requests: get("x-ratelimit-reset-requests"),
            reset_tokens: get("x-ratelimit-reset-tokens"),
        }
    } else if headers.contains_key("RateLimit-Limit") {
        QStashError::DailyMessageLimitExceeded {
            limit: get("RateLimit-Limit"),
            remaining: get("RateLimit-Remaining"),
            reset: get("RateLimit-Reset"),
        }
    } else {
        QStashError::RateLimitExceeded {
            limit: get("Burst-RateLimit-Limit"),
            remaining: get("Burst-RateLimit-Remaining"),
            reset: get("Burst-RateLimit-Reset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn client(base_url: &str, retry: RetryConfig) -> HttpClient {
        HttpClient::new("test-token", retry, Some(base_url), Timeouts::default()).unwrap()
    }

    #[test]
    fn test_default_retry() {
        let retry = RetryConfig::default();
        assert_eq!(retry.retries, 5);
        // exp(1) * 50ms
        assert_eq!((retry.backoff)(0).as_millis(), 135);
        assert!((retry.backoff)(1) > (retry.backoff)(0));
    }

    #[test]
    fn test_no_retry() {
        let retry = RetryConfig::none();
        assert_eq!(retry.retries, 0);
        assert_eq!((retry.backoff)(3), Duration::ZERO);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpClient::new("t", RetryConfig::none(), Some("not a url"), Timeouts::default());
        assert!(matches!(result, Err(QStashError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_request_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/keys")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let value: Value = client(&server.url(), RetryConfig::none())
            .request_json(Method::GET, "/v2/keys")
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        mock.assert_async().await;
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let http = client("https://proxy.example.com/qstash/", RetryConfig::none());
        assert_eq!(
            http.endpoint("/v2/keys").unwrap().as_str(),
            "https://proxy.example.com/qstash/v2/keys"
        );

        let http = client(BASE_URL, RetryConfig::none());
        assert_eq!(
            http.endpoint("/v2/keys/rotate").unwrap().as_str(),
            "https://qstash.upstash.io/v2/keys/rotate"
        );
    }

    #[tokio::test]
    async fn test_request_with_prefixed_base_url() {
        let mut server = mockito::Server::new_async().await;
        let prefixed = server
            .mock("GET", "/proxy/v2/keys")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;
        let root = server
            .mock("GET", "/v2/keys")
            .with_status(404)
            .with_body("wrong path")
            .expect(0)
            .create_async()
            .await;

        let base = format!("{}/proxy", server.url());
        let value: Value = client(&base, RetryConfig::none())
            .request_json(Method::GET, "/v2/keys")
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        prefixed.assert_async().await;
        root.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/keys")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let result: Result<Value> = client(&server.url(), RetryConfig::with_retries(3))
            .request_json(Method::GET, "/v2/keys")
            .await;

        assert!(matches!(
            result,
            Err(QStashError::Request { status: 500, ref body }) if body == "boom"
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_burst_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/keys/rotate")
            .with_status(429)
            .with_header("Burst-RateLimit-Limit", "100")
            .with_header("Burst-RateLimit-Remaining", "0")
            .with_header("Burst-RateLimit-Reset", "1700000000")
            .create_async()
            .await;

        let result: Result<Value> = client(&server.url(), RetryConfig::none())
            .request_json(Method::POST, "/v2/keys/rotate")
            .await;

        match result {
            Err(QStashError::RateLimitExceeded { limit, remaining, reset }) => {
                assert_eq!(limit.as_deref(), Some("100"));
                assert_eq!(remaining.as_deref(), Some("0"));
                assert_eq!(reset.as_deref(), Some("1700000000"));
            }
            other => panic!("expected burst rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_daily_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/keys")
            .with_status(429)
            .with_header("RateLimit-Limit", "500")
            .with_header("RateLimit-Remaining", "0")
            .create_async()
            .await;

        let result: Result<Value> = client(&server.url(), RetryConfig::none())
            .request_json(Method::GET, "/v2/keys")
            .await;

        assert!(matches!(
            result,
            Err(QStashError::DailyMessageLimitExceeded { ref limit, ref reset, .. })
                if limit.as_deref() == Some("500") && reset.is_none()
        ));
    }

    #[tokio::test]
    async fn test_chat_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/keys")
            .with_status(429)
            .with_header("x-ratelimit-limit-requests", "10")
            .with_header("x-ratelimit-limit-tokens", "1000")
            .with_header("RateLimit-Limit", "500")
            .create_async()
            .await;

        let result: Result<Value> = client(&server.url(), RetryConfig::none())
            .request_json(Method::GET, "/v2/keys")
            .await;

        assert!(matches!(
            result,
            Err(QStashError::ChatRateLimitExceeded { ref limit_requests, ref limit_tokens, .. })
                if limit_requests.as_deref() == Some("10") && limit_tokens.as_deref() == Some("1000")
        ));
    }

    #[tokio::test]
    async fn test_transport_error_after_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = attempts.clone();
        let retry = RetryConfig::new(2, move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Duration::ZERO
        });

        let result: Result<Value> = client(&format!("http://{}", addr), retry)
            .request_json(Method::GET, "/v2/keys")
            .await;

        assert!(matches!(result, Err(QStashError::Transport(_))));
        // Backoff runs between attempts only: 3 attempts, 2 sleeps.
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/keys")
            .with_status(200)
            .with_body("{ invalid json }")
            .create_async()
            .await;

        let result: Result<Value> = client(&server.url(), RetryConfig::none())
            .request_json(Method::GET, "/v2/keys")
            .await;

        assert!(matches!(result, Err(QStashError::Decode(_))));
    }
}
