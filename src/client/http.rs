//! HTTP transport for the REST API
//!
//! One pooled reqwest client shared by the info and exchange halves, plus a
//! retrying POST helper that classifies failures into the adapter's error
//! taxonomy. Retries are bounded and exponential with jitter; callers opt
//! out for operations that are not idempotent.

use std::time::Duration;

use super::error::{ClientError, ClientResult};
use crate::config::settings::{RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS};

// =============================================================================
// HTTP Client Constants
// =============================================================================

/// HTTP connection timeout (milliseconds); fail fast if host unreachable
const HTTP_CONNECT_TIMEOUT_MS: u64 = 1500;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 5;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;
/// TCP keepalive interval (seconds)
const HTTP_TCP_KEEPALIVE_SECS: u64 = 30;

/// Create the pooled HTTP client used for all REST calls
pub fn build_http_client(request_timeout_secs: u64) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(request_timeout_secs))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(HTTP_TCP_KEEPALIVE_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .tcp_nodelay(true)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::info!(
        phase = "init",
        timeout_s = request_timeout_secs,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        pool_max_idle = HTTP_POOL_MAX_IDLE,
        "HTTP client configured"
    );
    client
}

/// Whether a failed call may be re-sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry on rate-limit/network failures, up to the configured attempts
    Retry,
    /// Single attempt; the caller has no idempotency safeguard
    NoRetry,
}

/// Shared transport: base URL + pooled client + retry budget
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: String, max_attempts: u32) -> Self {
        Self {
            client,
            base_url,
            // A zero budget would mean no request at all
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and decode the JSON response.
    ///
    /// Classification:
    /// - HTTP 429 -> RateLimited (retryable)
    /// - HTTP 401/403 -> Auth (terminal)
    /// - other 4xx -> Rejected with the body text (terminal)
    /// - 5xx, timeouts, transport errors -> Network (retryable)
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        policy: RetryPolicy,
    ) -> ClientResult<serde_json::Value> {
        let attempts = match policy {
            RetryPolicy::Retry => self.max_attempts,
            RetryPolicy::NoRetry => 1,
        };

        let mut last_error: Option<ClientError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff with jitter, same shape as the
                // WebSocket reconnect path
                let jitter = rand::random::<u64>() % 200;
                let backoff_ms = std::cmp::min(
                    RETRY_INITIAL_DELAY_MS * (1u64 << (attempt - 1)),
                    RETRY_MAX_DELAY_MS,
                ) + jitter;
                tracing::debug!(
                    path = path,
                    attempt = attempt + 1,
                    backoff_ms = backoff_ms,
                    "Retrying request"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }

            match self.send_once(path, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    tracing::warn!(path = path, attempt = attempt + 1, error = %e, "Request failed, will retry");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Network("Request failed after max attempts".into())))
    }

    async fn send_once(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ClientResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Network(format!("Request timed out: {}", e))
                } else {
                    ClientError::Network(format!("Transport error: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::RateLimited(format!(
                "429 from {}: {}",
                path, text
            )));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(format!("{} from {}: {}", status, path, text)));
        }
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected(format!("{}: {}", status, text)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Network(format!("{} from {}: {}", status, path, text)));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("Malformed JSON body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(server_url: &str, max_attempts: u32) -> HttpTransport {
        HttpTransport::new(
            build_http_client(5),
            server_url.to_string(),
            max_attempts,
        )
    }

    #[tokio::test]
    async fn test_post_json_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/info")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"BTC": "96000.0"}"#)
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let value = t
            .post_json("/info", &serde_json::json!({"type": "allMids"}), RetryPolicy::Retry)
            .await
            .unwrap();
        assert_eq!(value["BTC"], "96000.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_surfaces() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/info")
            .with_status(429)
            .with_body("rate limit exceeded")
            .expect(3)
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let err = t
            .post_json("/info", &serde_json::json!({"type": "allMids"}), RetryPolicy::Retry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RateLimited(_)), "Got: {}", err);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_retry_policy_sends_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exchange")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let err = t
            .post_json("/exchange", &serde_json::json!({}), RetryPolicy::NoRetry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RateLimited(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exchange")
            .with_status(401)
            .with_body("bad signature")
            .expect(1)
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let err = t
            .post_json("/exchange", &serde_json::json!({}), RetryPolicy::Retry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)), "Got: {}", err);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(400)
            .with_body("unknown type")
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let err = t
            .post_json("/info", &serde_json::json!({"type": "nope"}), RetryPolicy::Retry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)), "Got: {}", err);
    }

    #[tokio::test]
    async fn test_server_error_retries_then_surfaces_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/info")
            .with_status(503)
            .with_body("upstream unavailable")
            .expect(3)
            .create_async()
            .await;

        let t = transport(&server.url(), 3);
        let err = t
            .post_json("/info", &serde_json::json!({"type": "meta"}), RetryPolicy::Retry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "Got: {}", err);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let t = transport(&server.url(), 1);
        let err = t
            .post_json("/info", &serde_json::json!({"type": "meta"}), RetryPolicy::Retry)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[test]
    fn test_zero_attempt_budget_is_clamped() {
        let t = HttpTransport::new(build_http_client(5), "http://localhost".into(), 0);
        assert_eq!(t.max_attempts, 1);
    }
}
