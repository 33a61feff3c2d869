//! Exchange client error types
//!
//! All failures crossing the adapter boundary are wrapped in ClientError
//! which implements thiserror for consistent error handling. The variants
//! map one-to-one onto the error categories surfaced to the tool host.

use thiserror::Error;

/// Error taxonomy for exchange adapter operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request was malformed before any network call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credentials rejected by the exchange; fatal for the session
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Exchange rate limit hit and bounded retries exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport failure or timeout; safe to retry unless the operation
    /// lacks an idempotency key
    #[error("Network error: {0}")]
    Network(String),

    /// Exchange accepted the request but rejected the operation; terminal,
    /// message surfaced verbatim
    #[error("Exchange rejected: {0}")]
    Rejected(String),

    /// Response arrived but could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Subscription to a real-time channel failed
    #[error("Subscription failed for {channel}: {reason}")]
    Subscription { channel: String, reason: String },

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl ClientError {
    /// Whether a failed operation may be re-attempted with backoff.
    ///
    /// Rate limits and transport failures are transient; everything else is
    /// terminal for the request (or, for Auth, the session).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::RateLimited(_) | ClientError::Network(_))
    }

    /// Stable category name surfaced to the tool host
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "validation_error",
            ClientError::Auth(_) => "auth_error",
            ClientError::RateLimited(_) => "rate_limit_error",
            ClientError::Network(_) => "network_error",
            ClientError::Rejected(_) => "exchange_rejected",
            ClientError::InvalidResponse(_) => "invalid_response",
            ClientError::Subscription { .. } => "subscription_error",
            ClientError::WebSocket(_) => "websocket_error",
        }
    }
}

/// Result type alias for exchange client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = ClientError::Validation("Order size must be positive, got -1".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: Order size must be positive, got -1"
        );
    }

    #[test]
    fn test_subscription_display() {
        let err = ClientError::Subscription {
            channel: "l2Book".to_string(),
            reason: "not connected".to_string(),
        };
        assert_eq!(err.to_string(), "Subscription failed for l2Book: not connected");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::RateLimited("429".into()).is_retryable());
        assert!(ClientError::Network("timeout".into()).is_retryable());
        assert!(!ClientError::Rejected("insufficient margin".into()).is_retryable());
        assert!(!ClientError::Auth("bad signature".into()).is_retryable());
        assert!(!ClientError::Validation("size".into()).is_retryable());
    }

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(ClientError::Validation("x".into()).category(), "validation_error");
        assert_eq!(ClientError::RateLimited("x".into()).category(), "rate_limit_error");
        assert_eq!(ClientError::Rejected("x".into()).category(), "exchange_rejected");
        assert_eq!(ClientError::Network("x".into()).category(), "network_error");
    }
}
