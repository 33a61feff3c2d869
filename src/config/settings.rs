//! Runtime settings
//!
//! Tunables read from environment variables with defaults matching the
//! exchange's documented limits. Separate from credentials so tests can
//! construct them directly.

// =============================================================================
// Defaults
// =============================================================================

/// Default slippage band applied to market orders (1%)
const DEFAULT_SLIPPAGE: f64 = 0.01;
/// Default bounded retry attempts for retryable failures
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
/// Default HTTP request timeout (seconds)
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default WebSocket call timeout (seconds)
const DEFAULT_WS_TIMEOUT_SECS: u64 = 30;
/// Initial retry backoff delay (milliseconds)
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Retry backoff delay cap (milliseconds)
pub const RETRY_MAX_DELAY_MS: u64 = 5000;

/// Runtime knobs for the exchange client and WebSocket manager
#[derive(Debug, Clone)]
pub struct Settings {
    /// Price band applied when converting market orders to aggressive limits
    pub default_slippage: f64,
    /// Bounded attempts for retryable failures (rate limit, network)
    pub max_retry_attempts: u32,
    /// HTTP call class timeout
    pub request_timeout_secs: u64,
    /// WebSocket call class timeout
    pub ws_timeout_secs: u64,
    /// Self-imposed request-weight ceiling, tighter than the exchange cap.
    /// None means the exchange's own cap applies.
    pub rate_limit_budget: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_slippage: DEFAULT_SLIPPAGE,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            ws_timeout_secs: DEFAULT_WS_TIMEOUT_SECS,
            rate_limit_budget: None,
        }
    }
}

impl Settings {
    /// Read settings from environment, falling back to defaults on missing
    /// or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_slippage: env_parse("HYPERLIQUID_DEFAULT_SLIPPAGE", defaults.default_slippage),
            max_retry_attempts: env_parse(
                "HYPERLIQUID_MAX_RETRY_ATTEMPTS",
                defaults.max_retry_attempts,
            ),
            request_timeout_secs: env_parse(
                "HYPERLIQUID_REQUEST_TIMEOUT",
                defaults.request_timeout_secs,
            ),
            ws_timeout_secs: env_parse("HYPERLIQUID_WS_TIMEOUT", defaults.ws_timeout_secs),
            rate_limit_budget: std::env::var("HYPERLIQUID_RATE_LIMIT_BUDGET")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.default_slippage, 0.01);
        assert_eq!(s.max_retry_attempts, 3);
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(s.ws_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("HYPERLIQUID_MAX_RETRY_ATTEMPTS", "5");
        std::env::set_var("HYPERLIQUID_REQUEST_TIMEOUT", "10");
        let s = Settings::from_env();
        assert_eq!(s.max_retry_attempts, 5);
        assert_eq!(s.request_timeout_secs, 10);
        std::env::remove_var("HYPERLIQUID_MAX_RETRY_ATTEMPTS");
        std::env::remove_var("HYPERLIQUID_REQUEST_TIMEOUT");
    }

    #[test]
    #[serial]
    fn test_rate_limit_budget_optional() {
        std::env::remove_var("HYPERLIQUID_RATE_LIMIT_BUDGET");
        assert_eq!(Settings::from_env().rate_limit_budget, None);
        std::env::set_var("HYPERLIQUID_RATE_LIMIT_BUDGET", "800");
        assert_eq!(Settings::from_env().rate_limit_budget, Some(800));
        std::env::remove_var("HYPERLIQUID_RATE_LIMIT_BUDGET");
    }

    #[test]
    #[serial]
    fn test_from_env_garbage_falls_back() {
        std::env::set_var("HYPERLIQUID_MAX_RETRY_ATTEMPTS", "not-a-number");
        let s = Settings::from_env();
        assert_eq!(s.max_retry_attempts, 3);
        std::env::remove_var("HYPERLIQUID_MAX_RETRY_ATTEMPTS");
    }
}
