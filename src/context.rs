//! Application context
//!
//! One credential set per process, wired into the info/exchange clients and
//! the feed manager at startup and threaded through every dispatch call.
//! Never a global: tests construct contexts against local mock endpoints.

use crate::client::{build_http_client, ExchangeClient, HttpTransport, InfoClient};
use crate::config::{Credentials, Settings};
use crate::error::Result;
use crate::ws::WsManager;

/// Shared state behind the tool dispatch layer
pub struct AppContext {
    pub credentials: Credentials,
    pub settings: Settings,
    pub info: InfoClient,
    pub exchange: ExchangeClient,
    pub ws: WsManager,
}

impl AppContext {
    /// Build all clients from validated credentials and settings.
    pub fn new(credentials: Credentials, settings: Settings) -> Result<Self> {
        let http = build_http_client(settings.request_timeout_secs);
        let transport = HttpTransport::new(
            http,
            credentials.api_url.clone(),
            settings.max_retry_attempts,
        );
        let info = InfoClient::new(transport.clone());
        let wallet = credentials.wallet()?;
        let exchange = ExchangeClient::new(
            transport,
            info.clone(),
            wallet,
            credentials.network,
            credentials.account_address.clone(),
            settings.default_slippage,
        );
        let ws = WsManager::new(
            credentials.ws_url.clone(),
            settings.max_retry_attempts,
            settings.ws_timeout_secs,
        );

        Ok(Self {
            credentials,
            settings,
            info,
            exchange,
            ws,
        })
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("credentials", &self.credentials)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_context_builds_from_credentials() {
        let credentials =
            Credentials::new(TEST_KEY.into(), TEST_ADDR.into(), Network::Testnet).unwrap();
        let ctx = AppContext::new(credentials, Settings::default()).unwrap();
        assert_eq!(ctx.exchange.account_address(), TEST_ADDR);
        let dbg = format!("{:?}", ctx);
        assert!(!dbg.contains(&TEST_KEY[2..]), "key leaked into Debug");
    }

    #[test]
    fn test_context_is_spawn_friendly() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppContext>();
    }
}
