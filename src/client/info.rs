//! Info endpoint client
//!
//! Read-only queries against `POST /info`. Every query is idempotent, so
//! the transport retries transient failures up to the configured budget.

use std::collections::HashMap;

use super::error::{ClientError, ClientResult};
use super::http::{HttpTransport, RetryPolicy};
use super::types::{
    parse_wire_f64, Candle, HistoricalOrder, L2Snapshot, OpenOrder, PublicTrade, RateLimitInfo,
    UserFill, UserState,
};

const INFO_PATH: &str = "/info";

/// Candle intervals accepted by the exchange
pub const VALID_INTERVALS: [&str; 6] = ["1m", "5m", "15m", "1h", "4h", "1d"];

/// Interval string to milliseconds
pub fn interval_ms(interval: &str) -> ClientResult<u64> {
    match interval {
        "1m" => Ok(60_000),
        "5m" => Ok(300_000),
        "15m" => Ok(900_000),
        "1h" => Ok(3_600_000),
        "4h" => Ok(14_400_000),
        "1d" => Ok(86_400_000),
        other => Err(ClientError::Validation(format!(
            "Invalid interval: {}. Must be one of: {:?}",
            other, VALID_INTERVALS
        ))),
    }
}

/// Client for the read-only info endpoint
#[derive(Debug, Clone)]
pub struct InfoClient {
    transport: HttpTransport,
}

impl InfoClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    async fn query(&self, body: serde_json::Value) -> ClientResult<serde_json::Value> {
        self.transport
            .post_json(INFO_PATH, &body, RetryPolicy::Retry)
            .await
    }

    fn decode<T: serde::de::DeserializeOwned>(
        value: serde_json::Value,
        what: &str,
    ) -> ClientResult<T> {
        serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad {} payload: {}", what, e)))
    }

    // =========================================================================
    // Market data
    // =========================================================================

    /// Mid prices for every listed coin
    pub async fn all_mids(&self) -> ClientResult<HashMap<String, f64>> {
        let value = self.query(serde_json::json!({"type": "allMids"})).await?;
        let raw: HashMap<String, String> = Self::decode(value, "allMids")?;
        let mut mids = HashMap::with_capacity(raw.len());
        for (coin, px) in raw {
            mids.insert(coin.clone(), parse_wire_f64(&px, &format!("mid for {}", coin))?);
        }
        Ok(mids)
    }

    /// L2 order book snapshot for one coin
    pub async fn l2_snapshot(&self, coin: &str) -> ClientResult<L2Snapshot> {
        let value = self
            .query(serde_json::json!({"type": "l2Book", "coin": coin}))
            .await?;
        Self::decode(value, "l2Book")
    }

    /// The most recent `limit` candles for coin/interval, ending now
    pub async fn candles_snapshot(
        &self,
        coin: &str,
        interval: &str,
        limit: u64,
    ) -> ClientResult<Vec<Candle>> {
        let step = interval_ms(interval)?;
        let end = super::types::current_time_ms();
        let start = end.saturating_sub(step.saturating_mul(limit));
        let value = self
            .query(serde_json::json!({
                "type": "candleSnapshot",
                "req": {"coin": coin, "interval": interval, "startTime": start, "endTime": end},
            }))
            .await?;
        Self::decode(value, "candleSnapshot")
    }

    /// Recent public trades for one coin (exchange returns newest-last)
    pub async fn recent_trades(&self, coin: &str) -> ClientResult<Vec<PublicTrade>> {
        let value = self
            .query(serde_json::json!({"type": "recentTrades", "coin": coin}))
            .await?;
        Self::decode(value, "recentTrades")
    }

    /// Perp metadata (universe of listed assets)
    pub async fn meta(&self) -> ClientResult<serde_json::Value> {
        self.query(serde_json::json!({"type": "meta"})).await
    }

    /// Perp metadata zipped with live per-asset contexts
    pub async fn meta_and_asset_ctxs(&self) -> ClientResult<serde_json::Value> {
        self.query(serde_json::json!({"type": "metaAndAssetCtxs"})).await
    }

    // =========================================================================
    // Account queries
    // =========================================================================

    /// Clearinghouse state: balances, margin, positions
    pub async fn user_state(&self, address: &str) -> ClientResult<UserState> {
        let value = self
            .query(serde_json::json!({"type": "clearinghouseState", "user": address}))
            .await?;
        Self::decode(value, "clearinghouseState")
    }

    /// All resting orders for the account
    pub async fn open_orders(&self, address: &str) -> ClientResult<Vec<OpenOrder>> {
        let value = self
            .query(serde_json::json!({"type": "openOrders", "user": address}))
            .await?;
        Self::decode(value, "openOrders")
    }

    /// Recent fills for the account (exchange caps the window)
    pub async fn user_fills(&self, address: &str) -> ClientResult<Vec<UserFill>> {
        let value = self
            .query(serde_json::json!({"type": "userFills", "user": address}))
            .await?;
        Self::decode(value, "userFills")
    }

    /// Historical orders with their terminal status
    pub async fn historical_orders(&self, address: &str) -> ClientResult<Vec<HistoricalOrder>> {
        let value = self
            .query(serde_json::json!({"type": "historicalOrders", "user": address}))
            .await?;
        Self::decode(value, "historicalOrders")
    }

    /// Subaccounts owned by the account; exchange returns null when none
    pub async fn subaccounts(&self, address: &str) -> ClientResult<serde_json::Value> {
        self.query(serde_json::json!({"type": "subAccounts", "user": address}))
            .await
    }

    /// Address-level API rate limit usage
    pub async fn user_rate_limit(&self, address: &str) -> ClientResult<RateLimitInfo> {
        let value = self
            .query(serde_json::json!({"type": "userRateLimit", "user": address}))
            .await?;
        Self::decode(value, "userRateLimit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::http::build_http_client;

    fn client(server_url: &str) -> InfoClient {
        InfoClient::new(HttpTransport::new(
            build_http_client(5),
            server_url.to_string(),
            1,
        ))
    }

    #[test]
    fn test_interval_ms() {
        assert_eq!(interval_ms("1m").unwrap(), 60_000);
        assert_eq!(interval_ms("1d").unwrap(), 86_400_000);
        assert!(interval_ms("2h").is_err());
    }

    #[tokio::test]
    async fn test_all_mids_parses_and_converts() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/info")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"type": "allMids"})))
            .with_status(200)
            .with_body(r#"{"BTC": "96000.5", "ETH": "2501.25"}"#)
            .create_async()
            .await;

        let mids = client(&server.url()).all_mids().await.unwrap();
        assert_eq!(mids["BTC"], 96000.5);
        assert_eq!(mids["ETH"], 2501.25);
    }

    #[tokio::test]
    async fn test_all_mids_rejects_garbage_price() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/info")
            .with_status(200)
            .with_body(r#"{"BTC": "oops"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).all_mids().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_open_orders_decodes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/info")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"type": "openOrders", "user": "0xabc"}),
            ))
            .with_status(200)
            .with_body(
                r#"[{"coin":"BTC","oid":1234,"side":"B","limitPx":"95000","sz":"0.5",
                     "origSz":"0.5","timestamp":1700000000000}]"#,
            )
            .create_async()
            .await;

        let orders = client(&server.url()).open_orders("0xabc").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].oid, 1234);
        assert_eq!(orders[0].side_name(), "buy");
    }

    #[tokio::test]
    async fn test_user_rate_limit_decodes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/info")
            .with_status(200)
            .with_body(r#"{"nRequestsUsed": 120, "nRequestsCap": 1200, "cumVlm": "100000"}"#)
            .create_async()
            .await;

        let info = client(&server.url()).user_rate_limit("0xabc").await.unwrap();
        assert_eq!(info.n_requests_used, 120);
        assert_eq!(info.n_requests_cap, 1200);
    }
}
