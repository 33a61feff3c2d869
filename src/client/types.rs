//! Request and wire types for the Hyperliquid REST API
//!
//! The exchange encodes most numeric fields as strings on the wire
//! (`px`/`sz` style); these types keep the wire shape and expose parsed
//! accessors where callers need numbers.

use serde::{Deserialize, Serialize};

use super::error::{ClientError, ClientResult};

// =============================================================================
// Order requests
// =============================================================================

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy { OrderSide::Buy } else { OrderSide::Sell }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Time in force for limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tif {
    /// Good til canceled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Add liquidity only (post-only)
    Alo,
}

impl Tif {
    pub fn parse(value: &str) -> ClientResult<Self> {
        match value {
            "Gtc" => Ok(Tif::Gtc),
            "Ioc" => Ok(Tif::Ioc),
            "Alo" => Ok(Tif::Alo),
            other => Err(ClientError::Validation(format!(
                "Invalid time in force: {}. Must be 'Gtc', 'Ioc', or 'Alo'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tif::Gtc => "Gtc",
            Tif::Ioc => "Ioc",
            Tif::Alo => "Alo",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn parse(value: &str) -> ClientResult<Self> {
        match value {
            "limit" => Ok(OrderType::Limit),
            "market" => Ok(OrderType::Market),
            other => Err(ClientError::Validation(format!(
                "Invalid order_type: {}. Must be 'limit' or 'market'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

/// Validated request for a single order placement
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Coin symbol, e.g. "BTC"
    pub coin: String,
    pub side: OrderSide,
    /// Size in base currency units
    pub size: f64,
    /// Limit price; None only for market orders (priced from the mid)
    pub price: Option<f64>,
    pub order_type: OrderType,
    pub tif: Tif,
    pub reduce_only: bool,
    /// Client order id; doubles as the idempotency key for retries
    pub cloid: Option<String>,
}

impl OrderRequest {
    /// Check invariants before anything touches the network.
    pub fn validate(&self) -> ClientResult<()> {
        if self.coin.trim().is_empty() {
            return Err(ClientError::Validation("Coin symbol cannot be empty".into()));
        }
        if !(self.size > 0.0) || !self.size.is_finite() {
            return Err(ClientError::Validation(format!(
                "Order size must be positive, got {}",
                self.size
            )));
        }
        if let Some(px) = self.price {
            if !(px > 0.0) || !px.is_finite() {
                return Err(ClientError::Validation(format!(
                    "Order price must be positive, got {}",
                    px
                )));
            }
        }
        if self.order_type == OrderType::Limit && self.price.is_none() {
            return Err(ClientError::Validation(
                "Limit orders require a price".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Exchange response envelope
// =============================================================================

/// Top-level `/exchange` response: {"status": "ok"|"err", "response": ...}
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeEnvelope {
    pub status: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

/// Per-order status inside an order/cancel response
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatus {
    #[serde(default)]
    pub resting: Option<RestingOrder>,
    #[serde(default)]
    pub filled: Option<FilledOrder>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilledOrder {
    pub oid: u64,
    #[serde(rename = "totalSz")]
    pub total_sz: String,
    #[serde(rename = "avgPx")]
    pub avg_px: String,
}

/// Extract the per-order statuses from an "ok" exchange response
pub fn order_statuses(response: &serde_json::Value) -> Vec<OrderStatus> {
    response
        .pointer("/data/statuses")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|s| serde_json::from_value(s.clone()).unwrap_or(OrderStatus {
                    resting: None,
                    filled: None,
                    error: Some(format!("Unrecognized order status: {}", s)),
                }))
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Info wire types
// =============================================================================

/// A single price level in an L2 snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct L2Level {
    /// Price as string
    pub px: String,
    /// Size as string
    pub sz: String,
    /// Number of orders at this level
    pub n: u64,
}

impl L2Level {
    pub fn price(&self) -> ClientResult<f64> {
        parse_wire_f64(&self.px, "level price")
    }

    pub fn size(&self) -> ClientResult<f64> {
        parse_wire_f64(&self.sz, "level size")
    }
}

/// L2 order book snapshot: levels[0] = bids (descending), levels[1] = asks
/// (ascending)
#[derive(Debug, Clone, Deserialize)]
pub struct L2Snapshot {
    pub coin: String,
    pub levels: (Vec<L2Level>, Vec<L2Level>),
    pub time: u64,
}

/// OHLCV candle
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    /// Open time (ms)
    pub t: u64,
    /// Interval, e.g. "1h"
    pub i: String,
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
    pub v: String,
    /// Number of trades
    #[serde(default)]
    pub n: Option<u64>,
}

/// Public trade
#[derive(Debug, Clone, Deserialize)]
pub struct PublicTrade {
    pub coin: String,
    /// "B" for buy, "A" for sell (aggressor side)
    pub side: String,
    pub px: String,
    pub sz: String,
    pub time: u64,
    #[serde(default)]
    pub tid: Option<u64>,
}

/// Margin summary inside the clearinghouse state
#[derive(Debug, Clone, Deserialize)]
pub struct MarginSummary {
    #[serde(rename = "accountValue")]
    pub account_value: String,
    #[serde(rename = "totalMarginUsed")]
    pub total_margin_used: String,
    #[serde(rename = "totalNtlPos")]
    pub total_ntl_pos: String,
    #[serde(rename = "totalRawUsd")]
    pub total_raw_usd: String,
}

/// Leverage setting on a position
#[derive(Debug, Clone, Deserialize)]
pub struct PositionLeverage {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

/// One open position
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub coin: String,
    /// Signed size: positive long, negative short
    pub szi: String,
    #[serde(rename = "entryPx", default)]
    pub entry_px: Option<String>,
    pub leverage: PositionLeverage,
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: String,
    #[serde(rename = "marginUsed")]
    pub margin_used: String,
    #[serde(rename = "positionValue")]
    pub position_value: String,
    #[serde(rename = "returnOnEquity")]
    pub return_on_equity: String,
    #[serde(rename = "liquidationPx", default)]
    pub liquidation_px: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: Position,
}

/// Clearinghouse state for one account
#[derive(Debug, Clone, Deserialize)]
pub struct UserState {
    #[serde(rename = "marginSummary")]
    pub margin_summary: MarginSummary,
    #[serde(rename = "crossMarginSummary", default)]
    pub cross_margin_summary: Option<MarginSummary>,
    pub withdrawable: String,
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<AssetPosition>,
}

/// One resting order from the openOrders query
#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrder {
    pub coin: String,
    pub oid: u64,
    /// "B" bid / "A" ask
    pub side: String,
    #[serde(rename = "limitPx")]
    pub limit_px: String,
    pub sz: String,
    #[serde(rename = "origSz", default)]
    pub orig_sz: Option<String>,
    pub timestamp: u64,
    #[serde(default)]
    pub cloid: Option<String>,
}

impl OpenOrder {
    pub fn side_name(&self) -> &'static str {
        if self.side == "B" { "buy" } else { "sell" }
    }
}

/// One fill from the userFills query
#[derive(Debug, Clone, Deserialize)]
pub struct UserFill {
    pub coin: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub time: u64,
    pub oid: u64,
    #[serde(rename = "closedPnl", default)]
    pub closed_pnl: Option<String>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// One entry from the historicalOrders query
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalOrder {
    pub order: OpenOrder,
    pub status: String,
    #[serde(rename = "statusTimestamp")]
    pub status_timestamp: u64,
}

/// userRateLimit query response
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitInfo {
    #[serde(rename = "nRequestsUsed")]
    pub n_requests_used: u64,
    #[serde(rename = "nRequestsCap")]
    pub n_requests_cap: u64,
    #[serde(rename = "cumVlm", default)]
    pub cum_vlm: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse a wire string-number, mapping failure to InvalidResponse
pub fn parse_wire_f64(value: &str, what: &str) -> ClientResult<f64> {
    value
        .parse::<f64>()
        .map_err(|e| ClientError::InvalidResponse(format!("Invalid {}: {}", what, e)))
}

/// Lenient string-number parse used for cosmetic response fields
pub fn safe_f64(value: &str) -> f64 {
    value.parse::<f64>().unwrap_or(0.0)
}

/// Millisecond timestamp as ISO-8601 UTC, falling back to the raw number
pub fn format_timestamp_ms(timestamp_ms: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp_ms as i64) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => timestamp_ms.to_string(),
    }
}

/// Current time as ISO-8601 UTC
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Current Unix time in milliseconds
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
