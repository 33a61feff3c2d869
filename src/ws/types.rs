//! WebSocket subscription types
//!
//! Channel names, subscription parameters and the message envelope for the
//! exchange's real-time feed.

use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ClientResult};

// =============================================================================
// Channels
// =============================================================================

/// Real-time channels the exchange offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionChannel {
    /// L2 order book snapshots for one coin
    L2Book,
    /// Public trades for one coin
    Trades,
    /// OHLCV candles for one coin + interval
    Candle,
    /// Fills, funding and liquidations for the account
    UserEvents,
    /// Order lifecycle updates for the account
    OrderUpdates,
    /// Fills for the account
    UserFills,
}

impl SubscriptionChannel {
    /// Wire name used in subscribe messages and envelope routing
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionChannel::L2Book => "l2Book",
            SubscriptionChannel::Trades => "trades",
            SubscriptionChannel::Candle => "candle",
            SubscriptionChannel::UserEvents => "userEvents",
            SubscriptionChannel::OrderUpdates => "orderUpdates",
            SubscriptionChannel::UserFills => "userFills",
        }
    }

    pub fn parse(value: &str) -> ClientResult<Self> {
        match value {
            "l2Book" => Ok(SubscriptionChannel::L2Book),
            "trades" => Ok(SubscriptionChannel::Trades),
            "candle" => Ok(SubscriptionChannel::Candle),
            "userEvents" => Ok(SubscriptionChannel::UserEvents),
            "orderUpdates" => Ok(SubscriptionChannel::OrderUpdates),
            "userFills" => Ok(SubscriptionChannel::UserFills),
            other => Err(ClientError::Validation(format!(
                "Invalid data type: {}. Must be one of [\"l2Book\", \"trades\", \"candle\"]",
                other
            ))),
        }
    }

    /// Whether the channel is scoped to the account address
    pub fn requires_user(&self) -> bool {
        matches!(
            self,
            SubscriptionChannel::UserEvents
                | SubscriptionChannel::OrderUpdates
                | SubscriptionChannel::UserFills
        )
    }
}

impl std::fmt::Display for SubscriptionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Filter parameters attached to a subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl SubscriptionParams {
    pub fn for_coin(coin: &str) -> Self {
        Self { coin: Some(coin.to_string()), ..Self::default() }
    }

    pub fn for_user(user: &str) -> Self {
        Self { user: Some(user.to_string()), ..Self::default() }
    }
}

/// Build the subscription object sent in subscribe/unsubscribe messages
pub fn subscription_object(
    channel: SubscriptionChannel,
    params: &SubscriptionParams,
) -> serde_json::Value {
    let mut object = serde_json::json!({"type": channel.as_str()});
    if let Some(coin) = &params.coin {
        object["coin"] = serde_json::Value::String(coin.clone());
    }
    if let Some(user) = &params.user {
        object["user"] = serde_json::Value::String(user.clone());
    }
    if let Some(interval) = &params.interval {
        object["interval"] = serde_json::Value::String(interval.clone());
    }
    object
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Subscription lifecycle: Requested until the exchange acks, Closed on
/// unsubscribe or when the connection is given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Requested,
    Active,
    Closed,
}

// =============================================================================
// Envelope
// =============================================================================

/// Top-level feed message: {"channel": "...", "data": ...}
#[derive(Debug, Clone, Deserialize)]
pub struct WsEnvelope {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WsEnvelope {
    /// Coin the payload refers to, when the channel carries one.
    ///
    /// l2Book data has a `coin` field, candle data an `s` field, trades come
    /// as an array whose entries carry `coin`.
    pub fn data_coin(&self) -> Option<&str> {
        if let Some(coin) = self.data.get("coin").and_then(|c| c.as_str()) {
            return Some(coin);
        }
        if let Some(symbol) = self.data.get("s").and_then(|s| s.as_str()) {
            return Some(symbol);
        }
        self.data
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|t| t.get("coin"))
            .and_then(|c| c.as_str())
    }
}
