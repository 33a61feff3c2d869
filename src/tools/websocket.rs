//! WebSocket subscription tools
//!
//! Subscription management for real-time feeds. The connection is opened
//! lazily on the first subscribe call. Each subscription's payloads are
//! drained by a background task so delivery never blocks dispatch; the
//! per-subscription counters are observable via get_active_subscriptions.

use serde::Deserialize;
use tokio::sync::mpsc;

use super::{ToolError, ToolResult};
use crate::context::AppContext;
use crate::ws::{SubscriptionChannel, SubscriptionParams};

/// Market-data channels the subscribe_market_data tool accepts
const MARKET_DATA_TYPES: [&str; 3] = ["l2Book", "trades", "candle"];

/// Drain a subscription's delivery channel in the background.
///
/// The host reads activity through get_active_subscriptions; the payloads
/// themselves are logged at trace level.
fn spawn_drain(id: u64, channel: SubscriptionChannel, mut rx: mpsc::Receiver<serde_json::Value>) {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            tracing::trace!(
                subscription_id = id,
                channel = %channel,
                payload = %payload,
                "Subscription event"
            );
        }
        tracing::debug!(subscription_id = id, "Subscription delivery channel closed");
    });
}

// =============================================================================
// subscribe_user_events
// =============================================================================

pub async fn subscribe_user_events(ctx: &AppContext) -> ToolResult {
    ctx.ws.ensure_connected().await?;

    let account = ctx.exchange.account_address().to_string();
    let (id, rx) = ctx
        .ws
        .subscribe(
            SubscriptionChannel::UserEvents,
            SubscriptionParams::for_user(&account),
        )
        .await?;
    spawn_drain(id, SubscriptionChannel::UserEvents, rx);

    Ok(serde_json::json!({
        "success": true,
        "subscription_id": id,
        "subscription_type": "user_events",
        "account": account,
    }))
}

// =============================================================================
// subscribe_market_data
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MarketDataParams {
    pub coin: String,
    pub data_types: Vec<String>,
}

pub async fn subscribe_market_data(ctx: &AppContext, params: MarketDataParams) -> ToolResult {
    if params.data_types.is_empty() {
        return Err(ToolError::Validation("data_types cannot be empty".into()));
    }
    for data_type in &params.data_types {
        if !MARKET_DATA_TYPES.contains(&data_type.as_str()) {
            return Err(ToolError::Validation(format!(
                "Invalid data type: {}. Must be one of {:?}",
                data_type, MARKET_DATA_TYPES
            )));
        }
    }

    ctx.ws.ensure_connected().await?;

    let mut subscription_ids = Vec::with_capacity(params.data_types.len());
    for data_type in &params.data_types {
        let channel = SubscriptionChannel::parse(data_type)?;
        let mut sub_params = SubscriptionParams::for_coin(&params.coin);
        if channel == SubscriptionChannel::Candle {
            sub_params.interval = Some("1m".to_string());
        }

        match ctx.ws.subscribe(channel, sub_params).await {
            Ok((id, rx)) => {
                spawn_drain(id, channel, rx);
                subscription_ids.push(id);
            }
            Err(e) => {
                // Roll back the ones already created so a failed call leaves
                // no half-subscribed state
                for id in subscription_ids {
                    let _ = ctx.ws.unsubscribe(id).await;
                }
                return Err(ToolError::Client(e));
            }
        }
    }

    Ok(serde_json::json!({
        "success": true,
        "subscription_ids": subscription_ids,
        "coin": params.coin,
        "data_types": params.data_types,
    }))
}

// =============================================================================
// subscribe_order_updates
// =============================================================================

pub async fn subscribe_order_updates(ctx: &AppContext) -> ToolResult {
    ctx.ws.ensure_connected().await?;

    let account = ctx.exchange.account_address().to_string();
    let mut subscription_ids = Vec::with_capacity(2);

    for channel in [
        SubscriptionChannel::OrderUpdates,
        SubscriptionChannel::UserFills,
    ] {
        match ctx
            .ws
            .subscribe(channel, SubscriptionParams::for_user(&account))
            .await
        {
            Ok((id, rx)) => {
                spawn_drain(id, channel, rx);
                subscription_ids.push(id);
            }
            Err(e) => {
                for id in subscription_ids {
                    let _ = ctx.ws.unsubscribe(id).await;
                }
                return Err(ToolError::Client(e));
            }
        }
    }

    Ok(serde_json::json!({
        "success": true,
        "subscription_ids": subscription_ids,
        "subscription_types": ["order_updates", "user_fills"],
        "account": account,
    }))
}

// =============================================================================
// get_active_subscriptions
// =============================================================================

pub async fn get_active_subscriptions(ctx: &AppContext) -> ToolResult {
    let subscriptions = ctx.ws.active_subscriptions().await;
    let stats = ctx.ws.connection_stats().await;

    let listed: Vec<serde_json::Value> = subscriptions
        .iter()
        .map(|s| {
            serde_json::json!({
                "subscription_id": s.subscription_id,
                "subscription_type": s.subscription_type,
                "params": s.params,
                "state": s.state,
                "connected": stats.connected,
                "messages_received": s.messages_received,
                "subscribed_at": s.subscribed_at,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "success": true,
        "total_subscriptions": listed.len(),
        "subscriptions": listed,
        "connection_stats": stats,
    }))
}
