//! Tool dispatch layer
//!
//! Maps a tool invocation (name + JSON parameters) onto one adapter call.
//! Parameters are validated before anything touches the network; an unknown
//! name or a bad parameter never causes a partial side effect.

pub mod account;
pub mod catalog;
pub mod market;
pub mod trading;
pub mod websocket;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::client::ClientError;
use crate::context::AppContext;

pub use catalog::{tool_catalog, ToolSpec};

// =============================================================================
// Errors
// =============================================================================

/// Failures surfaced to the tool host
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Parameter shape or range failure, raised before any adapter call
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ToolError {
    /// Stable category name for the host
    pub fn category(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Validation(_) => "validation_error",
            ToolError::Client(e) => e.category(),
        }
    }
}

pub type ToolResult = std::result::Result<serde_json::Value, ToolError>;

/// Decode tool parameters into their typed form, mapping serde failures to
/// a caller-fixable validation error.
fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::Validation(format!("Invalid parameters: {}", e)))
}

// =============================================================================
// Dispatch
// =============================================================================

/// Route one tool invocation to its handler.
pub async fn dispatch(ctx: &AppContext, tool_name: &str, params: serde_json::Value) -> ToolResult {
    tracing::debug!(tool = tool_name, "Dispatching tool call");
    match tool_name {
        // Trading
        "place_order" => trading::place_order(ctx, parse_params(params)?).await,
        "place_batch_orders" => trading::place_batch_orders(ctx, parse_params(params)?).await,
        "cancel_order" => trading::cancel_order(ctx, parse_params(params)?).await,
        "cancel_all_orders" => trading::cancel_all_orders(ctx, parse_params(params)?).await,
        "modify_order" => trading::modify_order(ctx, parse_params(params)?).await,
        "place_twap_order" => trading::place_twap_order(ctx, parse_params(params)?).await,
        "adjust_leverage" => trading::adjust_leverage(ctx, parse_params(params)?).await,
        "modify_isolated_margin" => {
            trading::modify_isolated_margin(ctx, parse_params(params)?).await
        }
        "update_dead_mans_switch" => {
            trading::update_dead_mans_switch(ctx, parse_params(params)?).await
        }

        // Account
        "get_user_state" => account::get_user_state(ctx).await,
        "get_open_orders" => account::get_open_orders(ctx, parse_params(params)?).await,
        "get_positions" => account::get_positions(ctx).await,
        "get_user_fills" => account::get_user_fills(ctx, parse_params(params)?).await,
        "get_historical_orders" => {
            account::get_historical_orders(ctx, parse_params(params)?).await
        }
        "get_portfolio_value" => account::get_portfolio_value(ctx).await,
        "get_subaccounts" => account::get_subaccounts(ctx).await,
        "get_rate_limit_status" => account::get_rate_limit_status(ctx).await,

        // Market data
        "get_all_mids" => market::get_all_mids(ctx).await,
        "get_l2_orderbook" => market::get_l2_orderbook(ctx, parse_params(params)?).await,
        "get_candles" => market::get_candles(ctx, parse_params(params)?).await,
        "get_recent_trades" => market::get_recent_trades(ctx, parse_params(params)?).await,
        "get_funding_rates" => market::get_funding_rates(ctx).await,
        "get_asset_contexts" => market::get_asset_contexts(ctx, parse_params(params)?).await,

        // WebSocket subscriptions
        "subscribe_user_events" => websocket::subscribe_user_events(ctx).await,
        "subscribe_market_data" => websocket::subscribe_market_data(ctx, parse_params(params)?).await,
        "subscribe_order_updates" => websocket::subscribe_order_updates(ctx).await,
        "get_active_subscriptions" => websocket::get_active_subscriptions(ctx).await,

        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}
