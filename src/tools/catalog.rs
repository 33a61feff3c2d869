//! Tool catalog
//!
//! The fixed surface exposed to the host: every tool's name, description
//! and JSON-Schema-shaped input schema, as served by tools/list.

use serde::Serialize;

/// Names of every dispatchable tool, in catalog order
pub const KNOWN_TOOLS: [&str; 27] = [
    "place_order",
    "place_batch_orders",
    "cancel_order",
    "cancel_all_orders",
    "modify_order",
    "place_twap_order",
    "adjust_leverage",
    "modify_isolated_margin",
    "update_dead_mans_switch",
    "get_user_state",
    "get_open_orders",
    "get_positions",
    "get_user_fills",
    "get_historical_orders",
    "get_portfolio_value",
    "get_subaccounts",
    "get_rate_limit_status",
    "get_all_mids",
    "get_l2_orderbook",
    "get_candles",
    "get_recent_trades",
    "get_funding_rates",
    "get_asset_contexts",
    "subscribe_user_events",
    "subscribe_market_data",
    "subscribe_order_updates",
    "get_active_subscriptions",
];

/// One entry of the tools/list response
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn spec(name: &str, description: &str, input_schema: serde_json::Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn schema(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string(description: &str) -> serde_json::Value {
    serde_json::json!({"type": "string", "description": description})
}

fn number(description: &str) -> serde_json::Value {
    serde_json::json!({"type": "number", "description": description})
}

fn integer(description: &str) -> serde_json::Value {
    serde_json::json!({"type": "integer", "description": description})
}

fn boolean(description: &str) -> serde_json::Value {
    serde_json::json!({"type": "boolean", "description": description})
}

fn order_properties() -> serde_json::Value {
    serde_json::json!({
        "coin": string("Coin symbol, e.g. BTC"),
        "is_buy": boolean("true to buy, false to sell"),
        "size": number("Order size in base currency units"),
        "price": number("Limit price; optional for market orders"),
        "order_type": {"type": "string", "enum": ["limit", "market"], "default": "limit"},
        "tif": {"type": "string", "enum": ["Gtc", "Ioc", "Alo"], "default": "Gtc"},
        "reduce_only": boolean("Only reduce an existing position"),
        "cloid": string("Client order id for tracking (optional)"),
    })
}

/// Build the full catalog
pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        // =====================================================================
        // Trading
        // =====================================================================
        spec(
            "place_order",
            "Place a single order (limit or market).",
            schema(order_properties(), &["coin", "is_buy", "size"]),
        ),
        spec(
            "place_batch_orders",
            "Place multiple orders in one batch request.",
            schema(
                serde_json::json!({
                    "orders": {
                        "type": "array",
                        "items": schema(order_properties(), &["coin", "is_buy", "size"]),
                    },
                }),
                &["orders"],
            ),
        ),
        spec(
            "cancel_order",
            "Cancel one order by exchange order id or client order id.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "order_id": integer("Exchange order id (optional if cloid given)"),
                    "cloid": string("Client order id (optional if order_id given)"),
                }),
                &["coin"],
            ),
        ),
        spec(
            "cancel_all_orders",
            "Cancel all open orders, optionally for a single coin.",
            schema(
                serde_json::json!({"coin": string("Restrict to this coin (optional)")}),
                &[],
            ),
        ),
        spec(
            "modify_order",
            "Modify price and/or size of a resting order.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "order_id": integer("Exchange order id"),
                    "new_price": number("New limit price (optional)"),
                    "new_size": number("New size (optional)"),
                }),
                &["coin", "order_id"],
            ),
        ),
        spec(
            "place_twap_order",
            "Start an exchange-managed TWAP execution.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "is_buy": boolean("true to buy, false to sell"),
                    "total_size": number("Total size to execute"),
                    "duration_minutes": integer("Execution window in minutes"),
                    "randomize": boolean("Randomize slice timing"),
                }),
                &["coin", "is_buy", "total_size", "duration_minutes"],
            ),
        ),
        spec(
            "adjust_leverage",
            "Set leverage for a coin (cross or isolated margin).",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "leverage": integer("Leverage multiplier, 1-50"),
                    "is_cross": boolean("true for cross margin (default), false for isolated"),
                }),
                &["coin", "leverage"],
            ),
        ),
        spec(
            "modify_isolated_margin",
            "Add or remove USDC margin on an isolated position.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "amount": number("USDC amount"),
                    "is_add": boolean("true to add (default), false to remove"),
                }),
                &["coin", "amount"],
            ),
        ),
        spec(
            "update_dead_mans_switch",
            "Arm the exchange-side dead man's switch: cancel all orders after a delay unless re-armed.",
            schema(
                serde_json::json!({
                    "delay_seconds": integer("Seconds before auto-cancel (minimum 5)"),
                }),
                &["delay_seconds"],
            ),
        ),
        // =====================================================================
        // Account
        // =====================================================================
        spec(
            "get_user_state",
            "Account value, margin usage, withdrawable balance and open positions.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_open_orders",
            "All open orders, optionally filtered by coin.",
            schema(serde_json::json!({"coin": string("Filter by coin (optional)")}), &[]),
        ),
        spec(
            "get_positions",
            "All open positions with entry, PnL, leverage and liquidation price.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_user_fills",
            "Recent trade fills, optionally filtered by coin.",
            schema(
                serde_json::json!({
                    "coin": string("Filter by coin (optional)"),
                    "limit": integer("Max fills to return, 1-2000 (default 100)"),
                }),
                &[],
            ),
        ),
        spec(
            "get_historical_orders",
            "Historical orders with their terminal status.",
            schema(
                serde_json::json!({
                    "coin": string("Filter by coin (optional)"),
                    "limit": integer("Max orders to return (default 100)"),
                }),
                &[],
            ),
        ),
        spec(
            "get_portfolio_value",
            "Portfolio value and PnL analytics with per-coin breakdown.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_subaccounts",
            "Subaccounts owned by the account.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_rate_limit_status",
            "API rate limit usage and recommendations.",
            schema(serde_json::json!({}), &[]),
        ),
        // =====================================================================
        // Market data
        // =====================================================================
        spec(
            "get_all_mids",
            "Mid prices for every listed coin.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_l2_orderbook",
            "L2 order book snapshot with spread and volume metrics.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "depth": integer("Levels per side, 1-20 (default 20)"),
                }),
                &["coin"],
            ),
        ),
        spec(
            "get_candles",
            "Historical OHLCV candles.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "interval": {"type": "string", "enum": ["1m", "5m", "15m", "1h", "4h", "1d"], "default": "1h"},
                    "limit": integer("Candles to return, 1-5000 (default 100)"),
                }),
                &["coin"],
            ),
        ),
        spec(
            "get_recent_trades",
            "Recent public trades, newest first.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "limit": integer("Trades to return (default 50)"),
                }),
                &["coin"],
            ),
        ),
        spec(
            "get_funding_rates",
            "Current funding rates for all perpetuals.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_asset_contexts",
            "Mark/oracle prices, funding, open interest and volume for one coin.",
            schema(serde_json::json!({"coin": string("Coin symbol")}), &["coin"]),
        ),
        // =====================================================================
        // WebSocket subscriptions
        // =====================================================================
        spec(
            "subscribe_user_events",
            "Subscribe to fills, funding and liquidations for the account.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "subscribe_market_data",
            "Subscribe to market data streams for a coin.",
            schema(
                serde_json::json!({
                    "coin": string("Coin symbol"),
                    "data_types": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["l2Book", "trades", "candle"]},
                    },
                }),
                &["coin", "data_types"],
            ),
        ),
        spec(
            "subscribe_order_updates",
            "Subscribe to order updates and fills for the account.",
            schema(serde_json::json!({}), &[]),
        ),
        spec(
            "get_active_subscriptions",
            "List active subscriptions and connection statistics.",
            schema(serde_json::json!({}), &[]),
        ),
    ]
}
