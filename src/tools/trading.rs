//! Trading tools
//!
//! Order placement, cancellation, modification, TWAP, leverage and margin
//! management, and the dead man's switch. Every handler validates its
//! parameters fully before the adapter is called.

use serde::Deserialize;

use super::{ToolError, ToolResult};
use crate::client::types::{now_iso, OrderRequest, OrderSide, OrderType, Tif};
use crate::context::AppContext;

fn default_order_type() -> String {
    "limit".to_string()
}

fn default_tif() -> String {
    "Gtc".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// place_order
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PlaceOrderParams {
    pub coin: String,
    pub is_buy: bool,
    pub size: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    #[serde(default = "default_tif")]
    pub tif: String,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub cloid: Option<String>,
}

impl PlaceOrderParams {
    fn into_request(self) -> Result<OrderRequest, ToolError> {
        let order_type = OrderType::parse(&self.order_type)?;
        let tif = Tif::parse(&self.tif)?;
        let request = OrderRequest {
            coin: self.coin,
            side: OrderSide::from_is_buy(self.is_buy),
            size: self.size,
            price: self.price,
            order_type,
            tif,
            reduce_only: self.reduce_only,
            cloid: self.cloid,
        };
        request.validate()?;
        Ok(request)
    }
}

pub async fn place_order(ctx: &AppContext, params: PlaceOrderParams) -> ToolResult {
    let request = params.into_request()?;
    let (coin, side, size, price, order_type, tif, reduce_only) = (
        request.coin.clone(),
        request.side,
        request.size,
        request.price,
        request.order_type,
        request.tif,
        request.reduce_only,
    );

    let outcome = ctx.exchange.place_order(request).await?;
    Ok(serde_json::json!({
        "success": true,
        "order_id": outcome.oid,
        "status": "placed",
        "coin": coin,
        "side": side.as_str(),
        "size": size,
        "price": price,
        "order_type": order_type.as_str(),
        "tif": tif.as_str(),
        "reduce_only": reduce_only,
        "cloid": outcome.cloid,
        "fill_status": outcome.status,
        "avg_fill_price": outcome.avg_px,
        "filled_size": outcome.total_sz,
        "timestamp": now_iso(),
        "response": outcome.raw,
    }))
}

// =============================================================================
// place_batch_orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BatchOrdersParams {
    pub orders: Vec<PlaceOrderParams>,
}

pub async fn place_batch_orders(ctx: &AppContext, params: BatchOrdersParams) -> ToolResult {
    if params.orders.is_empty() {
        return Err(ToolError::Validation("No orders provided".into()));
    }

    // Validate the whole batch up front; one bad order aborts before any
    // network call so no partial placement happens.
    let mut requests = Vec::with_capacity(params.orders.len());
    for (index, order) in params.orders.into_iter().enumerate() {
        let request = order
            .into_request()
            .map_err(|e| ToolError::Validation(format!("Order {}: {}", index, e)))?;
        requests.push(request);
    }
    let echo: Vec<(String, &'static str, f64)> = requests
        .iter()
        .map(|r| (r.coin.clone(), r.side.as_str(), r.size))
        .collect();

    let (entries, raw) = ctx.exchange.bulk_orders(requests).await?;
    let results: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            let (coin, side, size) = &echo[entry.order_index.min(echo.len() - 1)];
            match &entry.error {
                None => serde_json::json!({
                    "success": true,
                    "order_id": entry.oid,
                    "status": "placed",
                    "coin": coin,
                    "side": side,
                    "size": size,
                    "order_index": entry.order_index,
                    "timestamp": now_iso(),
                }),
                Some(error) => serde_json::json!({
                    "success": false,
                    "error": error,
                    "coin": coin,
                    "order_index": entry.order_index,
                    "timestamp": now_iso(),
                }),
            }
        })
        .collect();

    Ok(serde_json::json!({
        "results": results,
        "response": raw,
    }))
}

// =============================================================================
// cancel_order
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CancelOrderParams {
    pub coin: String,
    #[serde(default)]
    pub order_id: Option<u64>,
    #[serde(default)]
    pub cloid: Option<String>,
}

pub async fn cancel_order(ctx: &AppContext, params: CancelOrderParams) -> ToolResult {
    if params.order_id.is_none() && params.cloid.is_none() {
        return Err(ToolError::Validation(
            "Must provide either order_id or cloid".into(),
        ));
    }

    let raw = ctx
        .exchange
        .cancel_order(&params.coin, params.order_id, params.cloid.as_deref())
        .await?;
    Ok(serde_json::json!({
        "success": true,
        "order_id": params.order_id,
        "cloid": params.cloid,
        "coin": params.coin,
        "status": "canceled",
        "timestamp": now_iso(),
        "response": raw,
    }))
}

// =============================================================================
// cancel_all_orders
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CancelAllParams {
    #[serde(default)]
    pub coin: Option<String>,
}

pub async fn cancel_all_orders(ctx: &AppContext, params: CancelAllParams) -> ToolResult {
    let outcome = ctx.exchange.cancel_all(params.coin.as_deref()).await?;

    let status = if outcome.canceled.is_empty() && outcome.failed.is_empty() {
        "no_matching_orders"
    } else if outcome.failed.is_empty() {
        "completed"
    } else {
        "partial"
    };

    Ok(serde_json::json!({
        "success": outcome.failed.is_empty(),
        "canceled_count": outcome.canceled.len(),
        "failed_count": outcome.failed.len(),
        "orders": outcome.canceled,
        "failed_orders": if outcome.failed.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::Array(outcome.failed.clone())
        },
        "status": status,
        "coin": params.coin,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// modify_order
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ModifyOrderParams {
    pub coin: String,
    pub order_id: u64,
    #[serde(default)]
    pub new_price: Option<f64>,
    #[serde(default)]
    pub new_size: Option<f64>,
}

pub async fn modify_order(ctx: &AppContext, params: ModifyOrderParams) -> ToolResult {
    let raw = ctx
        .exchange
        .modify_order(
            &params.coin,
            params.order_id,
            params.new_price,
            params.new_size,
        )
        .await?;

    let mut modifications = serde_json::Map::new();
    if let Some(px) = params.new_price {
        modifications.insert("price".into(), serde_json::json!(px));
    }
    if let Some(sz) = params.new_size {
        modifications.insert("size".into(), serde_json::json!(sz));
    }

    Ok(serde_json::json!({
        "success": true,
        "order_id": params.order_id,
        "coin": params.coin,
        "modifications": modifications,
        "status": "modified",
        "timestamp": now_iso(),
        "response": raw,
    }))
}

// =============================================================================
// place_twap_order
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TwapOrderParams {
    pub coin: String,
    pub is_buy: bool,
    pub total_size: f64,
    pub duration_minutes: u32,
    #[serde(default)]
    pub randomize: bool,
}

pub async fn place_twap_order(ctx: &AppContext, params: TwapOrderParams) -> ToolResult {
    let raw = ctx
        .exchange
        .twap_order(
            &params.coin,
            params.is_buy,
            params.total_size,
            params.duration_minutes,
            params.randomize,
        )
        .await?;

    let twap_id = raw.pointer("/data/status/running/twapId").cloned();
    let start = chrono::Utc::now();
    let end = start + chrono::Duration::minutes(params.duration_minutes as i64);

    Ok(serde_json::json!({
        "success": true,
        "twap_id": twap_id,
        "coin": params.coin,
        "side": if params.is_buy { "buy" } else { "sell" },
        "total_size": params.total_size,
        "duration_minutes": params.duration_minutes,
        "estimated_slices": params.duration_minutes.max(1),
        "randomize": params.randomize,
        "status": "active",
        "start_time": start.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "estimated_end_time": end.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "response": raw,
    }))
}

// =============================================================================
// adjust_leverage
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AdjustLeverageParams {
    pub coin: String,
    pub leverage: u32,
    #[serde(default = "default_true")]
    pub is_cross: bool,
}

pub async fn adjust_leverage(ctx: &AppContext, params: AdjustLeverageParams) -> ToolResult {
    let raw = ctx
        .exchange
        .update_leverage(&params.coin, params.leverage, params.is_cross)
        .await?;
    Ok(serde_json::json!({
        "success": true,
        "coin": params.coin,
        "leverage": params.leverage,
        "margin_mode": if params.is_cross { "cross" } else { "isolated" },
        "status": "updated",
        "timestamp": now_iso(),
        "response": raw,
    }))
}

// =============================================================================
// modify_isolated_margin
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct IsolatedMarginParams {
    pub coin: String,
    pub amount: f64,
    #[serde(default = "default_true")]
    pub is_add: bool,
}

pub async fn modify_isolated_margin(ctx: &AppContext, params: IsolatedMarginParams) -> ToolResult {
    let raw = ctx
        .exchange
        .update_isolated_margin(&params.coin, params.amount, params.is_add)
        .await?;
    Ok(serde_json::json!({
        "success": true,
        "coin": params.coin,
        "amount": params.amount,
        "action": if params.is_add { "added" } else { "removed" },
        "status": "updated",
        "timestamp": now_iso(),
        "response": raw,
    }))
}

// =============================================================================
// update_dead_mans_switch
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DeadMansSwitchParams {
    pub delay_seconds: u64,
}

pub async fn update_dead_mans_switch(ctx: &AppContext, params: DeadMansSwitchParams) -> ToolResult {
    let raw = ctx.exchange.schedule_cancel(params.delay_seconds).await?;
    let trigger = chrono::Utc::now() + chrono::Duration::seconds(params.delay_seconds as i64);
    Ok(serde_json::json!({
        "success": true,
        "delay_seconds": params.delay_seconds,
        "trigger_time": trigger.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "status": "armed",
        "timestamp": now_iso(),
        "response": raw,
    }))
}
