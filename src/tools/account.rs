//! Account tools
//!
//! Account state, orders, fills, portfolio analytics and rate limit status,
//! all scoped to the configured account address.

use serde::Deserialize;

use super::{ToolError, ToolResult};
use crate::client::types::{format_timestamp_ms, now_iso, safe_f64, Position, UserFill};
use crate::context::AppContext;

/// Hard cap the exchange puts on fill queries
const MAX_FILLS_LIMIT: u64 = 2000;

fn default_limit() -> u64 {
    100
}

/// Map one position into the response shape shared by several tools
fn position_json(position: &Position) -> serde_json::Value {
    let size = safe_f64(&position.szi);
    serde_json::json!({
        "coin": position.coin,
        "size": size.abs(),
        "side": if size >= 0.0 { "long" } else { "short" },
        "entry_price": position.entry_px.as_deref().map(safe_f64),
        "unrealized_pnl": safe_f64(&position.unrealized_pnl),
        "leverage": position.leverage.value,
        "margin_mode": position.leverage.kind,
        "margin_used": safe_f64(&position.margin_used),
        "position_value": safe_f64(&position.position_value),
        "roe_pct": safe_f64(&position.return_on_equity) * 100.0,
        "liquidation_price": position.liquidation_px.as_deref().map(safe_f64),
    })
}

// =============================================================================
// get_user_state
// =============================================================================

pub async fn get_user_state(ctx: &AppContext) -> ToolResult {
    let state = ctx.info.user_state(ctx.exchange.account_address()).await?;
    let positions: Vec<serde_json::Value> = state
        .asset_positions
        .iter()
        .filter(|p| safe_f64(&p.position.szi) != 0.0)
        .map(|p| position_json(&p.position))
        .collect();

    Ok(serde_json::json!({
        "account_value": safe_f64(&state.margin_summary.account_value),
        "total_margin_used": safe_f64(&state.margin_summary.total_margin_used),
        "total_notional_position": safe_f64(&state.margin_summary.total_ntl_pos),
        "withdrawable": safe_f64(&state.withdrawable),
        "position_count": positions.len(),
        "positions": positions,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_open_orders
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OpenOrdersParams {
    #[serde(default)]
    pub coin: Option<String>,
}

pub async fn get_open_orders(ctx: &AppContext, params: OpenOrdersParams) -> ToolResult {
    let orders = ctx.info.open_orders(ctx.exchange.account_address()).await?;
    let filtered: Vec<serde_json::Value> = orders
        .iter()
        .filter(|o| params.coin.as_deref().map_or(true, |c| o.coin == c))
        .map(|o| {
            serde_json::json!({
                "coin": o.coin,
                "order_id": o.oid,
                "side": o.side_name(),
                "price": safe_f64(&o.limit_px),
                "size": safe_f64(&o.sz),
                "original_size": o.orig_sz.as_deref().map(safe_f64),
                "cloid": o.cloid,
                "placed_at": format_timestamp_ms(o.timestamp),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "order_count": filtered.len(),
        "orders": filtered,
        "coin": params.coin,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_positions
// =============================================================================

pub async fn get_positions(ctx: &AppContext) -> ToolResult {
    let state = ctx.info.user_state(ctx.exchange.account_address()).await?;
    let positions: Vec<serde_json::Value> = state
        .asset_positions
        .iter()
        .filter(|p| safe_f64(&p.position.szi) != 0.0)
        .map(|p| position_json(&p.position))
        .collect();

    Ok(serde_json::json!({
        "position_count": positions.len(),
        "positions": positions,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_user_fills
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserFillsParams {
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn fill_json(fill: &UserFill) -> serde_json::Value {
    serde_json::json!({
        "coin": fill.coin,
        "price": safe_f64(&fill.px),
        "size": safe_f64(&fill.sz),
        "side": if fill.side == "B" { "buy" } else { "sell" },
        "order_id": fill.oid,
        "closed_pnl": fill.closed_pnl.as_deref().map(safe_f64),
        "fee": fill.fee.as_deref().map(safe_f64),
        "direction": fill.dir,
        "hash": fill.hash,
        "time_ms": fill.time,
        "timestamp": format_timestamp_ms(fill.time),
    })
}

pub async fn get_user_fills(ctx: &AppContext, params: UserFillsParams) -> ToolResult {
    if params.limit == 0 || params.limit > MAX_FILLS_LIMIT {
        return Err(ToolError::Validation(format!(
            "Limit must be between 1 and {}",
            MAX_FILLS_LIMIT
        )));
    }

    let fills = ctx.info.user_fills(ctx.exchange.account_address()).await?;
    let mut filtered: Vec<&UserFill> = fills
        .iter()
        .filter(|f| params.coin.as_deref().map_or(true, |c| f.coin == c))
        .collect();
    filtered.sort_by(|a, b| b.time.cmp(&a.time));
    filtered.truncate(params.limit as usize);

    Ok(serde_json::json!({
        "fill_count": filtered.len(),
        "fills": filtered.iter().map(|f| fill_json(f)).collect::<Vec<_>>(),
        "coin": params.coin,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_historical_orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoricalOrdersParams {
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub async fn get_historical_orders(ctx: &AppContext, params: HistoricalOrdersParams) -> ToolResult {
    if params.limit == 0 {
        return Err(ToolError::Validation("Limit must be positive".into()));
    }

    let orders = ctx
        .info
        .historical_orders(ctx.exchange.account_address())
        .await?;
    let mut filtered: Vec<serde_json::Value> = orders
        .iter()
        .filter(|h| params.coin.as_deref().map_or(true, |c| h.order.coin == c))
        .take(params.limit as usize)
        .map(|h| {
            serde_json::json!({
                "coin": h.order.coin,
                "order_id": h.order.oid,
                "side": h.order.side_name(),
                "price": safe_f64(&h.order.limit_px),
                "size": safe_f64(&h.order.sz),
                "original_size": h.order.orig_sz.as_deref().map(safe_f64),
                "status": h.status,
                "status_time": format_timestamp_ms(h.status_timestamp),
                "placed_at": format_timestamp_ms(h.order.timestamp),
            })
        })
        .collect();
    filtered.reverse(); // newest first

    Ok(serde_json::json!({
        "order_count": filtered.len(),
        "orders": filtered,
        "coin": params.coin,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_portfolio_value
// =============================================================================

pub async fn get_portfolio_value(ctx: &AppContext) -> ToolResult {
    let address = ctx.exchange.account_address();
    let state = ctx.info.user_state(address).await?;
    let fills = ctx.info.user_fills(address).await?;

    let total_value = safe_f64(&state.margin_summary.account_value);
    let margin_used = safe_f64(&state.margin_summary.total_margin_used);
    let withdrawable = safe_f64(&state.withdrawable);

    let unrealized_pnl: f64 = state
        .asset_positions
        .iter()
        .map(|p| safe_f64(&p.position.unrealized_pnl))
        .sum();
    let realized_pnl: f64 = fills
        .iter()
        .filter_map(|f| f.closed_pnl.as_deref())
        .map(safe_f64)
        .sum();
    let total_fees: f64 = fills
        .iter()
        .filter_map(|f| f.fee.as_deref())
        .map(safe_f64)
        .sum();
    let total_pnl = unrealized_pnl + realized_pnl;

    let breakdown: Vec<serde_json::Value> = state
        .asset_positions
        .iter()
        .filter(|p| safe_f64(&p.position.szi) != 0.0)
        .map(|p| {
            let value = safe_f64(&p.position.position_value);
            serde_json::json!({
                "coin": p.position.coin,
                "position_value": value,
                "allocation_pct": if total_value > 0.0 { value / total_value * 100.0 } else { 0.0 },
                "unrealized_pnl": safe_f64(&p.position.unrealized_pnl),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "total_value": total_value,
        "margin_used": margin_used,
        "available_margin": withdrawable,
        "unrealized_pnl": unrealized_pnl,
        "realized_pnl": realized_pnl,
        "total_pnl": total_pnl,
        "pnl_percentage": if total_value > 0.0 { total_pnl / total_value * 100.0 } else { 0.0 },
        "total_fees_paid": total_fees,
        "breakdown": breakdown,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_subaccounts
// =============================================================================

pub async fn get_subaccounts(ctx: &AppContext) -> ToolResult {
    let value = ctx.info.subaccounts(ctx.exchange.account_address()).await?;
    // The exchange returns null when the account has no subaccounts
    let subaccounts = match value {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(list) => list,
        other => {
            return Err(ToolError::Client(crate::client::ClientError::InvalidResponse(
                format!("Unexpected subAccounts payload: {}", other),
            )))
        }
    };

    Ok(serde_json::json!({
        "subaccount_count": subaccounts.len(),
        "subaccounts": subaccounts,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_rate_limit_status
// =============================================================================

pub async fn get_rate_limit_status(ctx: &AppContext) -> ToolResult {
    let info = ctx
        .info
        .user_rate_limit(ctx.exchange.account_address())
        .await?;

    let used = info.n_requests_used;
    // A configured budget tightens the exchange's own cap
    let cap = match ctx.settings.rate_limit_budget {
        Some(budget) => info.n_requests_cap.min(budget),
        None => info.n_requests_cap,
    };
    let pct = if cap > 0 { used as f64 / cap as f64 * 100.0 } else { 0.0 };

    let status = if pct > 90.0 {
        "critical"
    } else if pct > 70.0 {
        "warning"
    } else {
        "healthy"
    };

    let mut recommendations: Vec<&str> = Vec::new();
    if pct > 70.0 {
        recommendations.push("Reduce request frequency");
        recommendations.push("Prefer WebSocket subscriptions over repeated polling");
    }
    if pct > 90.0 {
        recommendations.push("Pause non-essential queries until the budget recovers");
    }

    Ok(serde_json::json!({
        "status": status,
        "requests": {
            "used": used,
            "limit": cap,
            "remaining": cap.saturating_sub(used),
            "percentage_used": pct,
        },
        "cumulative_volume": info.cum_vlm.as_deref().map(safe_f64),
        "recommendations": recommendations,
        "timestamp": now_iso(),
    }))
}
