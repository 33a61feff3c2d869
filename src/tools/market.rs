//! Market data tools
//!
//! Public read-only queries: mids, order book, candles, trades, funding and
//! per-asset context.

use serde::Deserialize;

use super::{ToolError, ToolResult};
use crate::client::info::VALID_INTERVALS;
use crate::client::types::{format_timestamp_ms, now_iso, safe_f64};
use crate::context::AppContext;

/// Order book depth cap per side
const MAX_ORDERBOOK_DEPTH: usize = 20;
/// Candle query cap
const MAX_CANDLE_LIMIT: u64 = 5000;

fn default_depth() -> usize {
    20
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_candle_limit() -> u64 {
    100
}

fn default_trades_limit() -> usize {
    50
}

// =============================================================================
// get_all_mids
// =============================================================================

pub async fn get_all_mids(ctx: &AppContext) -> ToolResult {
    let mids = ctx.info.all_mids().await?;
    let map: serde_json::Map<String, serde_json::Value> = mids
        .into_iter()
        .map(|(coin, px)| (coin, serde_json::json!(px)))
        .collect();
    Ok(serde_json::Value::Object(map))
}

// =============================================================================
// get_l2_orderbook
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderbookParams {
    pub coin: String,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

pub async fn get_l2_orderbook(ctx: &AppContext, params: OrderbookParams) -> ToolResult {
    if params.depth == 0 || params.depth > MAX_ORDERBOOK_DEPTH {
        return Err(ToolError::Validation(format!(
            "Depth must be between 1 and {}",
            MAX_ORDERBOOK_DEPTH
        )));
    }

    let snapshot = ctx.info.l2_snapshot(&params.coin).await?;

    let mut bids = Vec::new();
    for level in snapshot.levels.0.iter().take(params.depth) {
        bids.push(serde_json::json!([level.price()?, level.size()?]));
    }
    let mut asks = Vec::new();
    for level in snapshot.levels.1.iter().take(params.depth) {
        asks.push(serde_json::json!([level.price()?, level.size()?]));
    }

    let best_bid = bids.first().and_then(|l| l[0].as_f64()).unwrap_or(0.0);
    let best_ask = asks.first().and_then(|l| l[0].as_f64()).unwrap_or(0.0);
    let (spread, mid_price) = if best_bid > 0.0 && best_ask > 0.0 {
        (best_ask - best_bid, (best_bid + best_ask) / 2.0)
    } else {
        (0.0, 0.0)
    };
    let bid_volume: f64 = bids.iter().filter_map(|l| l[1].as_f64()).sum();
    let ask_volume: f64 = asks.iter().filter_map(|l| l[1].as_f64()).sum();

    Ok(serde_json::json!({
        "coin": snapshot.coin,
        "bids": bids,
        "asks": asks,
        "spread": spread,
        "spread_bps": if mid_price > 0.0 { spread / mid_price * 10000.0 } else { 0.0 },
        "mid_price": mid_price,
        "best_bid": best_bid,
        "best_ask": best_ask,
        "bid_volume": bid_volume,
        "ask_volume": ask_volume,
        "total_volume": bid_volume + ask_volume,
        "timestamp": format_timestamp_ms(snapshot.time),
        "depth": params.depth,
    }))
}

// =============================================================================
// get_candles
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CandlesParams {
    pub coin: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_candle_limit")]
    pub limit: u64,
}

pub async fn get_candles(ctx: &AppContext, params: CandlesParams) -> ToolResult {
    if !VALID_INTERVALS.contains(&params.interval.as_str()) {
        return Err(ToolError::Validation(format!(
            "Invalid interval. Must be one of: {:?}",
            VALID_INTERVALS
        )));
    }
    if params.limit == 0 || params.limit > MAX_CANDLE_LIMIT {
        return Err(ToolError::Validation(format!(
            "Limit must be between 1 and {}",
            MAX_CANDLE_LIMIT
        )));
    }

    let candles = ctx
        .info
        .candles_snapshot(&params.coin, &params.interval, params.limit)
        .await?;

    let mapped: Vec<serde_json::Value> = candles
        .iter()
        .map(|c| {
            serde_json::json!({
                "timestamp": format_timestamp_ms(c.t),
                "time_ms": c.t,
                "open": safe_f64(&c.o),
                "high": safe_f64(&c.h),
                "low": safe_f64(&c.l),
                "close": safe_f64(&c.c),
                "volume": safe_f64(&c.v),
                "num_trades": c.n,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "coin": params.coin,
        "interval": params.interval,
        "candle_count": mapped.len(),
        "candles": mapped,
    }))
}

// =============================================================================
// get_recent_trades
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RecentTradesParams {
    pub coin: String,
    #[serde(default = "default_trades_limit")]
    pub limit: usize,
}

pub async fn get_recent_trades(ctx: &AppContext, params: RecentTradesParams) -> ToolResult {
    if params.limit == 0 {
        return Err(ToolError::Validation("Limit must be positive".into()));
    }

    let mut trades = ctx.info.recent_trades(&params.coin).await?;
    // Exchange returns newest-last; surface newest-first
    trades.sort_by(|a, b| b.time.cmp(&a.time));
    trades.truncate(params.limit);

    let mapped: Vec<serde_json::Value> = trades
        .iter()
        .map(|t| {
            serde_json::json!({
                "timestamp": format_timestamp_ms(t.time),
                "time_ms": t.time,
                "price": safe_f64(&t.px),
                "size": safe_f64(&t.sz),
                "side": if t.side == "B" { "buy" } else { "sell" },
                "trade_id": t.tid,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "coin": params.coin,
        "trade_count": mapped.len(),
        "trades": mapped,
    }))
}

// =============================================================================
// get_funding_rates
// =============================================================================

/// Zip the perp universe with its live contexts; both arrays are positional.
fn zip_universe_ctxs(
    data: &serde_json::Value,
) -> Result<Vec<(&serde_json::Value, &serde_json::Value)>, ToolError> {
    let pair = data.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
        ToolError::Client(crate::client::ClientError::InvalidResponse(
            "metaAndAssetCtxs did not return [meta, ctxs]".into(),
        ))
    })?;
    let universe = pair[0]
        .pointer("/universe")
        .and_then(|u| u.as_array())
        .ok_or_else(|| {
            ToolError::Client(crate::client::ClientError::InvalidResponse(
                "meta without universe".into(),
            ))
        })?;
    let ctxs = pair[1].as_array().ok_or_else(|| {
        ToolError::Client(crate::client::ClientError::InvalidResponse(
            "asset ctxs not an array".into(),
        ))
    })?;
    Ok(universe.iter().zip(ctxs.iter()).collect())
}

fn ctx_f64(ctx: &serde_json::Value, field: &str) -> Option<f64> {
    match ctx.get(field) {
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

pub async fn get_funding_rates(ctx: &AppContext) -> ToolResult {
    let data = ctx.info.meta_and_asset_ctxs().await?;
    let zipped = zip_universe_ctxs(&data)?;

    let rates: Vec<serde_json::Value> = zipped
        .iter()
        .filter_map(|(asset, asset_ctx)| {
            let coin = asset.get("name")?.as_str()?;
            Some(serde_json::json!({
                "coin": coin,
                "funding_rate_pct": ctx_f64(asset_ctx, "funding").map(|f| f * 100.0),
                "mark_price": ctx_f64(asset_ctx, "markPx"),
                "oracle_price": ctx_f64(asset_ctx, "oraclePx"),
                "premium": ctx_f64(asset_ctx, "premium"),
                "open_interest": ctx_f64(asset_ctx, "openInterest"),
            }))
        })
        .collect();

    Ok(serde_json::json!({
        "rate_count": rates.len(),
        "funding_rates": rates,
        "timestamp": now_iso(),
    }))
}

// =============================================================================
// get_asset_contexts
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AssetContextParams {
    pub coin: String,
}

pub async fn get_asset_contexts(ctx: &AppContext, params: AssetContextParams) -> ToolResult {
    let data = ctx.info.meta_and_asset_ctxs().await?;
    let zipped = zip_universe_ctxs(&data)?;

    let found = zipped.iter().find(|(asset, _)| {
        asset.get("name").and_then(|n| n.as_str()) == Some(params.coin.as_str())
    });
    let (asset, asset_ctx) = found.ok_or_else(|| {
        ToolError::Validation(format!("Coin {} not found in market data", params.coin))
    })?;

    let mark_price = ctx_f64(asset_ctx, "markPx").unwrap_or(0.0);
    let open_interest = ctx_f64(asset_ctx, "openInterest").unwrap_or(0.0);

    Ok(serde_json::json!({
        "coin": params.coin,
        "mark_price": mark_price,
        "oracle_price": ctx_f64(asset_ctx, "oraclePx"),
        "mid_price": ctx_f64(asset_ctx, "midPx"),
        "funding_rate_pct": ctx_f64(asset_ctx, "funding").map(|f| f * 100.0),
        "open_interest": open_interest,
        "open_interest_usd": mark_price * open_interest,
        "premium": ctx_f64(asset_ctx, "premium"),
        "volume_24h": ctx_f64(asset_ctx, "dayNtlVlm"),
        "prev_day_price": ctx_f64(asset_ctx, "prevDayPx"),
        "max_leverage": asset.get("maxLeverage").cloned(),
        "timestamp": now_iso(),
    }))
}
