//! Exchange endpoint client
//!
//! Signed trading actions against `POST /exchange`: order placement and
//! cancellation, modification, TWAP, leverage and margin changes, and the
//! dead man's switch pass-through.
//!
//! Every action is signed over a single-use millisecond nonce, so re-sending
//! an identical signed body after a transport failure cannot execute twice.
//! Orders additionally carry a client order id (caller-supplied or
//! generated) for tracking.

use std::collections::HashMap;

use ethers::signers::LocalWallet;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::{ClientError, ClientResult};
use super::http::{HttpTransport, RetryPolicy};
use super::info::InfoClient;
use super::signing::sign_l1_action;
use super::types::{
    current_time_ms, order_statuses, ExchangeEnvelope, OrderRequest, OrderType, Tif,
};
use crate::config::Network;

const EXCHANGE_PATH: &str = "/exchange";

/// Leverage ceiling enforced before hitting the exchange
pub const MAX_LEVERAGE: u32 = 50;

// =============================================================================
// Asset metadata cache
// =============================================================================

/// Per-asset wire metadata resolved from the perp universe
#[derive(Debug, Clone, Copy)]
struct AssetMeta {
    /// Index into the universe; the `a` field of order wire objects
    index: u32,
    /// Size precision for this asset
    sz_decimals: u32,
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a single order placement
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    /// Exchange-assigned order id (resting or filled)
    pub oid: Option<u64>,
    /// "resting" or "filled"
    pub status: String,
    /// Average fill price when immediately filled
    pub avg_px: Option<f64>,
    /// Filled size when immediately filled
    pub total_sz: Option<f64>,
    /// Client order id attached to the order
    pub cloid: String,
    /// Full exchange response
    pub raw: serde_json::Value,
}

/// Per-order entry of a batch placement
#[derive(Debug, Clone)]
pub struct BulkOrderEntry {
    pub order_index: usize,
    pub oid: Option<u64>,
    pub error: Option<String>,
}

/// Result of a cancel-all sweep
#[derive(Debug, Clone, Default)]
pub struct CancelAllOutcome {
    /// (coin, oid, side, size, price) of every canceled order
    pub canceled: Vec<serde_json::Value>,
    /// (coin, oid, error) of every failed cancellation
    pub failed: Vec<serde_json::Value>,
}

// =============================================================================
// ExchangeClient
// =============================================================================

/// Client for signed actions on the exchange endpoint
pub struct ExchangeClient {
    transport: HttpTransport,
    info: InfoClient,
    wallet: LocalWallet,
    network: Network,
    account_address: String,
    default_slippage: f64,
    asset_meta: RwLock<HashMap<String, AssetMeta>>,
}

impl ExchangeClient {
    pub fn new(
        transport: HttpTransport,
        info: InfoClient,
        wallet: LocalWallet,
        network: Network,
        account_address: String,
        default_slippage: f64,
    ) -> Self {
        Self {
            transport,
            info,
            wallet,
            network,
            account_address,
            default_slippage,
            asset_meta: RwLock::new(HashMap::new()),
        }
    }

    pub fn account_address(&self) -> &str {
        &self.account_address
    }

    // =========================================================================
    // Asset resolution
    // =========================================================================

    /// Resolve a coin symbol to its universe index and size precision,
    /// fetching and caching the perp metadata on first use.
    async fn asset(&self, coin: &str) -> ClientResult<AssetMeta> {
        {
            let cache = self.asset_meta.read().await;
            if let Some(meta) = cache.get(coin) {
                return Ok(*meta);
            }
        }

        let meta = self.info.meta().await?;
        let universe = meta
            .pointer("/universe")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ClientError::InvalidResponse("meta without universe".into()))?;

        let mut cache = self.asset_meta.write().await;
        for (index, asset) in universe.iter().enumerate() {
            if let Some(name) = asset.get("name").and_then(|n| n.as_str()) {
                cache.insert(
                    name.to_string(),
                    AssetMeta {
                        index: index as u32,
                        sz_decimals: asset
                            .get("szDecimals")
                            .and_then(|d| d.as_u64())
                            .unwrap_or(0) as u32,
                    },
                );
            }
        }

        cache.get(coin).copied().ok_or_else(|| {
            ClientError::Validation(format!("Unknown coin: {}", coin))
        })
    }

    // =========================================================================
    // Action plumbing
    // =========================================================================

    /// Sign an action once and POST it. The same signed body is re-sent on
    /// retryable failures; the single-use nonce guarantees at-most-once
    /// execution.
    async fn post_action(
        &self,
        action: serde_json::Value,
        policy: RetryPolicy,
    ) -> ClientResult<serde_json::Value> {
        let nonce = current_time_ms();
        let signature = sign_l1_action(&self.wallet, &action, None, nonce, self.network)?;

        let body = serde_json::json!({
            "action": action,
            "nonce": nonce,
            "signature": signature,
            "vaultAddress": null,
        });

        let value = self.transport.post_json(EXCHANGE_PATH, &body, policy).await?;
        let envelope: ExchangeEnvelope = serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad exchange envelope: {}", e)))?;

        if envelope.status == "ok" {
            Ok(envelope.response)
        } else {
            // "err" carries the rejection reason as the response payload
            let reason = match &envelope.response {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Err(ClientError::Rejected(reason))
        }
    }

    /// Build the wire object for one order
    async fn order_wire(&self, request: &OrderRequest) -> ClientResult<serde_json::Value> {
        let meta = self.asset(&request.coin).await?;
        let price = self.resolve_price(request).await?;
        let tif = match request.order_type {
            // Market orders go out as aggressive IOC limits at the banded price
            OrderType::Market => Tif::Ioc,
            OrderType::Limit => request.tif,
        };

        let mut wire = serde_json::json!({
            "a": meta.index,
            "b": request.side.is_buy(),
            "p": format_px(price),
            "s": format_sz(request.size, meta.sz_decimals),
            "r": request.reduce_only,
            "t": {"limit": {"tif": tif.as_str()}},
        });
        if let Some(cloid) = &request.cloid {
            wire["c"] = serde_json::Value::String(cloid.clone());
        }
        Ok(wire)
    }

    /// Limit orders use the caller's price; market orders are priced off the
    /// current mid with the slippage band applied toward the taker side.
    async fn resolve_price(&self, request: &OrderRequest) -> ClientResult<f64> {
        if let Some(px) = request.price {
            return Ok(px);
        }
        let mids = self.info.all_mids().await?;
        let mid = mids.get(&request.coin).copied().ok_or_else(|| {
            ClientError::Validation(format!("No mid price for coin: {}", request.coin))
        })?;
        let band = if request.side.is_buy() {
            1.0 + self.default_slippage
        } else {
            1.0 - self.default_slippage
        };
        Ok(mid * band)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place a single order. A client order id is generated when the caller
    /// does not supply one, so the retry path is always trackable.
    pub async fn place_order(&self, mut request: OrderRequest) -> ClientResult<OrderOutcome> {
        request.validate()?;
        let cloid = request
            .cloid
            .get_or_insert_with(new_cloid)
            .clone();

        let wire = self.order_wire(&request).await?;
        let action = serde_json::json!({
            "type": "order",
            "orders": [wire],
            "grouping": "na",
        });

        tracing::info!(
            coin = %request.coin,
            side = request.side.as_str(),
            size = request.size,
            order_type = request.order_type.as_str(),
            cloid = %cloid,
            "Placing order"
        );

        let raw = self.post_action(action, RetryPolicy::Retry).await?;
        let statuses = order_statuses(&raw);
        let status = statuses.first().ok_or_else(|| {
            ClientError::InvalidResponse("Order response without statuses".into())
        })?;

        if let Some(error) = &status.error {
            return Err(ClientError::Rejected(error.clone()));
        }
        if let Some(filled) = &status.filled {
            return Ok(OrderOutcome {
                oid: Some(filled.oid),
                status: "filled".into(),
                avg_px: filled.avg_px.parse().ok(),
                total_sz: filled.total_sz.parse().ok(),
                cloid,
                raw,
            });
        }
        let oid = status.resting.as_ref().map(|r| r.oid);
        Ok(OrderOutcome {
            oid,
            status: "resting".into(),
            avg_px: None,
            total_sz: None,
            cloid,
            raw,
        })
    }

    /// Place a batch of orders as one signed action. Per-order failures are
    /// reported per entry, not as a call-level error.
    pub async fn bulk_orders(
        &self,
        requests: Vec<OrderRequest>,
    ) -> ClientResult<(Vec<BulkOrderEntry>, serde_json::Value)> {
        if requests.is_empty() {
            return Err(ClientError::Validation("No orders provided".into()));
        }
        for request in &requests {
            request.validate()?;
        }

        let mut wires = Vec::with_capacity(requests.len());
        for request in &requests {
            wires.push(self.order_wire(request).await?);
        }
        let action = serde_json::json!({
            "type": "order",
            "orders": wires,
            "grouping": "na",
        });

        tracing::info!(count = requests.len(), "Placing batch orders");
        let raw = self.post_action(action, RetryPolicy::Retry).await?;
        let statuses = order_statuses(&raw);

        let entries = statuses
            .iter()
            .enumerate()
            .map(|(order_index, status)| BulkOrderEntry {
                order_index,
                oid: status
                    .resting
                    .as_ref()
                    .map(|r| r.oid)
                    .or_else(|| status.filled.as_ref().map(|f| f.oid)),
                error: status.error.clone(),
            })
            .collect();
        Ok((entries, raw))
    }

    /// Cancel one order by exchange id or client id.
    ///
    /// Canceling an order that is already closed is terminal: the exchange
    /// answers with an "already canceled or filled" style rejection.
    pub async fn cancel_order(
        &self,
        coin: &str,
        oid: Option<u64>,
        cloid: Option<&str>,
    ) -> ClientResult<serde_json::Value> {
        let meta = self.asset(coin).await?;
        let action = match (oid, cloid) {
            (Some(oid), _) => serde_json::json!({
                "type": "cancel",
                "cancels": [{"a": meta.index, "o": oid}],
            }),
            (None, Some(cloid)) => serde_json::json!({
                "type": "cancelByCloid",
                "cancels": [{"asset": meta.index, "cloid": cloid}],
            }),
            (None, None) => {
                return Err(ClientError::Validation(
                    "Must provide either order_id or cloid".into(),
                ))
            }
        };

        let raw = self.post_action(action, RetryPolicy::Retry).await?;

        // Cancel statuses are either the string "success" or {error: ...}
        if let Some(statuses) = raw.pointer("/data/statuses").and_then(|v| v.as_array()) {
            if let Some(error) = statuses
                .first()
                .and_then(|s| s.get("error"))
                .and_then(|e| e.as_str())
            {
                return Err(ClientError::Rejected(error.to_string()));
            }
        }
        Ok(raw)
    }

    /// Cancel every open order, optionally restricted to one coin.
    pub async fn cancel_all(&self, coin: Option<&str>) -> ClientResult<CancelAllOutcome> {
        let open = self.info.open_orders(&self.account_address).await?;
        let mut outcome = CancelAllOutcome::default();

        for order in open
            .iter()
            .filter(|o| coin.map_or(true, |c| o.coin == c))
        {
            match self.cancel_order(&order.coin, Some(order.oid), None).await {
                Ok(_) => outcome.canceled.push(serde_json::json!({
                    "coin": order.coin,
                    "order_id": order.oid,
                    "side": order.side_name(),
                    "size": order.sz,
                    "price": order.limit_px,
                })),
                Err(e) => outcome.failed.push(serde_json::json!({
                    "coin": order.coin,
                    "order_id": order.oid,
                    "error": e.to_string(),
                })),
            }
        }
        Ok(outcome)
    }

    /// Replace price and/or size of a resting order. Unspecified fields keep
    /// the resting order's values. May result in a new order id.
    pub async fn modify_order(
        &self,
        coin: &str,
        oid: u64,
        new_price: Option<f64>,
        new_size: Option<f64>,
    ) -> ClientResult<serde_json::Value> {
        if new_price.is_none() && new_size.is_none() {
            return Err(ClientError::Validation(
                "Must provide at least one of new_price or new_size".into(),
            ));
        }
        if let Some(sz) = new_size {
            if !(sz > 0.0) || !sz.is_finite() {
                return Err(ClientError::Validation(format!(
                    "New size must be positive, got {}",
                    sz
                )));
            }
        }
        if let Some(px) = new_price {
            if !(px > 0.0) || !px.is_finite() {
                return Err(ClientError::Validation(format!(
                    "New price must be positive, got {}",
                    px
                )));
            }
        }

        // The wire format wants the full replacement order, so fill the
        // unchanged fields from the resting order.
        let open = self.info.open_orders(&self.account_address).await?;
        let existing = open
            .iter()
            .find(|o| o.oid == oid && o.coin == coin)
            .ok_or_else(|| {
                ClientError::Rejected(format!("Order {} not found or already closed", oid))
            })?;

        let meta = self.asset(coin).await?;
        let price = match new_price {
            Some(px) => px,
            None => super::types::parse_wire_f64(&existing.limit_px, "resting price")?,
        };
        let size = match new_size {
            Some(sz) => sz,
            None => super::types::parse_wire_f64(&existing.sz, "resting size")?,
        };

        let action = serde_json::json!({
            "type": "modify",
            "oid": oid,
            "order": {
                "a": meta.index,
                "b": existing.side == "B",
                "p": format_px(price),
                "s": format_sz(size, meta.sz_decimals),
                "r": false,
                "t": {"limit": {"tif": "Gtc"}},
            },
        });

        tracing::info!(coin = coin, oid = oid, "Modifying order");
        self.post_action(action, RetryPolicy::Retry).await
    }

    /// Start an exchange-managed TWAP execution.
    pub async fn twap_order(
        &self,
        coin: &str,
        is_buy: bool,
        total_size: f64,
        duration_minutes: u32,
        randomize: bool,
    ) -> ClientResult<serde_json::Value> {
        if !(total_size > 0.0) || !total_size.is_finite() {
            return Err(ClientError::Validation(format!(
                "Total size must be positive, got {}",
                total_size
            )));
        }
        if duration_minutes == 0 {
            return Err(ClientError::Validation(
                "Duration must be positive".into(),
            ));
        }

        let meta = self.asset(coin).await?;
        let action = serde_json::json!({
            "type": "twapOrder",
            "twap": {
                "a": meta.index,
                "b": is_buy,
                "s": format_sz(total_size, meta.sz_decimals),
                "r": false,
                "m": duration_minutes,
                "t": randomize,
            },
        });

        tracing::info!(
            coin = coin,
            total_size = total_size,
            duration_minutes = duration_minutes,
            "Placing TWAP order"
        );
        // No idempotency key on TWAP starts: never re-send on ambiguity
        self.post_action(action, RetryPolicy::NoRetry).await
    }

    // =========================================================================
    // Account settings
    // =========================================================================

    /// Set leverage for an asset, cross or isolated.
    pub async fn update_leverage(
        &self,
        coin: &str,
        leverage: u32,
        is_cross: bool,
    ) -> ClientResult<serde_json::Value> {
        if leverage == 0 {
            return Err(ClientError::Validation("Leverage must be positive".into()));
        }
        if leverage > MAX_LEVERAGE {
            return Err(ClientError::Validation(format!(
                "Leverage {}x exceeds maximum of {}x",
                leverage, MAX_LEVERAGE
            )));
        }

        let meta = self.asset(coin).await?;
        let action = serde_json::json!({
            "type": "updateLeverage",
            "asset": meta.index,
            "isCross": is_cross,
            "leverage": leverage,
        });
        self.post_action(action, RetryPolicy::Retry).await
    }

    /// Add or remove USDC margin on an isolated position. `amount` is in
    /// USDC; the wire carries micro-USDC, negative when removing.
    pub async fn update_isolated_margin(
        &self,
        coin: &str,
        amount: f64,
        is_add: bool,
    ) -> ClientResult<serde_json::Value> {
        if !(amount > 0.0) || !amount.is_finite() {
            return Err(ClientError::Validation(format!(
                "Amount must be positive, got {}",
                amount
            )));
        }

        let meta = self.asset(coin).await?;
        let ntli = (amount * 1e6).round() as i64 * if is_add { 1 } else { -1 };
        let action = serde_json::json!({
            "type": "updateIsolatedMargin",
            "asset": meta.index,
            "isBuy": true,
            "ntli": ntli,
        });
        self.post_action(action, RetryPolicy::Retry).await
    }

    /// Arm (or re-arm) the exchange-side dead man's switch: all orders are
    /// canceled at the scheduled time unless a later call pushes it out.
    pub async fn schedule_cancel(&self, delay_seconds: u64) -> ClientResult<serde_json::Value> {
        if delay_seconds < 5 {
            return Err(ClientError::Validation(format!(
                "Delay must be at least 5 seconds, got {}",
                delay_seconds
            )));
        }

        let trigger_time = current_time_ms() + delay_seconds * 1000;
        let action = serde_json::json!({
            "type": "scheduleCancel",
            "time": trigger_time,
        });
        self.post_action(action, RetryPolicy::Retry).await
    }
}

// =============================================================================
// Wire number formatting
// =============================================================================

/// Generate a fresh client order id (uuid without hyphens, 0x-prefixed to
/// match the 16-byte hex form the exchange expects)
pub fn new_cloid() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

/// Format a price to at most 5 significant figures, trailing zeros trimmed.
pub fn format_px(px: f64) -> String {
    if px >= 100_000.0 {
        return format!("{}", px.round());
    }
    let magnitude = px.abs().log10().floor() as i32;
    let decimals = (5 - 1 - magnitude).max(0) as usize;
    trim_zeros(format!("{:.*}", decimals, px))
}

/// Format a size to the asset's precision, trailing zeros trimmed.
pub fn format_sz(sz: f64, sz_decimals: u32) -> String {
    trim_zeros(format!("{:.*}", sz_decimals as usize, sz))
}

fn trim_zeros(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

// =============================================================================
// Tests
// =============================================================================
