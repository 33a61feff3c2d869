//! Subscription registry
//!
//! Owns every live subscription: id allocation, lifecycle state, per-
//! subscription delivery channels, and message routing from the feed
//! reader. All methods are safe under concurrent add/remove/list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

use super::types::{
    subscription_object, SubscriptionChannel, SubscriptionParams, SubscriptionState, WsEnvelope,
};
use crate::client::types::now_iso;

/// Capacity of each per-subscription delivery channel; delivery is lossy
/// past this depth so a slow consumer cannot wedge the reader loop
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Global atomic counter for unique subscription ids
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::SeqCst)
}

// =============================================================================
// Entries
// =============================================================================

struct SubscriptionEntry {
    channel: SubscriptionChannel,
    params: SubscriptionParams,
    state: SubscriptionState,
    messages_received: u64,
    subscribed_at: String,
    sender: mpsc::Sender<serde_json::Value>,
}

/// Serializable snapshot of one subscription, for listings
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriptionInfo {
    pub subscription_id: u64,
    pub subscription_type: String,
    pub params: SubscriptionParams,
    pub state: SubscriptionState,
    pub messages_received: u64,
    pub subscribed_at: String,
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent map of subscription id to channel state
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<u64, SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscription in `Requested` state and hand back its id
    /// together with the receiving end of its delivery channel.
    ///
    /// Subscribing twice to the same channel+params yields two independent
    /// entries, each deliverable and closeable on its own.
    pub async fn add(
        &self,
        channel: SubscriptionChannel,
        params: SubscriptionParams,
    ) -> (u64, mpsc::Receiver<serde_json::Value>) {
        let id = next_subscription_id();
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let entry = SubscriptionEntry {
            channel,
            params,
            state: SubscriptionState::Requested,
            messages_received: 0,
            subscribed_at: now_iso(),
            sender,
        };
        self.entries.write().await.insert(id, entry);
        tracing::debug!(subscription_id = id, channel = %channel, "Subscription registered");
        (id, receiver)
    }

    /// Move matching `Requested` entries to `Active` when the exchange acks.
    ///
    /// The ack echoes the subscription object, so entries are matched on
    /// channel + params.
    pub async fn mark_active(&self, acked_subscription: &serde_json::Value) -> usize {
        let mut activated = 0;
        let mut entries = self.entries.write().await;
        for (id, entry) in entries.iter_mut() {
            if entry.state == SubscriptionState::Requested
                && subscription_object(entry.channel, &entry.params) == *acked_subscription
            {
                entry.state = SubscriptionState::Active;
                activated += 1;
                tracing::debug!(subscription_id = *id, channel = %entry.channel, "Subscription active");
            }
        }
        activated
    }

    /// Close and remove one subscription. Returns its channel + params so
    /// the caller can send the unsubscribe message, or None for unknown ids.
    pub async fn close(&self, id: u64) -> Option<(SubscriptionChannel, SubscriptionParams)> {
        let mut entries = self.entries.write().await;
        entries.remove(&id).map(|entry| {
            tracing::debug!(subscription_id = id, channel = %entry.channel, "Subscription closed");
            (entry.channel, entry.params)
        })
    }

    /// Close every subscription (connection permanently lost)
    pub async fn close_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    /// Revert every entry to `Requested` (reconnect in progress; acks will
    /// re-activate them) and return the subscription objects to re-send.
    pub async fn reset_to_requested(&self) -> Vec<serde_json::Value> {
        let mut entries = self.entries.write().await;
        entries
            .values_mut()
            .map(|entry| {
                entry.state = SubscriptionState::Requested;
                subscription_object(entry.channel, &entry.params)
            })
            .collect()
    }

    /// Snapshot of all subscriptions
    pub async fn list(&self) -> Vec<SubscriptionInfo> {
        let entries = self.entries.read().await;
        let mut infos: Vec<SubscriptionInfo> = entries
            .iter()
            .map(|(id, entry)| SubscriptionInfo {
                subscription_id: *id,
                subscription_type: entry.channel.as_str().to_string(),
                params: entry.params.clone(),
                state: entry.state,
                messages_received: entry.messages_received,
                subscribed_at: entry.subscribed_at.clone(),
            })
            .collect();
        infos.sort_by_key(|info| info.subscription_id);
        infos
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Route one feed envelope to every matching active subscription.
    ///
    /// Matching is channel name plus, for market-data channels, the coin the
    /// payload refers to. Delivery is non-blocking; messages to a full or
    /// abandoned channel are dropped.
    pub async fn route(&self, envelope: &WsEnvelope) -> usize {
        let mut delivered = 0;
        let mut entries = self.entries.write().await;
        for entry in entries.values_mut() {
            if entry.state != SubscriptionState::Active {
                continue;
            }
            if entry.channel.as_str() != envelope.channel {
                continue;
            }
            if let Some(wanted) = &entry.params.coin {
                match envelope.data_coin() {
                    Some(coin) if coin == wanted => {}
                    _ => continue,
                }
            }
            entry.messages_received += 1;
            let _ = entry.sender.try_send(envelope.data.clone());
            delivered += 1;
        }
        delivered
    }
}

// =============================================================================
// Tests
// =============================================================================
