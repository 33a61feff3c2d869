//! WebSocket connection manager
//!
//! Owns the single feed connection: TLS connect, background reader,
//! heartbeat, auto-reconnect with backoff and resubscription. Routes every
//! inbound envelope through the subscription registry so delivery never
//! blocks request/response tool calls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use super::registry::{SubscriptionInfo, SubscriptionRegistry};
use super::types::{subscription_object, SubscriptionChannel, SubscriptionParams, WsEnvelope};
use crate::client::types::current_time_ms;
use crate::client::{ClientError, ClientResult};
use crate::config::settings::{RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS};

// =============================================================================
// Constants
// =============================================================================

/// Heartbeat ping interval (seconds)
const WS_PING_INTERVAL_SECS: u64 = 30;
/// Pong age after which the connection is considered dead (milliseconds)
const STALE_THRESHOLD_MS: u64 = 60_000;

// =============================================================================
// WebSocket type aliases
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Connect to a WebSocket endpoint with TLS (TLSv1.2 minimum)
async fn connect_tls(url: &str) -> ClientResult<WsStream> {
    let tls = native_tls::TlsConnector::builder()
        .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
        .build()
        .map_err(|e| ClientError::Network(format!("TLS error: {}", e)))?;

    let (ws_stream, _response) =
        connect_async_tls_with_config(url, None, false, Some(Connector::NativeTls(tls)))
            .await
            .map_err(|e| ClientError::WebSocket(Box::new(e)))?;

    Ok(ws_stream)
}

// =============================================================================
// Connection state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

/// Snapshot of connection counters, for the host-facing stats tool
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub connected: bool,
    pub subscriptions: usize,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub reconnections: u64,
    pub last_message_ms: u64,
    pub connected_at_ms: u64,
}

// =============================================================================
// Shared internals
// =============================================================================

struct Shared {
    ws_url: String,
    registry: SubscriptionRegistry,
    sink: Mutex<Option<WsWriter>>,
    state: RwLock<ConnectionState>,
    last_pong: AtomicU64,
    reader_alive: AtomicBool,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    reconnections: AtomicU64,
    last_message_ms: AtomicU64,
    connected_at_ms: AtomicU64,
    max_reconnect_attempts: u32,
    connect_timeout: Duration,
    reader_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Shared {
    async fn send_json(&self, value: &serde_json::Value) -> ClientResult<()> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(writer) => {
                writer
                    .send(Message::Text(value.to_string()))
                    .await
                    .map_err(|e| ClientError::WebSocket(Box::new(e)))?;
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(ClientError::Network("WebSocket not connected".into())),
        }
    }

    /// Open the stream, store the writer half, return the reader half
    async fn open(&self) -> ClientResult<WsReader> {
        let stream = tokio::time::timeout(self.connect_timeout, connect_tls(&self.ws_url))
            .await
            .map_err(|_| {
                ClientError::Network(format!(
                    "WebSocket connect timed out after {:?}",
                    self.connect_timeout
                ))
            })??;

        let (writer, reader) = stream.split();
        *self.sink.lock().await = Some(writer);
        self.connected_at_ms.store(current_time_ms(), Ordering::Relaxed);
        self.last_pong.store(current_time_ms(), Ordering::Relaxed);
        Ok(reader)
    }

    /// Re-send every registered subscription after a (re)connect
    async fn resubscribe_all(&self) {
        let objects = self.registry.reset_to_requested().await;
        if objects.is_empty() {
            return;
        }
        tracing::info!(count = objects.len(), "Resubscribing to active subscriptions");
        for object in objects {
            let msg = serde_json::json!({"method": "subscribe", "subscription": object});
            if let Err(e) = self.send_json(&msg).await {
                tracing::warn!(error = %e, "Failed to resubscribe");
            }
        }
    }
}

// =============================================================================
// Reader + reconnect
// =============================================================================

fn spawn_reader(shared: Arc<Shared>, reader: WsReader) {
    let task: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
        Box::pin(reader_loop(shared.clone(), reader));
    let handle = tokio::spawn(task);
    if let Ok(mut slot) = shared.reader_task.lock() {
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }
}

async fn reader_loop(shared: Arc<Shared>, mut reader: WsReader) {
    shared.reader_alive.store(true, Ordering::Relaxed);
    tracing::debug!("Feed reader started");

    while let Some(result) = reader.next().await {
        shared.last_message_ms.store(current_time_ms(), Ordering::Relaxed);
        match result {
            Ok(Message::Text(text)) => {
                shared.messages_received.fetch_add(1, Ordering::Relaxed);
                handle_text(&shared, &text).await;
            }
            Ok(Message::Binary(data)) => {
                shared.messages_received.fetch_add(1, Ordering::Relaxed);
                if let Ok(text) = String::from_utf8(data) {
                    handle_text(&shared, &text).await;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Feed closed by server");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Feed read error");
                break;
            }
        }
    }

    shared.reader_alive.store(false, Ordering::Relaxed);

    // Deliberate disconnect: leave quietly. Anything else: try to recover.
    if *shared.state.read().await == ConnectionState::Disconnected {
        tracing::debug!("Feed reader stopped");
        return;
    }
    attempt_reconnect(shared).await;
}

async fn handle_text(shared: &Arc<Shared>, text: &str) {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) => {
            tracing::trace!(message = %text, "Unknown feed message format");
            return;
        }
    };

    match envelope.channel.as_str() {
        "subscriptionResponse" => {
            if let Some(subscription) = envelope.data.get("subscription") {
                let method = envelope.data.get("method").and_then(|m| m.as_str());
                if method == Some("subscribe") {
                    shared.registry.mark_active(subscription).await;
                }
            }
        }
        "pong" => {
            shared.last_pong.store(current_time_ms(), Ordering::Relaxed);
            tracing::trace!("Feed pong received");
        }
        "error" => {
            tracing::warn!(data = %envelope.data, "Feed error message");
        }
        _ => {
            shared.registry.route(&envelope).await;
        }
    }
}

async fn attempt_reconnect(shared: Arc<Shared>) {
    *shared.state.write().await = ConnectionState::Reconnecting;

    for attempt in 0..shared.max_reconnect_attempts {
        // Exponential backoff with jitter to avoid thundering herd
        let jitter = rand::random::<u64>() % 200;
        let backoff_ms = std::cmp::min(
            RETRY_INITIAL_DELAY_MS * (1u64 << attempt),
            RETRY_MAX_DELAY_MS,
        ) + jitter;
        tracing::info!(
            attempt = attempt + 1,
            max = shared.max_reconnect_attempts,
            backoff_ms = backoff_ms,
            "Reconnecting feed"
        );
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;

        match shared.open().await {
            Ok(reader) => {
                *shared.state.write().await = ConnectionState::Connected;
                shared.reconnections.fetch_add(1, Ordering::Relaxed);
                shared.resubscribe_all().await;
                spawn_reader(shared.clone(), reader);
                tracing::info!("Feed reconnected");
                return;
            }
            Err(e) => {
                tracing::warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
            }
        }
    }

    // Gave up: every subscription transitions to Closed
    tracing::error!(
        attempts = shared.max_reconnect_attempts,
        "Feed reconnection failed, closing all subscriptions"
    );
    *shared.state.write().await = ConnectionState::Disconnected;
    *shared.sink.lock().await = None;
    shared.registry.close_all().await;
}

// =============================================================================
// WsManager
// =============================================================================

/// Handle to the feed connection and its subscription registry
pub struct WsManager {
    shared: Arc<Shared>,
    heartbeat_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WsManager {
    pub fn new(ws_url: String, max_reconnect_attempts: u32, ws_timeout_secs: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                ws_url,
                registry: SubscriptionRegistry::new(),
                sink: Mutex::new(None),
                state: RwLock::new(ConnectionState::Disconnected),
                last_pong: AtomicU64::new(0),
                reader_alive: AtomicBool::new(false),
                messages_received: AtomicU64::new(0),
                messages_sent: AtomicU64::new(0),
                reconnections: AtomicU64::new(0),
                last_message_ms: AtomicU64::new(0),
                connected_at_ms: AtomicU64::new(0),
                max_reconnect_attempts: max_reconnect_attempts.max(1),
                connect_timeout: Duration::from_secs(ws_timeout_secs),
                reader_task: std::sync::Mutex::new(None),
            }),
            heartbeat_task: std::sync::Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.shared.state.read().await == ConnectionState::Connected
    }

    /// Connect if not already connected
    pub async fn ensure_connected(&self) -> ClientResult<()> {
        if self.is_connected().await {
            return Ok(());
        }
        self.connect().await
    }

    /// Establish the feed connection and start the reader + heartbeat tasks
    pub async fn connect(&self) -> ClientResult<()> {
        tracing::info!(url = %self.shared.ws_url, "Connecting to feed");
        let reader = self.shared.open().await?;
        *self.shared.state.write().await = ConnectionState::Connected;
        spawn_reader(self.shared.clone(), reader);
        self.spawn_heartbeat();
        self.shared.resubscribe_all().await;
        tracing::info!("Feed connected");
        Ok(())
    }

    /// Tear the connection down and close every subscription
    pub async fn disconnect(&self) -> ClientResult<()> {
        *self.shared.state.write().await = ConnectionState::Disconnected;

        if let Ok(mut slot) = self.heartbeat_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        if let Ok(mut slot) = self.shared.reader_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        {
            let mut sink = self.shared.sink.lock().await;
            if let Some(mut writer) = sink.take() {
                let _ = writer.close().await;
            }
        }
        self.shared.reader_alive.store(false, Ordering::Relaxed);
        let closed = self.shared.registry.close_all().await;
        tracing::info!(closed_subscriptions = closed, "Feed disconnected");
        Ok(())
    }

    /// Register and request one subscription. The returned receiver delivers
    /// the routed payloads; dropping it does not close the subscription.
    pub async fn subscribe(
        &self,
        channel: SubscriptionChannel,
        params: SubscriptionParams,
    ) -> ClientResult<(u64, mpsc::Receiver<serde_json::Value>)> {
        if !self.is_connected().await {
            return Err(ClientError::Subscription {
                channel: channel.as_str().to_string(),
                reason: "WebSocket not connected".into(),
            });
        }

        let (id, receiver) = self.shared.registry.add(channel, params.clone()).await;
        let msg = serde_json::json!({
            "method": "subscribe",
            "subscription": subscription_object(channel, &params),
        });

        if let Err(e) = self.shared.send_json(&msg).await {
            // Roll the entry back so a failed request leaves no trace
            self.shared.registry.close(id).await;
            return Err(ClientError::Subscription {
                channel: channel.as_str().to_string(),
                reason: e.to_string(),
            });
        }

        tracing::info!(subscription_id = id, channel = %channel, "Subscription requested");
        Ok((id, receiver))
    }

    /// Unsubscribe and close one subscription by id
    pub async fn unsubscribe(&self, id: u64) -> ClientResult<()> {
        let (channel, params) = self.shared.registry.close(id).await.ok_or_else(|| {
            ClientError::Validation(format!("Subscription {} not found", id))
        })?;

        let msg = serde_json::json!({
            "method": "unsubscribe",
            "subscription": subscription_object(channel, &params),
        });
        // The entry is already closed; a send failure only means the server
        // will stop hearing from us anyway
        if let Err(e) = self.shared.send_json(&msg).await {
            tracing::warn!(subscription_id = id, error = %e, "Unsubscribe send failed");
        }
        Ok(())
    }

    /// Snapshot of all subscriptions
    pub async fn active_subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.shared.registry.list().await
    }

    /// Connection counters
    pub async fn connection_stats(&self) -> ConnectionStats {
        ConnectionStats {
            connected: self.is_connected().await,
            subscriptions: self.shared.registry.len().await,
            messages_received: self.shared.messages_received.load(Ordering::Relaxed),
            messages_sent: self.shared.messages_sent.load(Ordering::Relaxed),
            reconnections: self.shared.reconnections.load(Ordering::Relaxed),
            last_message_ms: self.shared.last_message_ms.load(Ordering::Relaxed),
            connected_at_ms: self.shared.connected_at_ms.load(Ordering::Relaxed),
        }
    }

    fn spawn_heartbeat(&self) {
        let mut slot = match self.heartbeat_task.lock() {
            Ok(slot) => slot,
            Err(_) => return,
        };
        if slot.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
            interval.tick().await; // skip first immediate tick

            loop {
                interval.tick().await;

                if *shared.state.read().await != ConnectionState::Connected {
                    continue;
                }

                let ping = serde_json::json!({"method": "ping"});
                if let Err(e) = shared.send_json(&ping).await {
                    tracing::warn!(error = %e, "Heartbeat ping failed");
                    continue;
                }

                let last = shared.last_pong.load(Ordering::Relaxed);
                let age_ms = current_time_ms().saturating_sub(last);
                if last != 0 && age_ms > STALE_THRESHOLD_MS {
                    tracing::warn!(age_ms = age_ms, "Pong stale, dropping connection");
                    // Dropping the sink makes the reader loop end and run
                    // the reconnect path
                    *shared.sink.lock().await = None;
                }
            }
        });
        *slot = Some(handle);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Minimal feed server: acks subscribe requests, then pushes one l2Book
    /// update per subscription, and answers pings.
    async fn spawn_feed_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if let Message::Text(text) = msg {
                            let value: serde_json::Value = match serde_json::from_str(&text) {
                                Ok(v) => v,
                                Err(_) => continue,
                            };
                            match value.get("method").and_then(|m| m.as_str()) {
                                Some("subscribe") => {
                                    let sub = value["subscription"].clone();
                                    let ack = serde_json::json!({
                                        "channel": "subscriptionResponse",
                                        "data": {"method": "subscribe", "subscription": sub.clone()},
                                    });
                                    ws.send(Message::Text(ack.to_string())).await.unwrap();
                                    if sub["type"] == "l2Book" {
                                        let update = serde_json::json!({
                                            "channel": "l2Book",
                                            "data": {
                                                "coin": sub["coin"],
                                                "levels": [
                                                    [{"px": "96000", "sz": "1", "n": 1}],
                                                    [{"px": "96001", "sz": "1", "n": 1}]
                                                ],
                                                "time": 1,
                                            },
                                        });
                                        ws.send(Message::Text(update.to_string())).await.unwrap();
                                    }
                                }
                                Some("ping") => {
                                    let pong = serde_json::json!({"channel": "pong"});
                                    ws.send(Message::Text(pong.to_string())).await.unwrap();
                                }
                                _ => {}
                            }
                        }
                    }
                });
            }
        });

        format!("ws://{}", addr)
    }

    async fn recv_with_timeout(
        rx: &mut mpsc::Receiver<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let manager = WsManager::new("ws://127.0.0.1:1".into(), 1, 1);
        let err = manager
            .subscribe(SubscriptionChannel::L2Book, SubscriptionParams::for_coin("BTC"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Subscription { .. }));
        // A failed request leaves nothing behind
        assert_eq!(manager.active_subscriptions().await.len(), 0);
    }

    #[tokio::test]
    async fn test_connect_subscribe_receive_unsubscribe() {
        let url = spawn_feed_server().await;
        let manager = WsManager::new(url, 1, 5);
        manager.connect().await.unwrap();
        assert!(manager.is_connected().await);

        let (id, mut rx) = manager
            .subscribe(SubscriptionChannel::L2Book, SubscriptionParams::for_coin("BTC"))
            .await
            .unwrap();

        let payload = recv_with_timeout(&mut rx).await.expect("expected l2Book payload");
        assert_eq!(payload["coin"], "BTC");

        let subs = manager.active_subscriptions().await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].subscription_id, id);
        assert_eq!(subs[0].messages_received, 1);

        manager.unsubscribe(id).await.unwrap();
        assert_eq!(manager.active_subscriptions().await.len(), 0);

        manager.disconnect().await.unwrap();
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_duplicate_subscriptions_both_deliver() {
        let url = spawn_feed_server().await;
        let manager = WsManager::new(url, 1, 5);
        manager.connect().await.unwrap();

        let (id_a, mut rx_a) = manager
            .subscribe(SubscriptionChannel::L2Book, SubscriptionParams::for_coin("BTC"))
            .await
            .unwrap();
        let (id_b, mut rx_b) = manager
            .subscribe(SubscriptionChannel::L2Book, SubscriptionParams::for_coin("BTC"))
            .await
            .unwrap();
        assert_ne!(id_a, id_b);

        // The second subscribe's pushed update is routed to both entries
        // (the first gets its own push plus the second's)
        assert!(recv_with_timeout(&mut rx_a).await.is_some());
        assert!(recv_with_timeout(&mut rx_b).await.is_some());

        // Each is independently closeable
        manager.unsubscribe(id_a).await.unwrap();
        let remaining = manager.active_subscriptions().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subscription_id, id_b);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_fails() {
        let url = spawn_feed_server().await;
        let manager = WsManager::new(url, 1, 5);
        manager.connect().await.unwrap();
        let err = manager.unsubscribe(999_999).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_track_traffic() {
        let url = spawn_feed_server().await;
        let manager = WsManager::new(url, 1, 5);
        manager.connect().await.unwrap();

        let (_id, mut rx) = manager
            .subscribe(SubscriptionChannel::L2Book, SubscriptionParams::for_coin("ETH"))
            .await
            .unwrap();
        let _ = recv_with_timeout(&mut rx).await;

        let stats = manager.connection_stats().await;
        assert!(stats.connected);
        assert_eq!(stats.subscriptions, 1);
        assert!(stats.messages_sent >= 1);
        assert!(stats.messages_received >= 1);
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_connected_is_idempotent() {
        let url = spawn_feed_server().await;
        let manager = WsManager::new(url, 1, 5);
        manager.ensure_connected().await.unwrap();
        manager.ensure_connected().await.unwrap();
        assert!(manager.is_connected().await);
        manager.disconnect().await.unwrap();
    }
}
