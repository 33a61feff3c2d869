//! Real-time feed: WebSocket manager and subscription registry

pub mod manager;
pub mod registry;
pub mod types;

pub use manager::{ConnectionState, ConnectionStats, WsManager};
pub use registry::{SubscriptionInfo, SubscriptionRegistry};
pub use types::{SubscriptionChannel, SubscriptionParams, SubscriptionState};
