//! Exchange client adapter
//!
//! Credential-scoped access to one Hyperliquid deployment: the read-only
//! info endpoint, the signed exchange endpoint, and the shared HTTP
//! transport with its retry discipline.

pub mod error;
pub mod exchange;
pub mod http;
pub mod info;
pub mod signing;
pub mod types;

pub use error::{ClientError, ClientResult};
pub use exchange::{ExchangeClient, OrderOutcome};
pub use http::{build_http_client, HttpTransport, RetryPolicy};
pub use info::InfoClient;
pub use types::{OrderRequest, OrderSide, OrderType, Tif};
