//! Configuration loading for the Hyperliquid MCP server
//!
//! Everything is environment-driven: credentials, network selection and
//! runtime knobs come from env vars (optionally via a `.env` file loaded
//! by the binary). There is no config file format.

pub mod credentials;
pub mod logging;
pub mod settings;

pub use credentials::{Credentials, Network};
pub use logging::init_logging;
pub use settings::Settings;
