//! Hyperliquid MCP Server entry point
//!
//! Startup order:
//! 1. .env + logging initialization
//! 2. Credential + settings loading (configuration errors are fatal here)
//! 3. Client wiring into the application context
//! 4. MCP stdio serve loop until stdin closes or Ctrl+C

use std::sync::Arc;

use tracing::{error, info};

use hyperliquid_mcp::config::{init_logging, Credentials, Settings};
use hyperliquid_mcp::server::serve_stdio;
use hyperliquid_mcp::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    info!("=== Hyperliquid MCP Server ===");

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(error = %e, "Configuration validation failed");
            return Err(e.into());
        }
    };
    let settings = Settings::from_env();

    info!(
        network = %credentials.network,
        api_url = %credentials.api_url,
        "Configuration loaded"
    );
    eprintln!("{}", credentials.summary());

    let ctx = Arc::new(AppContext::new(credentials, settings)?);

    tokio::select! {
        result = serve_stdio(Arc::clone(&ctx)) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            let _ = ctx.ws.disconnect().await;
        }
    }

    info!("Server stopped");
    Ok(())
}
