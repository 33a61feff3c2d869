//! Credential store
//!
//! Loads the signing key, account address and network selector from the
//! process environment, validates them once at startup, and holds them in
//! memory for the process lifetime. The signing key is never logged and
//! never leaves the process except inside signatures sent to the
//! configured exchange endpoint.

use ethers::signers::{LocalWallet, Signer};

use crate::error::AppError;

// =============================================================================
// Constants
// =============================================================================

/// Mainnet REST endpoint
const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
/// Testnet REST endpoint
const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
/// Mainnet WebSocket endpoint
const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
/// Testnet WebSocket endpoint
const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

// =============================================================================
// Network
// =============================================================================

/// Target Hyperliquid deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Parse from the HYPERLIQUID_NETWORK value ("mainnet" | "testnet")
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(AppError::Config(format!(
                "Invalid HYPERLIQUID_NETWORK value: {}. Must be 'mainnet' or 'testnet'",
                other
            ))),
        }
    }

    /// Default REST endpoint for this network
    pub fn api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_API_URL,
            Network::Testnet => TESTNET_API_URL,
        }
    }

    /// Default WebSocket endpoint for this network
    pub fn ws_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_WS_URL,
            Network::Testnet => TESTNET_WS_URL,
        }
    }

    /// EIP-712 agent source tag ("a" = mainnet, "b" = testnet)
    pub fn agent_source(&self) -> &'static str {
        match self {
            Network::Mainnet => "a",
            Network::Testnet => "b",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Signing credentials for one Hyperliquid account.
///
/// Loaded once at startup, immutable afterwards. `Debug` redacts the key.
#[derive(Clone)]
pub struct Credentials {
    private_key: String,
    /// Account the key trades for (master account when the key is an
    /// approved agent wallet)
    pub account_address: String,
    pub network: Network,
    /// REST endpoint (network default unless HYPERLIQUID_API_URL overrides)
    pub api_url: String,
    /// WebSocket endpoint (network default unless HYPERLIQUID_WS_URL overrides)
    pub ws_url: String,
}

impl Credentials {
    /// Load and validate credentials from environment variables.
    ///
    /// Required: HYPERLIQUID_PRIVATE_KEY, HYPERLIQUID_ACCOUNT_ADDRESS.
    /// Optional: HYPERLIQUID_NETWORK (default mainnet),
    /// HYPERLIQUID_API_URL / HYPERLIQUID_WS_URL endpoint overrides.
    ///
    /// Fails fast with a configuration error; no retry, no network I/O.
    pub fn from_env() -> Result<Self, AppError> {
        let private_key = std::env::var("HYPERLIQUID_PRIVATE_KEY").map_err(|_| {
            AppError::Config("HYPERLIQUID_PRIVATE_KEY environment variable is required".into())
        })?;
        let account_address = std::env::var("HYPERLIQUID_ACCOUNT_ADDRESS").map_err(|_| {
            AppError::Config("HYPERLIQUID_ACCOUNT_ADDRESS environment variable is required".into())
        })?;
        let network =
            Network::parse(&std::env::var("HYPERLIQUID_NETWORK").unwrap_or_else(|_| "mainnet".into()))?;

        let creds = Self::new(private_key, account_address, network)?;

        let api_url = std::env::var("HYPERLIQUID_API_URL")
            .unwrap_or_else(|_| creds.network.api_url().to_string());
        let ws_url = std::env::var("HYPERLIQUID_WS_URL")
            .unwrap_or_else(|_| creds.network.ws_url().to_string());

        Ok(Self { api_url, ws_url, ..creds })
    }

    /// Validate and assemble credentials from explicit values.
    pub fn new(
        private_key: String,
        account_address: String,
        network: Network,
    ) -> Result<Self, AppError> {
        if !private_key.starts_with("0x") {
            return Err(AppError::Config(
                "HYPERLIQUID_PRIVATE_KEY must start with '0x'".into(),
            ));
        }
        if private_key.len() != 66 || !is_hex(&private_key[2..]) {
            return Err(AppError::Config(
                "HYPERLIQUID_PRIVATE_KEY must be a 32-byte hex string (0x + 64 hex chars)".into(),
            ));
        }
        if !account_address.starts_with("0x") || account_address.len() != 42
            || !is_hex(&account_address[2..])
        {
            return Err(AppError::Config(
                "HYPERLIQUID_ACCOUNT_ADDRESS must be a valid Ethereum address (0x...)".into(),
            ));
        }

        // The key must be a usable secp256k1 scalar. When its derived address
        // differs from the account address the key is an approved agent
        // wallet signing for a master account, which is a supported setup.
        let wallet = Self::parse_wallet(&private_key)?;
        let derived = format!("{:#x}", wallet.address());
        if derived != account_address.to_lowercase() {
            tracing::info!(
                account = %redact_address(&account_address),
                "Signing key is an agent wallet for the configured account"
            );
        }

        Ok(Self {
            private_key,
            account_address,
            network,
            api_url: network.api_url().to_string(),
            ws_url: network.ws_url().to_string(),
        })
    }

    /// Wallet used for signing exchange actions
    pub fn wallet(&self) -> Result<LocalWallet, AppError> {
        Self::parse_wallet(&self.private_key)
    }

    fn parse_wallet(private_key: &str) -> Result<LocalWallet, AppError> {
        private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("Invalid HYPERLIQUID_PRIVATE_KEY: {}", e)))
    }

    /// Redacted configuration summary, safe to surface to the host.
    pub fn summary(&self) -> String {
        format!(
            "Hyperliquid MCP Server Configuration:\n\
             - Network: {}\n\
             - API URL: {}\n\
             - WebSocket URL: {}\n\
             - Account Address: {}\n\
             - Private Key: Set\n",
            self.network,
            self.api_url,
            self.ws_url,
            redact_address(&self.account_address),
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("private_key", &"<redacted>")
            .field("account_address", &self.account_address)
            .field("network", &self.network)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Shorten an address to first6…last4 for logs and summaries
pub fn redact_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// Tests
// =============================================================================
