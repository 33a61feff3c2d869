//! MCP resources
//!
//! Static reference material plus the redacted configuration summary,
//! served through resources/list and resources/read.

use crate::context::AppContext;

const CONFIG_URI: &str = "config://hyperliquid";
const TRADING_GUIDE_URI: &str = "guide://trading";
const SYMBOLS_GUIDE_URI: &str = "guide://symbols";

const TRADING_GUIDE: &str = "\
Hyperliquid Trading Guide:

## Order Types:
- Market Order: Execute immediately at current market price
- Limit Order: Execute at specific price or better
- Reduce-Only: Only reduce existing position size

## Position Management:
- Long positions: Profit when price increases
- Short positions: Profit when price decreases
- Monitor margin usage to avoid liquidation

## Risk Management:
- Use appropriate position sizing
- Set stop-loss levels before entering trades
- Monitor funding rates for perpetual contracts
- Keep sufficient margin for volatile markets

## Best Practices:
1. Start with small position sizes
2. Use limit orders to control execution price
3. Monitor liquidation price on leveraged positions
4. Keep track of funding rate costs
5. Use the account state tool to monitor overall exposure
";

const SYMBOLS_GUIDE: &str = "\
Hyperliquid Trading Symbols:

## Major Cryptocurrencies:
- BTC - Bitcoin
- ETH - Ethereum
- SOL - Solana
- AVAX - Avalanche

## Order Size Guidelines:
- Check minimum order size for each symbol
- Use appropriate decimal precision
- Consider liquidity before placing large orders

## Price Precision:
- Different symbols have different tick sizes
- Limit prices must match the tick size
- Use market data tools to check current precision

## Trading Hours:
- The exchange operates 24/7
- Funding occurs every 8 hours for perpetuals
";

/// Entries for resources/list
pub fn resource_list() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "uri": CONFIG_URI,
            "name": "Server configuration",
            "description": "Current configuration and connection status (redacted)",
            "mimeType": "text/plain",
        }),
        serde_json::json!({
            "uri": TRADING_GUIDE_URI,
            "name": "Trading guide",
            "description": "Order types, position and risk management basics",
            "mimeType": "text/plain",
        }),
        serde_json::json!({
            "uri": SYMBOLS_GUIDE_URI,
            "name": "Symbols guide",
            "description": "Available symbols and precision rules",
            "mimeType": "text/plain",
        }),
    ]
}

/// Resolve one resource by uri
pub fn read_resource(ctx: &AppContext, uri: &str) -> Option<String> {
    match uri {
        CONFIG_URI => Some(ctx.credentials.summary()),
        TRADING_GUIDE_URI => Some(TRADING_GUIDE.to_string()),
        SYMBOLS_GUIDE_URI => Some(SYMBOLS_GUIDE.to_string()),
        _ => None,
    }
}
