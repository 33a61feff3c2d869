//! End-to-End Dispatch Tests
//!
//! Exercises the full path host request -> dispatch -> adapter -> (mock)
//! exchange endpoint, including the failure taxonomy:
//! 1. Fail-fast validation with zero network traffic
//! 2. Bounded retry on rate limits
//! 3. Terminal rejections surfaced verbatim
//! 4. Subscription lifecycle through the dispatch surface
//!
//! # Running the tests
//! ```bash
//! cargo test --test dispatch_cycle
//! ```

use std::sync::Arc;

use hyperliquid_mcp::config::{Credentials, Network, Settings};
use hyperliquid_mcp::tools::{dispatch, ToolError};
use hyperliquid_mcp::AppContext;

const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TEST_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Context wired to a mock REST endpoint (WebSocket URL left unused unless
/// a test overrides it)
fn mock_ctx(api_url: &str) -> AppContext {
    let mut credentials =
        Credentials::new(TEST_KEY.into(), TEST_ADDR.into(), Network::Testnet).unwrap();
    credentials.api_url = api_url.to_string();
    let settings = Settings {
        request_timeout_secs: 5,
        max_retry_attempts: 3,
        ..Settings::default()
    };
    AppContext::new(credentials, settings).unwrap()
}

fn meta_body() -> &'static str {
    r#"{"universe": [
        {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
        {"name": "ETH", "szDecimals": 4, "maxLeverage": 50}
    ]}"#
}

// =============================================================================
// Market data
// =============================================================================

#[tokio::test]
async fn test_get_all_mids_returns_positive_prices() {
    let mut server = mockito::Server::new_async().await;
    let _mids = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({"type": "allMids"})))
        .with_status(200)
        .with_body(r#"{"BTC": "96000.5", "ETH": "2501.25", "SOL": "201.5"}"#)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let result = dispatch(&ctx, "get_all_mids", serde_json::json!({}))
        .await
        .unwrap();

    let mids = result.as_object().unwrap();
    assert_eq!(mids.len(), 3);
    for (coin, price) in mids {
        assert!(
            price.as_f64().unwrap() > 0.0,
            "mid for {} must be positive",
            coin
        );
    }
}

#[tokio::test]
async fn test_get_l2_orderbook_metrics() {
    let mut server = mockito::Server::new_async().await;
    let _book = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"type": "l2Book", "coin": "BTC"}),
        ))
        .with_status(200)
        .with_body(
            r#"{"coin": "BTC", "time": 1700000000000, "levels": [
                [{"px": "96000", "sz": "1.5", "n": 3}, {"px": "95999", "sz": "2.0", "n": 1}],
                [{"px": "96002", "sz": "0.5", "n": 2}]
            ]}"#,
        )
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let result = dispatch(&ctx, "get_l2_orderbook", serde_json::json!({"coin": "BTC"}))
        .await
        .unwrap();

    assert_eq!(result["best_bid"], 96000.0);
    assert_eq!(result["best_ask"], 96002.0);
    assert_eq!(result["spread"], 2.0);
    assert_eq!(result["mid_price"], 96001.0);
    assert_eq!(result["bid_volume"], 3.5);
}

#[tokio::test]
async fn test_get_orderbook_depth_validation_before_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/info")
        .expect(0)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let err = dispatch(
        &ctx,
        "get_l2_orderbook",
        serde_json::json!({"coin": "BTC", "depth": 50}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "validation_error");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_candles_invalid_interval() {
    let ctx = mock_ctx("http://127.0.0.1:1");
    let err = dispatch(
        &ctx,
        "get_candles",
        serde_json::json!({"coin": "BTC", "interval": "2h"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "validation_error");
}

#[tokio::test]
async fn test_get_funding_rates_zips_universe() {
    let mut server = mockito::Server::new_async().await;
    let _meta = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"type": "metaAndAssetCtxs"}),
        ))
        .with_status(200)
        .with_body(
            r#"[
                {"universe": [{"name": "BTC", "szDecimals": 5}, {"name": "ETH", "szDecimals": 4}]},
                [{"funding": "0.0000125", "markPx": "96000", "oraclePx": "95990", "openInterest": "1000"},
                 {"funding": "-0.0000042", "markPx": "2500", "oraclePx": "2499", "openInterest": "5000"}]
            ]"#,
        )
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let result = dispatch(&ctx, "get_funding_rates", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result["rate_count"], 2);
    let rates = result["funding_rates"].as_array().unwrap();
    assert_eq!(rates[0]["coin"], "BTC");
    assert!((rates[0]["funding_rate_pct"].as_f64().unwrap() - 0.00125).abs() < 1e-9);
    assert_eq!(rates[1]["coin"], "ETH");
}

// =============================================================================
// Fail-fast validation (no partial side effects)
// =============================================================================

#[tokio::test]
async fn test_place_order_zero_size_makes_no_network_call() {
    let mut server = mockito::Server::new_async().await;
    let info = server.mock("POST", "/info").expect(0).create_async().await;
    let exchange = server.mock("POST", "/exchange").expect(0).create_async().await;

    let ctx = mock_ctx(&server.url());
    let err = dispatch(
        &ctx,
        "place_order",
        serde_json::json!({"coin": "BTC", "is_buy": true, "size": 0.0, "price": 96000.0}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), "validation_error");
    assert!(err.to_string().contains("size must be positive"), "Got: {}", err);
    info.assert_async().await;
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_batch_with_one_bad_order_aborts_whole_batch() {
    let mut server = mockito::Server::new_async().await;
    let exchange = server.mock("POST", "/exchange").expect(0).create_async().await;

    let ctx = mock_ctx(&server.url());
    let err = dispatch(
        &ctx,
        "place_batch_orders",
        serde_json::json!({"orders": [
            {"coin": "BTC", "is_buy": true, "size": 0.1, "price": 96000.0},
            {"coin": "ETH", "is_buy": false, "size": -1.0, "price": 2500.0}
        ]}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), "validation_error");
    assert!(err.to_string().contains("Order 1"), "Got: {}", err);
    exchange.assert_async().await;
}

#[tokio::test]
async fn test_invalid_tif_rejected() {
    let ctx = mock_ctx("http://127.0.0.1:1");
    let err = dispatch(
        &ctx,
        "place_order",
        serde_json::json!({"coin": "BTC", "is_buy": true, "size": 0.1, "price": 96000.0, "tif": "FOK"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "validation_error");
}

#[tokio::test]
async fn test_unknown_tool() {
    let ctx = mock_ctx("http://127.0.0.1:1");
    let err = dispatch(&ctx, "get_weather", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::UnknownTool(_)));
    assert_eq!(err.category(), "unknown_tool");
}

#[tokio::test]
async fn test_dead_mans_switch_minimum_delay() {
    let ctx = mock_ctx("http://127.0.0.1:1");
    let err = dispatch(
        &ctx,
        "update_dead_mans_switch",
        serde_json::json!({"delay_seconds": 3}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "validation_error");
}

// =============================================================================
// Order lifecycle against the mock exchange
// =============================================================================

#[tokio::test]
async fn test_place_then_cancel_then_cancel_again() {
    let mut server = mockito::Server::new_async().await;
    let _meta = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({"type": "meta"})))
        .with_status(200)
        .with_body(meta_body())
        .create_async()
        .await;

    // First call places, second cancels, third hits the already-closed path
    let _place = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(
            r#"{"status": "ok", "response": {"type": "order",
                "data": {"statuses": [{"resting": {"oid": 555}}]}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let placed = dispatch(
        &ctx,
        "place_order",
        serde_json::json!({"coin": "BTC", "is_buy": true, "size": 0.1, "price": 96000.0}),
    )
    .await
    .unwrap();
    assert_eq!(placed["success"], true);
    assert_eq!(placed["order_id"], 555);
    assert!(placed["cloid"].as_str().unwrap().starts_with("0x"));

    let _cancel_ok = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(
            r#"{"status": "ok", "response": {"type": "cancel",
                "data": {"statuses": ["success"]}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let canceled = dispatch(
        &ctx,
        "cancel_order",
        serde_json::json!({"coin": "BTC", "order_id": 555}),
    )
    .await
    .unwrap();
    assert_eq!(canceled["status"], "canceled");

    let _cancel_closed = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(
            r#"{"status": "ok", "response": {"type": "cancel",
                "data": {"statuses": [{"error": "Order already canceled or filled"}]}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    // Second cancel is terminal, not a crash and not a retry storm
    let err = dispatch(
        &ctx,
        "cancel_order",
        serde_json::json!({"coin": "BTC", "order_id": 555}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "exchange_rejected");
    assert!(err.to_string().contains("already canceled"), "Got: {}", err);
}

#[tokio::test]
async fn test_exchange_rejection_surfaces_verbatim() {
    let mut server = mockito::Server::new_async().await;
    let _meta = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({"type": "meta"})))
        .with_status(200)
        .with_body(meta_body())
        .create_async()
        .await;
    let _exchange = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(
            r#"{"status": "ok", "response": {"type": "order",
                "data": {"statuses": [{"error": "Insufficient margin to place order"}]}}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let err = dispatch(
        &ctx,
        "place_order",
        serde_json::json!({"coin": "ETH", "is_buy": true, "size": 100.0, "price": 2500.0}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "exchange_rejected");
    assert!(err.to_string().contains("Insufficient margin"), "Got: {}", err);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_bounded_retry_then_surfaces() {
    let mut server = mockito::Server::new_async().await;
    let mids = server
        .mock("POST", "/info")
        .with_status(429)
        .with_body("rate limit exceeded")
        .expect(3)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let err = dispatch(&ctx, "get_all_mids", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "rate_limit_error");
    // Exactly max_retry_attempts requests, then surfaced
    mids.assert_async().await;
}

// =============================================================================
// Account tools
// =============================================================================

#[tokio::test]
async fn test_get_user_state_shapes_positions() {
    let mut server = mockito::Server::new_async().await;
    let _state = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"type": "clearinghouseState"}),
        ))
        .with_status(200)
        .with_body(
            r#"{
                "marginSummary": {"accountValue": "10000.5", "totalMarginUsed": "1200",
                                  "totalNtlPos": "6250", "totalRawUsd": "10000.5"},
                "withdrawable": "8800.5",
                "assetPositions": [
                    {"position": {"coin": "ETH", "szi": "-2.5", "entryPx": "2500",
                                  "leverage": {"type": "cross", "value": 10},
                                  "unrealizedPnl": "42", "marginUsed": "625",
                                  "positionValue": "6250", "returnOnEquity": "0.067",
                                  "liquidationPx": "2900.1"}},
                    {"position": {"coin": "BTC", "szi": "0.0",
                                  "leverage": {"type": "cross", "value": 10},
                                  "unrealizedPnl": "0", "marginUsed": "0",
                                  "positionValue": "0", "returnOnEquity": "0"}}
                ]
            }"#,
        )
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let result = dispatch(&ctx, "get_user_state", serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(result["account_value"], 10000.5);
    assert_eq!(result["withdrawable"], 8800.5);
    // Flat positions are filtered out
    assert_eq!(result["position_count"], 1);
    let position = &result["positions"][0];
    assert_eq!(position["coin"], "ETH");
    assert_eq!(position["side"], "short");
    assert_eq!(position["size"], 2.5);
}

#[tokio::test]
async fn test_get_user_fills_limit_validation() {
    let ctx = mock_ctx("http://127.0.0.1:1");
    let err = dispatch(
        &ctx,
        "get_user_fills",
        serde_json::json!({"limit": 5000}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "validation_error");
}

#[tokio::test]
async fn test_rate_limit_status_classification() {
    let mut server = mockito::Server::new_async().await;
    let _limit = server
        .mock("POST", "/info")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"type": "userRateLimit"}),
        ))
        .with_status(200)
        .with_body(r#"{"nRequestsUsed": 1150, "nRequestsCap": 1200, "cumVlm": "50000"}"#)
        .create_async()
        .await;

    let ctx = mock_ctx(&server.url());
    let result = dispatch(&ctx, "get_rate_limit_status", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result["status"], "critical");
    assert_eq!(result["requests"]["remaining"], 50);
    assert!(!result["recommendations"].as_array().unwrap().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_dispatch_calls_share_context() {
    let mut server = mockito::Server::new_async().await;
    let _mids = server
        .mock("POST", "/info")
        .with_status(200)
        .with_body(r#"{"BTC": "96000.5"}"#)
        .expect(8)
        .create_async()
        .await;

    let ctx = Arc::new(mock_ctx(&server.url()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            dispatch(&ctx, "get_all_mids", serde_json::json!({})).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result["BTC"], 96000.5);
    }
}
