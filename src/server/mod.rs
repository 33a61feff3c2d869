//! MCP stdio server
//!
//! Serves the Model Context Protocol over stdin/stdout: line-delimited
//! JSON-RPC 2.0 with `initialize`, `tools/list`, `tools/call` and the
//! resource endpoints. Tool calls run as independent tasks so a slow
//! exchange query never blocks the read loop; responses are serialized
//! through a single writer task.

pub mod resources;

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::context::AppContext;
use crate::error::Result;
use crate::tools::{dispatch, tool_catalog};

/// Protocol revision implemented by this server
const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "hyperliquid-mcp-server";

// =============================================================================
// JSON-RPC framing
// =============================================================================

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<serde_json::Value>,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

fn response_ok(id: serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn response_error(id: serde_json::Value, code: i64, message: String) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}

// =============================================================================
// Server loop
// =============================================================================

/// Run the stdio server until stdin closes.
pub async fn serve_stdio(ctx: Arc<AppContext>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    // All responses funnel through one writer task so concurrent tool calls
    // cannot interleave bytes on stdout
    let (out_tx, mut out_rx) = mpsc::channel::<serde_json::Value>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let mut line = message.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    tracing::info!("MCP stdio server ready");

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                let _ = out_tx
                    .send(response_error(
                        serde_json::Value::Null,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                    .await;
                continue;
            }
        };

        handle_request(Arc::clone(&ctx), request, out_tx.clone()).await;
    }

    tracing::info!("stdin closed, shutting down");
    let _ = ctx.ws.disconnect().await;
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

async fn handle_request(
    ctx: Arc<AppContext>,
    request: Request,
    out_tx: mpsc::Sender<serde_json::Value>,
) {
    let id = match request.id {
        Some(id) => id,
        // Requests without an id are notifications; nothing to answer
        None => return,
    };

    match request.method.as_str() {
        "initialize" => {
            let result = serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}, "resources": {}},
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            });
            let _ = out_tx.send(response_ok(id, result)).await;
        }
        "ping" => {
            let _ = out_tx.send(response_ok(id, serde_json::json!({}))).await;
        }
        "tools/list" => {
            let result = serde_json::json!({"tools": tool_catalog()});
            let _ = out_tx.send(response_ok(id, result)).await;
        }
        "tools/call" => {
            // Tool calls may hit the network; run each one concurrently
            tokio::spawn(async move {
                let response = call_tool(&ctx, id.clone(), request.params).await;
                let _ = out_tx.send(response).await;
            });
        }
        "resources/list" => {
            let result = serde_json::json!({"resources": resources::resource_list()});
            let _ = out_tx.send(response_ok(id, result)).await;
        }
        "resources/read" => {
            let uri = request
                .params
                .get("uri")
                .and_then(|u| u.as_str())
                .unwrap_or_default()
                .to_string();
            let response = match resources::read_resource(&ctx, &uri) {
                Some(text) => response_ok(
                    id,
                    serde_json::json!({
                        "contents": [{"uri": uri, "mimeType": "text/plain", "text": text}],
                    }),
                ),
                None => response_error(id, -32602, format!("Unknown resource: {}", uri)),
            };
            let _ = out_tx.send(response).await;
        }
        other => {
            let _ = out_tx
                .send(response_error(id, -32601, format!("Method not found: {}", other)))
                .await;
        }
    }
}

/// Execute one tool call and wrap the outcome as MCP content.
///
/// Tool failures are reported as isError content with a stable category,
/// not as protocol faults: the host sees a clear error category and
/// message, never a dropped request.
async fn call_tool(
    ctx: &AppContext,
    id: serde_json::Value,
    params: serde_json::Value,
) -> serde_json::Value {
    let name = params.get("name").and_then(|n| n.as_str()).unwrap_or_default();
    if name.is_empty() {
        return response_error(id, -32602, "tools/call requires a name".into());
    }
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    match dispatch(ctx, name, arguments).await {
        Ok(value) => {
            let text = serde_json::to_string(&value).unwrap_or_else(|_| value.to_string());
            response_ok(
                id,
                serde_json::json!({
                    "content": [{"type": "text", "text": text}],
                    "isError": false,
                }),
            )
        }
        Err(e) => {
            tracing::warn!(tool = name, category = e.category(), error = %e, "Tool call failed");
            let payload = serde_json::json!({
                "error": e.to_string(),
                "category": e.category(),
            });
            response_ok(
                id,
                serde_json::json!({
                    "content": [{"type": "text", "text": payload.to_string()}],
                    "isError": true,
                }),
            )
        }
    }
}
