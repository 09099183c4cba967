#![allow(dead_code)]

use github_mcp_server::config::Config;
use github_mcp_server::server::protocol::{JsonRpcError, Request, RequestId};
use github_mcp_server::server::{self, CompletionShim, McpServer, RequestHandler};
use github_mcp_server::translations::Translator;
use httpmock::MockServer;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub fn config(server: &MockServer) -> Config {
    Config {
        token: "test-token".into(),
        api_url: server.base_url(),
        graphql_url: server.url("/graphql"),
        raw_url: server.url("/raw"),
        ..Config::default()
    }
}

pub async fn handler(cfg: &Config) -> CompletionShim<McpServer> {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    server::build_handler(cfg, &Translator::with_overrides(Vec::new()), tx)
        .await
        .unwrap()
}

pub async fn request<H: RequestHandler>(h: &H, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    h.handle(
        Request {
            id: Some(RequestId::Number(1)),
            method: method.into(),
            params,
        },
        CancellationToken::new(),
    )
    .await
}

pub async fn call_tool<H: RequestHandler>(h: &H, name: &str, args: Value) -> Value {
    request(h, "tools/call", json!({ "name": name, "arguments": args }))
        .await
        .unwrap()
}

/// The first text block of a tool result.
pub fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap_or_default()
}
