pub mod protocol;
pub mod transport;

use crate::completions::{self, CompleteParams};
use crate::config::Config;
use crate::context::{RequestContext, Session};
use crate::errors::{get_api_errors, get_graphql_errors};
use crate::filter::init_filter;
use crate::github;
use crate::http::{build_client, AccessMode};
use crate::mcp::PROTOCOL_VERSION;
use crate::params::Args;
use crate::resources::ResourceCatalog;
use crate::sanitize::SanitizeConfig;
use crate::tools::ToolError;
use crate::toolsets::ToolsetGroup;
use crate::translations::Translator;
use anyhow::Context as _;
use async_trait::async_trait;
use log::{debug, info, warn};
use protocol::{
    InitializeResult, JsonRpcError, ReadResourceParams, Request, ResourcesCapability,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SERVER_NAME: &str = "github-mcp-server";

/// Answers JSON-RPC requests. Implementations may be stacked, each handling
/// some methods and delegating the rest.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request, cancel: CancellationToken) -> Result<Value, JsonRpcError>;

    fn on_notification(&self, method: &str, _params: &Value) {
        debug!("ignoring notification {}", method);
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))
}

/// Tools and resources over GitHub.
pub struct McpServer {
    context: RequestContext,
    toolsets: Arc<ToolsetGroup>,
    resources: ResourceCatalog,
    dynamic: bool,
}

impl McpServer {
    pub fn new(
        context: RequestContext,
        toolsets: Arc<ToolsetGroup>,
        resources: ResourceCatalog,
        dynamic: bool,
    ) -> Self {
        Self {
            context,
            toolsets,
            resources,
            dynamic,
        }
    }

    fn initialize(&self, params: &Value) -> Result<Value, JsonRpcError> {
        if let Some(client) = params.get("clientInfo") {
            info!(
                "client {} {} (protocol {})",
                client["name"].as_str().unwrap_or("unknown"),
                client["version"].as_str().unwrap_or("?"),
                params["protocolVersion"].as_str().unwrap_or("?")
            );
        }
        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: self.dynamic,
                },
                resources: ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                },
                completions: json!({}),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: None,
        })
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        let tools: Vec<_> = self
            .toolsets
            .active_tools()
            .iter()
            .map(|t| t.descriptor())
            .collect();
        to_result(&json!({ "tools": tools }))
    }

    async fn call_tool(&self, params: Value, cancel: CancellationToken) -> Result<Value, JsonRpcError> {
        let call: ToolCallParams = parse_params(params)?;
        let tool = self
            .toolsets
            .find_tool(&call.name)
            .ok_or_else(|| JsonRpcError::invalid_params(&format!("unknown tool: {}", call.name)))?;
        let access = if tool.is_read_only() {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let ctx = self.context.scoped(cancel, access).with_error_tracking();
        debug!("calling tool {}", tool.name);
        let outcome = match Args::from_value(call.arguments) {
            Ok(args) => tool.call(ctx.clone(), args).await,
            Err(e) => Err(ToolError::Params(e)),
        };
        log_recorded_errors(&ctx, &tool.name);
        let result = match outcome {
            Ok(r) => r,
            Err(e) => e
                .into_result()
                .map_err(|e| JsonRpcError::internal_error(&format!("{:#}", e)))?,
        };
        to_result(&result)
    }

    async fn read_resource(&self, params: Value, cancel: CancellationToken) -> Result<Value, JsonRpcError> {
        let p: ReadResourceParams = parse_params(params)?;
        let ctx = self.context.scoped(cancel, AccessMode::ReadOnly);
        match self.resources.read(&ctx, &p.uri).await {
            Ok(contents) => to_result(&json!({ "contents": contents })),
            Err(e) if e.is_invalid_request() => Err(JsonRpcError::invalid_params(&e.to_string())),
            Err(e) => {
                warn!("resources/read {} failed: {}", p.uri, e);
                Err(JsonRpcError::internal_error(&e.to_string()))
            }
        }
    }
}

/// Response middleware: every GitHub failure a handler recorded is logged once
/// the call has finished.
fn log_recorded_errors(ctx: &RequestContext, tool: &str) {
    if let Ok(errors) = get_api_errors(ctx) {
        for e in errors {
            match e.response.as_ref() {
                Some(r) => warn!("{}: {} (HTTP {})", tool, e, r.status.as_u16()),
                None => warn!("{}: {}", tool, e),
            }
        }
    }
    if let Ok(errors) = get_graphql_errors(ctx) {
        for e in errors {
            warn!("{}: {}", tool, e);
        }
    }
}

#[async_trait]
impl RequestHandler for McpServer {
    async fn handle(&self, request: Request, cancel: CancellationToken) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => self.initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params, cancel).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "resources/templates/list" => {
                to_result(&json!({ "resourceTemplates": self.resources.descriptors() }))
            }
            "resources/read" => self.read_resource(request.params, cancel).await,
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn on_notification(&self, method: &str, _params: &Value) {
        match method {
            "notifications/initialized" => info!("client initialized"),
            other => debug!("ignoring notification {}", other),
        }
    }
}

/// Routes `completion/complete` to the completion engine and everything else
/// to the wrapped handler.
pub struct CompletionShim<H> {
    inner: H,
    context: RequestContext,
}

impl<H: RequestHandler> CompletionShim<H> {
    pub fn new(inner: H, context: RequestContext) -> Self {
        Self { inner, context }
    }
}

#[async_trait]
impl<H: RequestHandler> RequestHandler for CompletionShim<H> {
    async fn handle(&self, request: Request, cancel: CancellationToken) -> Result<Value, JsonRpcError> {
        if request.method != "completion/complete" {
            return self.inner.handle(request, cancel).await;
        }
        let params: CompleteParams = parse_params(request.params)?;
        let ctx = self.context.scoped(cancel, AccessMode::ReadOnly);
        let completion = completions::complete(&ctx, &params).await.map_err(|e| {
            warn!("completion of {} failed ({}): {}", params.argument.name, e.info().code, e);
            JsonRpcError::internal_error(&format!("failed to complete {}: {}", params.argument.name, e))
        })?;
        to_result(&json!({ "completion": completion }))
    }

    fn on_notification(&self, method: &str, params: &Value) {
        self.inner.on_notification(method, params)
    }
}

/// Assemble the handler stack for `cfg`. `outgoing` carries server-initiated
/// notifications to the transport.
pub async fn build_handler(
    cfg: &Config,
    translator: &Translator,
    outgoing: tokio::sync::mpsc::UnboundedSender<Value>,
) -> anyhow::Result<CompletionShim<McpServer>> {
    let client = build_client(cfg).context("failed to build HTTP client")?;
    let toolsets = github::build_toolset_group(translator, cfg)?;
    let resources = ResourceCatalog::new(translator)?;
    let session = Arc::new(Session::new(toolsets.clone(), Some(outgoing)));
    let mut ctx = RequestContext::new(client)
        .with_sanitize(SanitizeConfig {
            disabled: cfg.disable_sanitization,
        })
        .with_session(session);
    if let Some(repo) = cfg.content_filter_trusted_repo.as_deref() {
        ctx = init_filter(ctx, repo).await?;
        info!("content filter limited to collaborators of {}", repo);
    }
    let server = McpServer::new(ctx.clone(), toolsets, resources, cfg.dynamic_toolsets);
    Ok(CompletionShim::new(server, ctx))
}

/// Serve MCP on stdin/stdout until EOF, SIGINT or SIGTERM.
pub async fn run(cfg: &Config, translator: &Translator) -> anyhow::Result<()> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handler = build_handler(cfg, translator, tx.clone()).await?;
    info!("GitHub MCP server running on stdio");
    transport::serve(
        Arc::new(handler),
        tokio::io::stdin(),
        tokio::io::stdout(),
        tx,
        rx,
        shutdown_signal(),
    )
    .await
    .context("stdio transport failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolsets::ToolsetGroup;

    fn server(cfg: &Config) -> McpServer {
        let t = Translator::with_overrides(Vec::new());
        let ctx = RequestContext::new(build_client(cfg).unwrap());
        let toolsets = github::build_toolset_group(&t, cfg).unwrap();
        McpServer::new(ctx, toolsets, ResourceCatalog::new(&t).unwrap(), cfg.dynamic_toolsets)
    }

    fn request(method: &str, params: Value) -> Request {
        Request {
            id: Some(protocol::RequestId::Number(1)),
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_advertises_capabilities() {
        let cfg = Config {
            dynamic_toolsets: true,
            ..Config::default()
        };
        let v = server(&cfg)
            .handle(request("initialize", json!({})), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(v["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(v["capabilities"]["tools"]["listChanged"], true);
        assert!(v["capabilities"]["completions"].is_object());
        assert_eq!(v["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn unknown_tool_and_method_are_rpc_errors() {
        let s = server(&Config::default());
        let err = s
            .handle(request("tools/call", json!({"name": "nope"})), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        let err = s
            .handle(request("prompts/list", Value::Null), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn parameter_errors_are_tool_results() {
        let s = server(&Config::default());
        let v = s
            .handle(
                request("tools/call", json!({"name": "get_issue", "arguments": {"owner": "o"}})),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(v["isError"], true);
        assert_eq!(v["content"][0]["text"], "missing required parameter: repo");
    }

    #[tokio::test]
    async fn completion_shim_ignores_foreign_schemes() {
        let cfg = Config::default();
        let ctx = RequestContext::new(build_client(&cfg).unwrap());
        let shim = CompletionShim::new(server(&cfg), ctx);
        let v = shim
            .handle(
                request(
                    "completion/complete",
                    json!({"ref": {"type": "ref/resource", "uri": "file:///x"}, "argument": {"name": "owner", "value": "oc"}}),
                ),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(v["completion"]["values"], json!([]));
        assert_eq!(v["completion"]["hasMore"], false);
    }

    #[test]
    fn read_only_group_is_shared() {
        let cfg = Config {
            read_only: true,
            ..Config::default()
        };
        let s = server(&cfg);
        let group: &ToolsetGroup = &s.toolsets;
        assert!(group.read_only());
    }
}
