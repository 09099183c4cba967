use crate::context::{RequestContext, Session};
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use serde_json::json;
use std::sync::Arc;

pub fn tools(t: &Translator) -> Vec<Tool> {
    let toolset = || {
        Schema::new()
            .required("toolset", ParamType::String, "The name of the toolset")
            .build()
    };
    vec![
        Tool::new(
            "list_available_toolsets",
            Category::Toolsets,
            Access::Read,
            Schema::new().build(),
            list_available_toolsets,
        )
        .describe(
            t,
            "List available toolsets",
            "List all available toolsets this GitHub MCP server can offer, providing the enabled status of each. Use this when a task could be achieved with a GitHub tool and the currently available tools aren't enough. Call get_toolset_tools with these toolset names to discover specific tools you can call",
        ),
        Tool::new(
            "get_toolset_tools",
            Category::Toolsets,
            Access::Read,
            toolset(),
            get_toolset_tools,
        )
        .describe(
            t,
            "List all tools in a toolset",
            "Lists all the capabilities that are enabled with the specified toolset",
        ),
        Tool::new(
            "enable_toolset",
            Category::Toolsets,
            Access::Read,
            toolset(),
            enable_toolset,
        )
        .describe(
            t,
            "Enable a toolset",
            "Enable one of the sets of tools the GitHub MCP server provides, use get_toolset_tools and list_available_toolsets first to see what this will enable",
        ),
    ]
}

fn session(ctx: &RequestContext) -> Result<Arc<Session>, ToolError> {
    ctx.session
        .clone()
        .ok_or_else(|| ToolError::failed("toolset discovery is not available in this session"))
}

async fn list_available_toolsets(ctx: RequestContext, _args: Args) -> ToolResult {
    let s = session(&ctx)?;
    Ok(CallToolResult::json(&s.toolsets.list()))
}

async fn get_toolset_tools(ctx: RequestContext, args: Args) -> ToolResult {
    let s = session(&ctx)?;
    let name: String = args.required("toolset")?;
    let tools = s
        .toolsets
        .toolset_tools(&name)
        .map_err(|e| ToolError::failed(e.to_string()))?;
    let listing: Vec<_> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "can_enable": true,
                "toolset": name,
            })
        })
        .collect();
    Ok(CallToolResult::json(&listing))
}

async fn enable_toolset(ctx: RequestContext, args: Args) -> ToolResult {
    let s = session(&ctx)?;
    let name: String = args.required("toolset")?;
    let changed = s
        .toolsets
        .enable(&name)
        .map_err(|e| ToolError::failed(e.to_string()))?;
    if !changed {
        return Ok(CallToolResult::text(format!("Toolset {} is already enabled", name)));
    }
    s.notify_tools_changed();
    Ok(CallToolResult::text(format!(
        "Toolset {} enabled; its tools are now listed",
        name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::build_client;
    use crate::toolsets::{Toolset, ToolsetGroup, DYNAMIC};

    fn ctx_with(group: Arc<ToolsetGroup>) -> (RequestContext, tokio::sync::mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = build_client(&Config::default()).unwrap();
        let session = Arc::new(Session::new(group, Some(tx)));
        (RequestContext::new(client).with_session(session), rx)
    }

    fn group() -> Arc<ToolsetGroup> {
        let t = Translator::with_overrides(Vec::new());
        let g = ToolsetGroup::new(
            vec![
                Toolset::new("gists", "Gists", super::super::gists::tools(&t)),
                Toolset::new(DYNAMIC, "d", tools(&t)),
            ],
            false,
        );
        g.enable(DYNAMIC).unwrap();
        Arc::new(g)
    }

    #[tokio::test]
    async fn enabling_a_toolset_notifies_once() {
        let g = group();
        let (ctx, mut rx) = ctx_with(g.clone());
        let args = Args::from_value(serde_json::json!({"toolset": "gists"})).unwrap();
        let res = enable_toolset(ctx.clone(), args.clone()).await.unwrap();
        assert!(!res.is_error);
        assert!(g.find_tool("create_gist").is_some());
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg["method"], "notifications/tools/list_changed");

        let again = enable_toolset(ctx, args).await.unwrap();
        assert!(again.text_content().contains("already enabled"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_toolset_is_a_tool_error() {
        let (ctx, _rx) = ctx_with(group());
        let args = Args::from_value(serde_json::json!({"toolset": "nope"})).unwrap();
        let err = get_toolset_tools(ctx, args).await.unwrap_err();
        assert!(err.to_string().contains("toolset nope does not exist"));
    }

    #[tokio::test]
    async fn listing_excludes_the_discovery_toolset() {
        let (ctx, _rx) = ctx_with(group());
        let res = list_available_toolsets(ctx, Args::default()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&res.text_content()).unwrap();
        let names: Vec<&str> = v.as_array().unwrap().iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["gists"]);
        assert_eq!(v[0]["currently_enabled"], false);
    }
}
