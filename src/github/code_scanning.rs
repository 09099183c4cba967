use super::{owner_repo, repo_path, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolResult};
use crate::translations::Translator;
use serde_json::Value;

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "get_code_scanning_alert",
            Category::CodeScanning,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("alertNumber", ParamType::Number, "The number of the alert")
                .build(),
            get_code_scanning_alert,
        )
        .describe(
            t,
            "Get code scanning alert",
            "Get details of a specific code scanning alert in a GitHub repository.",
        ),
        Tool::new(
            "list_code_scanning_alerts",
            Category::CodeScanning,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("ref", ParamType::String, "The Git reference for the results you want to list")
                .optional("state", ParamType::Enum(&["open", "closed", "dismissed", "fixed"]), "Filter code scanning alerts by state. Defaults to open")
                .optional("severity", ParamType::Enum(&["critical", "high", "medium", "low", "warning", "note", "error"]), "Filter code scanning alerts by severity")
                .optional("tool_name", ParamType::String, "The name of the tool used for code scanning")
                .build(),
            list_code_scanning_alerts,
        )
        .describe(
            t,
            "List code scanning alerts",
            "List code scanning alerts in a GitHub repository.",
        ),
    ]
}

async fn get_code_scanning_alert(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("alertNumber")?;
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/code-scanning/alerts/{}", repo_path(&owner, &repo), number),
            &[],
        )
        .await
        .or_api_error(&ctx, "failed to get alert")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_code_scanning_alerts(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new()
        .opt("ref", args.optional_string("ref")?)
        .set("state", args.optional_string("state")?.unwrap_or_else(|| "open".into()))
        .opt("severity", args.optional_string("severity")?)
        .opt("tool_name", args.optional_string("tool_name")?);
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/code-scanning/alerts", repo_path(&owner, &repo)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to list alerts")?;
    Ok(CallToolResult::json(&res.value))
}
