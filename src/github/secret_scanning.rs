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
            "get_secret_scanning_alert",
            Category::SecretProtection,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("alertNumber", ParamType::Number, "The number of the alert")
                .build(),
            get_secret_scanning_alert,
        )
        .describe(
            t,
            "Get secret scanning alert",
            "Get details of a specific secret scanning alert in a GitHub repository.",
        ),
        Tool::new(
            "list_secret_scanning_alerts",
            Category::SecretProtection,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("state", ParamType::Enum(&["open", "resolved"]), "Filter by state")
                .optional("secret_type", ParamType::String, "A comma-separated list of secret types to return")
                .optional(
                    "resolution",
                    ParamType::Enum(&["false_positive", "wont_fix", "revoked", "pattern_edited", "pattern_deleted", "used_in_tests"]),
                    "Filter by resolution",
                )
                .build(),
            list_secret_scanning_alerts,
        )
        .describe(
            t,
            "List secret scanning alerts",
            "List secret scanning alerts in a GitHub repository.",
        ),
    ]
}

async fn get_secret_scanning_alert(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("alertNumber")?;
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/secret-scanning/alerts/{}", repo_path(&owner, &repo), number),
            &[],
        )
        .await
        .or_api_error(&ctx, "failed to get alert")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_secret_scanning_alerts(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new()
        .opt("state", args.optional_string("state")?)
        .opt("secret_type", args.optional_string("secret_type")?)
        .opt("resolution", args.optional_string("resolution")?);
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/secret-scanning/alerts", repo_path(&owner, &repo)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to list alerts")?;
    Ok(CallToolResult::json(&res.value))
}
