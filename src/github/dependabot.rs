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
            "get_dependabot_alert",
            Category::Dependabot,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("alertNumber", ParamType::Number, "The number of the alert")
                .build(),
            get_dependabot_alert,
        )
        .describe(
            t,
            "Get dependabot alert",
            "Get details of a specific dependabot alert in a GitHub repository.",
        ),
        Tool::new(
            "list_dependabot_alerts",
            Category::Dependabot,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("state", ParamType::Enum(&["open", "fixed", "dismissed", "auto_dismissed"]), "Filter dependabot alerts by state. Defaults to open")
                .optional("severity", ParamType::Enum(&["low", "medium", "high", "critical"]), "Filter dependabot alerts by severity")
                .build(),
            list_dependabot_alerts,
        )
        .describe(
            t,
            "List dependabot alerts",
            "List dependabot alerts in a GitHub repository.",
        ),
    ]
}

async fn get_dependabot_alert(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("alertNumber")?;
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/dependabot/alerts/{}", repo_path(&owner, &repo), number),
            &[],
        )
        .await
        .or_api_error(&ctx, &format!("failed to get alert with number '{}'", number))?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_dependabot_alerts(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new()
        .set("state", args.optional_string("state")?.unwrap_or_else(|| "open".into()))
        .opt("severity", args.optional_string("severity")?);
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/dependabot/alerts", repo_path(&owner, &repo)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, &format!("failed to list alerts for repository '{}/{}'", owner, repo))?;
    Ok(CallToolResult::json(&res.value))
}
