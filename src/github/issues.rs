use super::models::{Comment, Issue};
use super::{owner_repo, repo_path, search, trusted, Body, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::filter::{filter_issue, filter_issue_comment};
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use reqwest::Method;
use serde_json::Value;

const STATE: ParamType = ParamType::Enum(&["open", "closed", "all"]);

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "get_issue",
            Category::Issues,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("issue_number", ParamType::Number, "The number of the issue")
                .build(),
            get_issue,
        )
        .describe(t, "Get issue details", "Get details of a specific issue in a GitHub repository."),
        Tool::new(
            "list_issues",
            Category::Issues,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("state", STATE, "Filter by state")
                .optional("labels", ParamType::StringArray, "Filter by labels")
                .optional("sort", ParamType::Enum(&["created", "updated", "comments"]), "Sort order")
                .optional("direction", ParamType::Enum(&["asc", "desc"]), "Sort direction")
                .optional("since", ParamType::String, "Filter by date (ISO 8601 timestamp)")
                .pagination()
                .build(),
            list_issues,
        )
        .describe(t, "List issues", "List issues in a GitHub repository."),
        search::issue_tool(t),
        Tool::new(
            "get_issue_comments",
            Category::Issues,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("issue_number", ParamType::Number, "Issue number")
                .pagination()
                .build(),
            get_issue_comments,
        )
        .describe(t, "Get issue comments", "Get comments for a specific issue in a GitHub repository."),
        Tool::new(
            "create_issue",
            Category::Issues,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("title", ParamType::String, "Issue title")
                .optional("body", ParamType::String, "Issue body content")
                .optional("assignees", ParamType::StringArray, "Usernames to assign to this issue")
                .optional("labels", ParamType::StringArray, "Labels to apply to this issue")
                .optional("milestone", ParamType::Number, "Milestone number")
                .build(),
            create_issue,
        )
        .describe(t, "Open new issue", "Create a new issue in a GitHub repository."),
        Tool::new(
            "add_issue_comment",
            Category::Issues,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("issue_number", ParamType::Number, "Issue number to comment on")
                .required("body", ParamType::String, "Comment content")
                .build(),
            add_issue_comment,
        )
        .describe(
            t,
            "Add comment to issue",
            "Add a comment to a specific issue in a GitHub repository.",
        ),
        Tool::new(
            "update_issue",
            Category::Issues,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("issue_number", ParamType::Number, "Issue number to update")
                .optional("title", ParamType::String, "New title")
                .optional("body", ParamType::String, "New description")
                .optional("state", ParamType::Enum(&["open", "closed"]), "New state")
                .optional("labels", ParamType::StringArray, "New labels")
                .optional("assignees", ParamType::StringArray, "New assignees")
                .optional("milestone", ParamType::Number, "New milestone number")
                .build(),
            update_issue,
        )
        .describe(t, "Edit issue", "Update an existing issue in a GitHub repository."),
    ]
}

fn issue_path(owner: &str, repo: &str, number: i64) -> String {
    format!("{}/issues/{}", repo_path(owner, repo), number)
}

/// Sanitized copy of an issue; title and body are withheld when the author is
/// not trusted.
async fn present_issue(ctx: &RequestContext, issue: Issue) -> Issue {
    let issue = filter_issue(&issue, &ctx.sanitize);
    if trusted(ctx, issue.user.as_ref().map(|u| u.login.as_str())).await {
        issue
    } else {
        Issue {
            title: None,
            body: None,
            ..issue
        }
    }
}

async fn get_issue(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("issue_number")?;
    let res = ctx
        .client
        .get_json::<Issue>(&issue_path(&owner, &repo, number), &[])
        .await
        .or_api_error(&ctx, "failed to get issue")?;
    let issue = present_issue(&ctx, res.value).await;
    Ok(CallToolResult::json(&issue))
}

async fn list_issues(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let labels = args.optional_string_array("labels")?;
    let q = Query::new()
        .opt("state", args.optional_string("state")?)
        .opt("sort", args.optional_string("sort")?)
        .opt("direction", args.optional_string("direction")?)
        .opt("since", args.optional_string("since")?)
        .page(args.optional_pagination()?);
    let q = if labels.is_empty() { q } else { q.set("labels", labels.join(",")) };
    let res = ctx
        .client
        .get_json::<Vec<Issue>>(&format!("{}/issues", repo_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list issues")?;
    let kept = ctx.retain_trusted(res.value).await;
    let issues: Vec<Issue> = kept.iter().map(|i| filter_issue(i, &ctx.sanitize)).collect();
    Ok(CallToolResult::json(&issues))
}

async fn get_issue_comments(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("issue_number")?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Vec<Comment>>(
            &format!("{}/comments", issue_path(&owner, &repo, number)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, "failed to get issue comments")?;
    let kept = ctx.retain_trusted(res.value).await;
    let comments: Vec<Comment> = kept
        .iter()
        .map(|c| filter_issue_comment(c, &ctx.sanitize))
        .collect();
    Ok(CallToolResult::json(&comments))
}

async fn create_issue(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let title: String = args.required("title")?;
    let body = Body::new()
        .set("title", title)
        .opt("body", args.optional_string("body")?)
        .non_empty("assignees", args.optional_string_array("assignees")?)
        .non_empty("labels", args.optional_string_array("labels")?)
        .opt("milestone", args.optional_int("milestone")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::POST, &format!("{}/issues", repo_path(&owner, &repo)), Some(&body))
        .await
        .or_api_error(&ctx, "failed to create issue")?;
    Ok(CallToolResult::json(&res.value))
}

async fn add_issue_comment(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("issue_number")?;
    let text: String = args.required("body")?;
    let body = Body::new().set("body", text).into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(
            Method::POST,
            &format!("{}/comments", issue_path(&owner, &repo, number)),
            Some(&body),
        )
        .await
        .or_api_error(&ctx, "failed to create comment")?;
    Ok(CallToolResult::json(&res.value))
}

async fn update_issue(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("issue_number")?;
    let mut body = Body::new()
        .opt("title", args.optional_string("title")?)
        .opt("body", args.optional_string("body")?)
        .opt("state", args.optional_string("state")?)
        .opt("milestone", args.optional_int("milestone")?);
    // Present-but-empty arrays clear labels or assignees.
    if args.has("labels") {
        body = body.set("labels", args.optional_string_array("labels")?);
    }
    if args.has("assignees") {
        body = body.set("assignees", args.optional_string_array("assignees")?);
    }
    if body.is_empty() {
        return Err(ToolError::failed("no fields to update"));
    }
    let res = ctx
        .client
        .send_json::<_, Value>(
            Method::PATCH,
            &issue_path(&owner, &repo, number),
            Some(&body.into_value()),
        )
        .await
        .or_api_error(&ctx, "failed to update issue")?;
    Ok(CallToolResult::json(&res.value))
}
