use super::models::{Comment, PullRequest, Review};
use super::{owner_repo, repo_path, search, trusted, Body, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::filter::{filter_issue_comment, filter_pull_request, filter_pull_request_review};
use crate::mcp::CallToolResult;
use crate::params::{Args, ParamError};
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

fn pr_schema() -> Schema {
    Schema::new()
        .owner_repo()
        .required("pullNumber", ParamType::Number, "Pull request number")
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new("get_pull_request", Category::PullRequests, Access::Read, pr_schema().build(), get_pull_request)
            .describe(t, "Get pull request details", "Get details of a specific pull request in a GitHub repository."),
        Tool::new(
            "list_pull_requests",
            Category::PullRequests,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("state", ParamType::Enum(&["open", "closed", "all"]), "Filter by state")
                .optional("head", ParamType::String, "Filter by head user/org and branch")
                .optional("base", ParamType::String, "Filter by base branch")
                .optional("sort", ParamType::Enum(&["created", "updated", "popularity", "long-running"]), "Sort by")
                .optional("direction", ParamType::Enum(&["asc", "desc"]), "Sort direction")
                .pagination()
                .build(),
            list_pull_requests,
        )
        .describe(t, "List pull requests", "List pull requests in a GitHub repository."),
        search::pull_request_tool(t),
        Tool::new(
            "get_pull_request_files",
            Category::PullRequests,
            Access::Read,
            pr_schema().pagination().build(),
            get_pull_request_files,
        )
        .describe(t, "Get pull request files", "Get the files changed in a specific pull request."),
        Tool::new(
            "get_pull_request_status",
            Category::PullRequests,
            Access::Read,
            pr_schema().build(),
            get_pull_request_status,
        )
        .describe(
            t,
            "Get pull request status checks",
            "Get the status of a specific pull request.",
        ),
        Tool::new(
            "get_pull_request_comments",
            Category::PullRequests,
            Access::Read,
            pr_schema().build(),
            get_pull_request_comments,
        )
        .describe(t, "Get pull request comments", "Get comments for a specific pull request."),
        Tool::new(
            "get_pull_request_reviews",
            Category::PullRequests,
            Access::Read,
            pr_schema().build(),
            get_pull_request_reviews,
        )
        .describe(t, "Get pull request reviews", "Get reviews for a specific pull request."),
        Tool::new(
            "get_pull_request_diff",
            Category::PullRequests,
            Access::Read,
            pr_schema().build(),
            get_pull_request_diff,
        )
        .describe(t, "Get pull request diff", "Get the diff of a pull request."),
        Tool::new(
            "create_pull_request",
            Category::PullRequests,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("title", ParamType::String, "PR title")
                .required("head", ParamType::String, "Branch containing changes")
                .required("base", ParamType::String, "Branch to merge into")
                .optional("body", ParamType::String, "PR description")
                .optional("draft", ParamType::Boolean, "Create as draft PR")
                .optional("maintainer_can_modify", ParamType::Boolean, "Allow maintainer edits")
                .build(),
            create_pull_request,
        )
        .describe(t, "Open new pull request", "Create a new pull request in a GitHub repository."),
        Tool::new(
            "update_pull_request",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .optional("title", ParamType::String, "New title")
                .optional("body", ParamType::String, "New description")
                .optional("state", ParamType::Enum(&["open", "closed"]), "New state")
                .optional("base", ParamType::String, "New base branch name")
                .optional("maintainer_can_modify", ParamType::Boolean, "Allow maintainer edits")
                .build(),
            update_pull_request,
        )
        .describe(t, "Edit pull request", "Update an existing pull request in a GitHub repository."),
        Tool::new(
            "merge_pull_request",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .optional("commit_title", ParamType::String, "Title for merge commit")
                .optional("commit_message", ParamType::String, "Extra detail for merge commit")
                .optional("merge_method", ParamType::Enum(&["merge", "squash", "rebase"]), "Merge method")
                .build(),
            merge_pull_request,
        )
        .describe(t, "Merge pull request", "Merge a pull request in a GitHub repository."),
        Tool::new(
            "update_pull_request_branch",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .optional("expectedHeadSha", ParamType::String, "The expected SHA of the pull request's HEAD ref")
                .build(),
            update_pull_request_branch,
        )
        .describe(
            t,
            "Update pull request branch",
            "Update the branch of a pull request with the latest changes from the base branch.",
        ),
        Tool::new(
            "add_pull_request_review_comment",
            Category::PullRequests,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("pull_number", ParamType::Number, "Pull request number")
                .required("body", ParamType::String, "The text of the review comment")
                .optional("commit_id", ParamType::String, "The SHA of the commit to comment on")
                .optional("path", ParamType::String, "The relative path to the file that necessitates a comment")
                .optional("subject_type", ParamType::Enum(&["line", "file"]), "The level at which the comment is targeted")
                .optional("line", ParamType::Number, "The line of the blob in the pull request diff that the comment applies to")
                .optional("side", ParamType::Enum(&["LEFT", "RIGHT"]), "The side of the diff to comment on")
                .optional("start_line", ParamType::Number, "For multi-line comments, the first line of the range")
                .optional("start_side", ParamType::Enum(&["LEFT", "RIGHT"]), "For multi-line comments, the starting side of the diff")
                .optional("in_reply_to", ParamType::Number, "The ID of the review comment to reply to")
                .build(),
            add_pull_request_review_comment,
        )
        .describe(
            t,
            "Add review comment to pull request",
            "Add a review comment to a pull request, or reply to an existing review comment.",
        ),
        Tool::new(
            "request_copilot_review",
            Category::PullRequests,
            Access::Write,
            pr_schema().build(),
            request_copilot_review,
        )
        .describe(
            t,
            "Request Copilot review",
            "Request an automated Copilot code review for a pull request.",
        ),
    ]
}

fn pull_path(owner: &str, repo: &str, number: i64) -> String {
    format!("{}/pulls/{}", repo_path(owner, repo), number)
}

fn pull_number(args: &Args) -> Result<(String, String, i64), ParamError> {
    let (owner, repo) = owner_repo(args)?;
    Ok((owner, repo, args.required_int("pullNumber")?))
}

async fn get_pull_request(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let res = ctx
        .client
        .get_json::<PullRequest>(&pull_path(&owner, &repo, number), &[])
        .await
        .or_api_error(&ctx, "failed to get pull request")?;
    let pr = filter_pull_request(&res.value, &ctx.sanitize);
    let pr = if trusted(&ctx, pr.user.as_ref().map(|u| u.login.as_str())).await {
        pr
    } else {
        PullRequest {
            title: None,
            body: None,
            ..pr
        }
    };
    Ok(CallToolResult::json(&pr))
}

async fn list_pull_requests(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new()
        .opt("state", args.optional_string("state")?)
        .opt("head", args.optional_string("head")?)
        .opt("base", args.optional_string("base")?)
        .opt("sort", args.optional_string("sort")?)
        .opt("direction", args.optional_string("direction")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Vec<PullRequest>>(&format!("{}/pulls", repo_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list pull requests")?;
    let kept = ctx.retain_trusted(res.value).await;
    let prs: Vec<PullRequest> = kept
        .iter()
        .map(|p| filter_pull_request(p, &ctx.sanitize))
        .collect();
    Ok(CallToolResult::json(&prs))
}

async fn get_pull_request_files(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/files", pull_path(&owner, &repo, number)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to get pull request files")?;
    Ok(CallToolResult::json(&res.value))
}

async fn get_pull_request_status(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    #[derive(Deserialize)]
    struct Head {
        sha: String,
    }
    #[derive(Deserialize)]
    struct Pr {
        head: Head,
    }
    let pr = ctx
        .client
        .get_json::<Pr>(&pull_path(&owner, &repo, number), &[])
        .await
        .or_api_error(&ctx, "failed to get pull request")?;
    let status = ctx
        .client
        .get_json::<Value>(
            &format!("{}/commits/{}/status", repo_path(&owner, &repo), pr.value.head.sha),
            &[],
        )
        .await
        .or_api_error(&ctx, "failed to get combined status")?;
    Ok(CallToolResult::json(&status.value))
}

async fn get_pull_request_comments(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let q = Query::new().set("per_page", 100);
    let res = ctx
        .client
        .get_json::<Vec<Comment>>(&format!("{}/comments", pull_path(&owner, &repo, number)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to get pull request comments")?;
    let kept = ctx.retain_trusted(res.value).await;
    let comments: Vec<Comment> = kept
        .iter()
        .map(|c| filter_issue_comment(c, &ctx.sanitize))
        .collect();
    Ok(CallToolResult::json(&comments))
}

async fn get_pull_request_reviews(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let res = ctx
        .client
        .get_json::<Vec<Review>>(&format!("{}/reviews", pull_path(&owner, &repo, number)), &[])
        .await
        .or_api_error(&ctx, "failed to get pull request reviews")?;
    let kept = ctx.retain_trusted(res.value).await;
    let reviews: Vec<Review> = kept
        .iter()
        .map(|r| filter_pull_request_review(r, &ctx.sanitize))
        .collect();
    Ok(CallToolResult::json(&reviews))
}

async fn get_pull_request_diff(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let res = ctx
        .client
        .get_text(&pull_path(&owner, &repo, number), DIFF_MEDIA_TYPE)
        .await
        .or_api_error(&ctx, "failed to get pull request diff")?;
    Ok(CallToolResult::text(res.value))
}

async fn create_pull_request(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let title: String = args.required("title")?;
    let head: String = args.required("head")?;
    let base: String = args.required("base")?;
    let body = Body::new()
        .set("title", title)
        .set("head", head)
        .set("base", base)
        .opt("body", args.optional_string("body")?)
        .set("draft", args.optional_bool("draft")?)
        .opt("maintainer_can_modify", args.optional::<bool>("maintainer_can_modify")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::POST, &format!("{}/pulls", repo_path(&owner, &repo)), Some(&body))
        .await
        .or_api_error(&ctx, "failed to create pull request")?;
    Ok(CallToolResult::json(&res.value))
}

async fn update_pull_request(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let body = Body::new()
        .opt("title", args.optional_string("title")?)
        .opt("body", args.optional_string("body")?)
        .opt("state", args.optional_string("state")?)
        .opt("base", args.optional_string("base")?)
        .opt("maintainer_can_modify", args.optional::<bool>("maintainer_can_modify")?);
    if body.is_empty() {
        return Err(ToolError::failed("No update parameters provided."));
    }
    let res = ctx
        .client
        .send_json::<_, Value>(Method::PATCH, &pull_path(&owner, &repo, number), Some(&body.into_value()))
        .await
        .or_api_error(&ctx, "failed to update pull request")?;
    Ok(CallToolResult::json(&res.value))
}

async fn merge_pull_request(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let body = Body::new()
        .opt("commit_title", args.optional_string("commit_title")?)
        .opt("commit_message", args.optional_string("commit_message")?)
        .opt("merge_method", args.optional_string("merge_method")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(
            Method::PUT,
            &format!("{}/merge", pull_path(&owner, &repo, number)),
            Some(&body),
        )
        .await
        .or_api_error(&ctx, "failed to merge pull request")?;
    Ok(CallToolResult::json(&res.value))
}

async fn update_pull_request_branch(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    let body = Body::new()
        .opt("expected_head_sha", args.optional_string("expectedHeadSha")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(
            Method::PUT,
            &format!("{}/update-branch", pull_path(&owner, &repo, number)),
            Some(&body),
        )
        .await
        .or_api_error(&ctx, "failed to update pull request branch")?;
    Ok(CallToolResult::json(&res.value))
}

/// Request body for a new (non-reply) review comment. Enforces the line/side
/// pairing rules before anything is sent.
fn review_comment_body(args: &Args, text: String) -> Result<Value, ParamError> {
    let commit_id: String = args.required("commit_id")?;
    let path: String = args.required("path")?;
    let subject_type = args.optional_string("subject_type")?;
    let line = args.optional_int("line")?;
    let side = args.optional_string("side")?;
    let start_line = args.optional_int("start_line")?;
    let start_side = args.optional_string("start_side")?;

    if subject_type.as_deref() != Some("file") && line.is_none() {
        return Err(ParamError::invalid("line", "is required unless subject_type is file"));
    }
    if start_line.is_some() && line.is_none() {
        return Err(ParamError::invalid("line", "is required when start_line is set"));
    }
    if start_side.is_some() && side.is_none() {
        return Err(ParamError::invalid("side", "is required when start_side is set"));
    }
    Ok(Body::new()
        .set("body", text)
        .set("commit_id", commit_id)
        .set("path", path)
        .opt("subject_type", subject_type)
        .opt("line", line)
        .opt("side", side)
        .opt("start_line", start_line)
        .opt("start_side", start_side)
        .into_value())
}

async fn add_pull_request_review_comment(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("pull_number")?;
    let text: String = args.required("body")?;
    let base = pull_path(&owner, &repo, number);

    if let Some(reply_to) = args.optional_int("in_reply_to")? {
        let res = ctx
            .client
            .send_json::<_, Value>(
                Method::POST,
                &format!("{}/comments/{}/replies", base, reply_to),
                Some(&json!({ "body": text })),
            )
            .await
            .or_api_error(&ctx, "failed to reply to pull request comment")?;
        return Ok(CallToolResult::json(&res.value));
    }

    let body = review_comment_body(&args, text)?;
    let res = ctx
        .client
        .send_json::<_, Value>(Method::POST, &format!("{}/comments", base), Some(&body))
        .await
        .or_api_error(&ctx, "failed to create pull request comment")?;
    Ok(CallToolResult::json(&res.value))
}

async fn request_copilot_review(_ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo, number) = pull_number(&args)?;
    Ok(CallToolResult::text(format!(
        "Requesting a Copilot review is not supported by this server (pull request {}/{}#{}).",
        owner, repo, number
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Args {
        Args::from_value(v).unwrap()
    }

    #[test]
    fn line_is_required_for_line_comments() {
        let a = args(json!({"commit_id": "abc", "path": "a.rs"}));
        let err = review_comment_body(&a, "x".into()).unwrap_err();
        assert!(err.to_string().contains("line"));
        let file = args(json!({"commit_id": "abc", "path": "a.rs", "subject_type": "file"}));
        let body = review_comment_body(&file, "x".into()).unwrap();
        assert_eq!(body["subject_type"], "file");
        assert!(body.get("line").is_none());
    }

    #[test]
    fn start_line_implies_line_and_start_side_implies_side() {
        let a = args(json!({"commit_id": "c", "path": "p", "subject_type": "file", "start_line": 3}));
        assert_eq!(
            review_comment_body(&a, "x".into()).unwrap_err().to_string(),
            "parameter line is required when start_line is set"
        );
        let b = args(json!({"commit_id": "c", "path": "p", "line": 4, "start_side": "LEFT"}));
        assert!(review_comment_body(&b, "x".into()).is_err());
        let ok = args(json!({"commit_id": "c", "path": "p", "line": 4, "side": "RIGHT", "start_line": 2, "start_side": "LEFT"}));
        let body = review_comment_body(&ok, "x".into()).unwrap();
        assert_eq!(body["start_line"], 2);
    }

    #[test]
    fn commit_and_path_required_without_reply() {
        let a = args(json!({"path": "p", "line": 1}));
        assert_eq!(
            review_comment_body(&a, "x".into()).unwrap_err(),
            ParamError::Missing("commit_id".into())
        );
    }
}
