use super::owner_repo;
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::{Args, ParamError};
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use serde::Deserialize;
use serde_json::{json, Value};

const EVENT: ParamType = ParamType::Enum(&["APPROVE", "REQUEST_CHANGES", "COMMENT"]);
const SIDE: ParamType = ParamType::Enum(&["LEFT", "RIGHT"]);

fn pr_schema() -> Schema {
    Schema::new()
        .owner_repo()
        .required("pullNumber", ParamType::Number, "Pull request number")
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "create_and_submit_pull_request_review",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .required("body", ParamType::String, "Review comment text")
                .required("event", EVENT, "Review action to perform")
                .optional("commitID", ParamType::String, "SHA of commit to review")
                .build(),
            create_and_submit_review,
        )
        .describe(
            t,
            "Create and submit a pull request review without comments",
            "Create and submit a review for a pull request without review comments.",
        ),
        Tool::new(
            "create_pending_pull_request_review",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .optional("commitID", ParamType::String, "SHA of commit to review")
                .build(),
            create_pending_review,
        )
        .describe(
            t,
            "Create pending pull request review",
            "Create a pending review for a pull request. Call this first before attempting to add comments to a pending review, and ultimately submitting it.",
        ),
        Tool::new(
            "add_pull_request_review_comment_to_pending_review",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .required("path", ParamType::String, "The relative path to the file that necessitates a comment")
                .required("body", ParamType::String, "The text of the review comment")
                .required("subjectType", ParamType::Enum(&["FILE", "LINE"]), "The level at which the comment is targeted")
                .optional("line", ParamType::Number, "The line of the blob in the pull request diff that the comment applies to")
                .optional("side", SIDE, "The side of the diff to comment on")
                .optional("startLine", ParamType::Number, "For multi-line comments, the first line of the range")
                .optional("startSide", SIDE, "For multi-line comments, the starting side of the diff")
                .build(),
            add_comment_to_pending_review,
        )
        .describe(
            t,
            "Add comment to the requester's latest pending pull request review",
            "Add a comment to the requester's latest pending pull request review; a pending review must already exist.",
        ),
        Tool::new(
            "submit_pending_pull_request_review",
            Category::PullRequests,
            Access::Write,
            pr_schema()
                .required("event", EVENT, "The event to perform")
                .optional("body", ParamType::String, "The text of the review comment")
                .build(),
            submit_pending_review,
        )
        .describe(
            t,
            "Submit the requester's latest pending pull request review",
            "Submit the requester's latest pending pull request review.",
        ),
        Tool::new(
            "delete_pending_pull_request_review",
            Category::PullRequests,
            Access::Write,
            pr_schema().build(),
            delete_pending_review,
        )
        .describe(
            t,
            "Delete the requester's latest pending pull request review",
            "Delete the requester's latest pending pull request review.",
        )
        .destructive(),
    ]
}

struct PrCoordinates {
    owner: String,
    repo: String,
    number: i64,
}

fn coordinates(args: &Args) -> Result<PrCoordinates, ParamError> {
    let (owner, repo) = owner_repo(args)?;
    Ok(PrCoordinates {
        owner,
        repo,
        number: args.required_int("pullNumber")?,
    })
}

#[derive(Debug, Deserialize)]
struct ReviewNode {
    id: String,
    state: String,
    url: String,
}

async fn pull_request_id(ctx: &RequestContext, pr: &PrCoordinates) -> Result<String, ToolError> {
    #[derive(Deserialize)]
    struct Pr {
        id: String,
    }
    #[derive(Deserialize)]
    struct Repo {
        #[serde(rename = "pullRequest")]
        pull_request: Option<Pr>,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    let query = r#"
    query PullRequestId($owner: String!, $repo: String!, $prNum: Int!) {
      repository(owner: $owner, name: $repo) {
        pullRequest(number: $prNum) { id }
      }
    }
    "#;
    let vars = json!({ "owner": pr.owner, "repo": pr.repo, "prNum": pr.number });
    let data: Data = ctx
        .client
        .graphql(query, &vars)
        .await
        .or_graphql_error(ctx, "failed to get pull request")?;
    data.repository
        .and_then(|r| r.pull_request)
        .map(|p| p.id)
        .ok_or_else(|| ToolError::failed("failed to get pull request: not found"))
}

async fn viewer_login(ctx: &RequestContext) -> Result<String, ToolError> {
    #[derive(Deserialize)]
    struct Viewer {
        login: String,
    }
    #[derive(Deserialize)]
    struct Data {
        viewer: Viewer,
    }
    let data: Data = ctx
        .client
        .graphql("query Viewer { viewer { login } }", &json!({}))
        .await
        .or_graphql_error(ctx, "failed to get current user")?;
    Ok(data.viewer.login)
}

/// The viewer's latest review on the pull request, required to be pending.
async fn pending_review(ctx: &RequestContext, pr: &PrCoordinates) -> Result<ReviewNode, ToolError> {
    let login = viewer_login(ctx).await?;
    #[derive(Deserialize)]
    struct Reviews {
        nodes: Vec<ReviewNode>,
    }
    #[derive(Deserialize)]
    struct Pr {
        reviews: Reviews,
    }
    #[derive(Deserialize)]
    struct Repo {
        #[serde(rename = "pullRequest")]
        pull_request: Option<Pr>,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    let query = r#"
    query LatestReview($owner: String!, $repo: String!, $prNum: Int!, $author: String!) {
      repository(owner: $owner, name: $repo) {
        pullRequest(number: $prNum) {
          id
          reviews(first: 1, author: $author) { nodes { id state url } }
        }
      }
    }
    "#;
    let vars = json!({ "owner": pr.owner, "repo": pr.repo, "prNum": pr.number, "author": login });
    let data: Data = ctx
        .client
        .graphql(query, &vars)
        .await
        .or_graphql_error(ctx, "failed to get latest review for current user")?;
    let review = data
        .repository
        .and_then(|r| r.pull_request)
        .and_then(|p| p.reviews.nodes.into_iter().next())
        .ok_or_else(|| ToolError::failed("No pending review found for the viewer"))?;
    if review.state != "PENDING" {
        return Err(ToolError::failed(format!(
            "The latest review, found at {} is not pending",
            review.url
        )));
    }
    Ok(review)
}

async fn create_and_submit_review(ctx: RequestContext, args: Args) -> ToolResult {
    let pr = coordinates(&args)?;
    let body: String = args.required("body")?;
    let event: String = args.required("event")?;
    let commit = args.optional_string("commitID")?;
    let pr_id = pull_request_id(&ctx, &pr).await?;
    let mutation = r#"
    mutation AddReview($input: AddPullRequestReviewInput!) {
      addPullRequestReview(input: $input) { pullRequestReview { id state url } }
    }
    "#;
    let mut input = json!({ "pullRequestId": pr_id, "body": body, "event": event });
    if let Some(c) = commit {
        input["commitOID"] = Value::String(c);
    }
    let _: Value = ctx
        .client
        .graphql(mutation, &json!({ "input": input }))
        .await
        .or_graphql_error(&ctx, "failed to create review")?;
    Ok(CallToolResult::text("pull request review submitted successfully"))
}

async fn create_pending_review(ctx: RequestContext, args: Args) -> ToolResult {
    let pr = coordinates(&args)?;
    let commit = args.optional_string("commitID")?;
    let pr_id = pull_request_id(&ctx, &pr).await?;
    let mutation = r#"
    mutation AddPendingReview($input: AddPullRequestReviewInput!) {
      addPullRequestReview(input: $input) { pullRequestReview { id state url } }
    }
    "#;
    let mut input = json!({ "pullRequestId": pr_id });
    if let Some(c) = commit {
        input["commitOID"] = Value::String(c);
    }
    let _: Value = ctx
        .client
        .graphql(mutation, &json!({ "input": input }))
        .await
        .or_graphql_error(&ctx, "failed to create pending review")?;
    Ok(CallToolResult::text("pending pull request created"))
}

async fn add_comment_to_pending_review(ctx: RequestContext, args: Args) -> ToolResult {
    let pr = coordinates(&args)?;
    let path: String = args.required("path")?;
    let body: String = args.required("body")?;
    let subject_type: String = args.required("subjectType")?;
    let line = args.optional_int("line")?;
    let side = args.optional_string("side")?;
    let start_line = args.optional_int("startLine")?;
    let start_side = args.optional_string("startSide")?;

    pull_request_id(&ctx, &pr).await?;
    let review = pending_review(&ctx, &pr).await?;
    let mutation = r#"
    mutation AddThread($input: AddPullRequestReviewThreadInput!) {
      addPullRequestReviewThread(input: $input) { thread { id } }
    }
    "#;
    let input = json!({
        "pullRequestReviewId": review.id,
        "path": path,
        "body": body,
        "subjectType": subject_type,
        "line": line,
        "side": side,
        "startLine": start_line,
        "startSide": start_side,
    });
    #[derive(Deserialize)]
    struct Thread {
        thread: Option<Value>,
    }
    #[derive(Deserialize)]
    struct Data {
        #[serde(rename = "addPullRequestReviewThread")]
        add: Thread,
    }
    let data: Data = ctx
        .client
        .graphql(mutation, &json!({ "input": input }))
        .await
        .or_graphql_error(&ctx, "failed to add review comment")?;
    if data.add.thread.map_or(true, |t| t.is_null()) {
        return Err(ToolError::failed(
            "Failed to add comment to pending review. Possible reasons:\n  - The line number doesn't exist or is not part of the diff\n  - The file path is incorrect",
        ));
    }
    Ok(CallToolResult::text("pull request review comment successfully added to pending review"))
}

async fn submit_pending_review(ctx: RequestContext, args: Args) -> ToolResult {
    let pr = coordinates(&args)?;
    let event: String = args.required("event")?;
    let body = args.optional_string("body")?;
    pull_request_id(&ctx, &pr).await?;
    let review = pending_review(&ctx, &pr).await?;
    let mutation = r#"
    mutation SubmitReview($input: SubmitPullRequestReviewInput!) {
      submitPullRequestReview(input: $input) { pullRequestReview { url } }
    }
    "#;
    let mut input = json!({ "pullRequestReviewId": review.id, "event": event });
    if let Some(b) = body {
        input["body"] = Value::String(b);
    }
    let _: Value = ctx
        .client
        .graphql(mutation, &json!({ "input": input }))
        .await
        .or_graphql_error(&ctx, "failed to submit pull request review")?;
    Ok(CallToolResult::text("pending pull request review successfully submitted"))
}

async fn delete_pending_review(ctx: RequestContext, args: Args) -> ToolResult {
    let pr = coordinates(&args)?;
    pull_request_id(&ctx, &pr).await?;
    let review = pending_review(&ctx, &pr).await?;
    let mutation = r#"
    mutation DeleteReview($input: DeletePullRequestReviewInput!) {
      deletePullRequestReview(input: $input) { pullRequestReview { id } }
    }
    "#;
    let _: Value = ctx
        .client
        .graphql(mutation, &json!({ "input": { "pullRequestReviewId": review.id } }))
        .await
        .or_graphql_error(&ctx, "failed to delete pending pull request review")?;
    Ok(CallToolResult::text("pending pull request review successfully deleted"))
}
