use super::owner_repo;
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::{Args, ParamError, Pagination};
use crate::sanitize::sanitize;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn cursor_schema(s: Schema) -> Schema {
    s.optional("perPage", ParamType::Number, "Results per page (min 1, max 100)")
        .optional("after", ParamType::String, "Cursor for pagination, from the previous page's endCursor")
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "list_discussions",
            Category::Discussions,
            Access::Read,
            cursor_schema(
                Schema::new()
                    .owner_repo()
                    .optional("category", ParamType::String, "Optional discussion category ID to filter by"),
            )
            .build(),
            list_discussions,
        )
        .describe(t, "List discussions", "List discussions for a repository"),
        Tool::new(
            "get_discussion",
            Category::Discussions,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("discussionNumber", ParamType::Number, "Discussion number")
                .build(),
            get_discussion,
        )
        .describe(t, "Get discussion", "Get a specific discussion by ID"),
        Tool::new(
            "get_discussion_comments",
            Category::Discussions,
            Access::Read,
            cursor_schema(
                Schema::new()
                    .owner_repo()
                    .required("discussionNumber", ParamType::Number, "Discussion number"),
            )
            .build(),
            get_discussion_comments,
        )
        .describe(t, "Get discussion comments", "Get comments from a discussion"),
        Tool::new(
            "list_discussion_categories",
            Category::Discussions,
            Access::Read,
            Schema::new().owner_repo().build(),
            list_discussion_categories,
        )
        .describe(
            t,
            "List discussion categories",
            "List discussion categories with their id and name, for a repository",
        ),
    ]
}

fn page_size(args: &Args) -> Result<i64, ParamError> {
    let n = args.optional_int_or("perPage", Pagination::DEFAULT_PER_PAGE as i64)?;
    if !(1..=Pagination::MAX_PER_PAGE as i64).contains(&n) {
        return Err(ParamError::invalid("perPage", "must be between 1 and 100"));
    }
    Ok(n)
}

#[derive(Debug, Deserialize, Serialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct CategoryName {
    name: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct Discussion {
    number: i64,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: String,
    url: String,
    category: Option<CategoryName>,
    author: Option<Login>,
}

async fn list_discussions(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let category = args.optional_string("category")?;
    let first = page_size(&args)?;
    let after = args.optional_string("after")?;

    #[derive(Deserialize)]
    struct Conn {
        nodes: Vec<Discussion>,
        #[serde(rename = "pageInfo")]
        page_info: PageInfo,
    }
    #[derive(Deserialize)]
    struct Repo {
        discussions: Conn,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    // categoryId is nullable, so a single document covers both the filtered
    // and unfiltered listing.
    let query = r#"
    query ListDiscussions($owner: String!, $repo: String!, $first: Int!, $after: String, $categoryId: ID) {
      repository(owner: $owner, name: $repo) {
        discussions(first: $first, after: $after, categoryId: $categoryId) {
          nodes { number title createdAt url category { name } author { login } }
          pageInfo { hasNextPage endCursor }
        }
      }
    }
    "#;
    let vars = json!({
        "owner": owner,
        "repo": repo,
        "first": first,
        "after": after,
        "categoryId": category,
    });
    let data: Data = ctx
        .client
        .graphql(query, &vars)
        .await
        .or_graphql_error(&ctx, "failed to list discussions")?;
    let conn = data
        .repository
        .ok_or_else(|| ToolError::failed(format!("repository {}/{} not found", owner, repo)))?
        .discussions;
    Ok(CallToolResult::json(&json!({
        "discussions": conn.nodes,
        "pageInfo": conn.page_info,
    })))
}

async fn get_discussion(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("discussionNumber")?;
    #[derive(Deserialize)]
    struct Repo {
        discussion: Option<Discussion>,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    let query = r#"
    query GetDiscussion($owner: String!, $repo: String!, $number: Int!) {
      repository(owner: $owner, name: $repo) {
        discussion(number: $number) { number title body createdAt url category { name } author { login } }
      }
    }
    "#;
    let data: Data = ctx
        .client
        .graphql(query, &json!({ "owner": owner, "repo": repo, "number": number }))
        .await
        .or_graphql_error(&ctx, "failed to get discussion")?;
    let mut d = data
        .repository
        .and_then(|r| r.discussion)
        .ok_or_else(|| ToolError::failed(format!("discussion {} not found", number)))?;
    d.title = sanitize(&d.title, &ctx.sanitize);
    d.body = d.body.map(|b| sanitize(&b, &ctx.sanitize));
    Ok(CallToolResult::json(&d))
}

async fn get_discussion_comments(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let number = args.required_int("discussionNumber")?;
    let first = page_size(&args)?;
    let after = args.optional_string("after")?;
    #[derive(Deserialize, Serialize)]
    struct Comment {
        body: String,
        author: Option<Login>,
    }
    #[derive(Deserialize)]
    struct Conn {
        nodes: Vec<Comment>,
        #[serde(rename = "pageInfo")]
        page_info: PageInfo,
    }
    #[derive(Deserialize)]
    struct Disc {
        comments: Conn,
    }
    #[derive(Deserialize)]
    struct Repo {
        discussion: Option<Disc>,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    let query = r#"
    query DiscussionComments($owner: String!, $repo: String!, $number: Int!, $first: Int!, $after: String) {
      repository(owner: $owner, name: $repo) {
        discussion(number: $number) {
          comments(first: $first, after: $after) {
            nodes { body author { login } }
            pageInfo { hasNextPage endCursor }
          }
        }
      }
    }
    "#;
    let vars = json!({ "owner": owner, "repo": repo, "number": number, "first": first, "after": after });
    let data: Data = ctx
        .client
        .graphql(query, &vars)
        .await
        .or_graphql_error(&ctx, "failed to get discussion comments")?;
    let conn = data
        .repository
        .and_then(|r| r.discussion)
        .ok_or_else(|| ToolError::failed(format!("discussion {} not found", number)))?
        .comments;
    let mut comments = Vec::with_capacity(conn.nodes.len());
    for c in conn.nodes {
        let author = c.author.as_ref().map(|a| a.login.as_str());
        if !super::trusted(&ctx, author).await {
            continue;
        }
        comments.push(Comment {
            body: sanitize(&c.body, &ctx.sanitize),
            author: c.author,
        });
    }
    Ok(CallToolResult::json(&json!({
        "comments": comments,
        "pageInfo": conn.page_info,
    })))
}

async fn list_discussion_categories(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    #[derive(Deserialize, Serialize)]
    struct Cat {
        id: String,
        name: String,
    }
    #[derive(Deserialize)]
    struct Conn {
        nodes: Vec<Cat>,
    }
    #[derive(Deserialize)]
    struct Repo {
        #[serde(rename = "discussionCategories")]
        categories: Conn,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
    }
    let query = r#"
    query DiscussionCategories($owner: String!, $repo: String!) {
      repository(owner: $owner, name: $repo) {
        discussionCategories(first: 25) { nodes { id name } }
      }
    }
    "#;
    let data: Data = ctx
        .client
        .graphql(query, &json!({ "owner": owner, "repo": repo }))
        .await
        .or_graphql_error(&ctx, "failed to list discussion categories")?;
    let cats = data
        .repository
        .map(|r| r.categories.nodes)
        .unwrap_or_default();
    Ok(CallToolResult::json(&cats))
}
