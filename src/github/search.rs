use super::{owner_repo, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolResult};
use crate::translations::Translator;
use serde_json::Value;

const ORDER: ParamType = ParamType::Enum(&["asc", "desc"]);

pub fn repository_tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "search_repositories",
            Category::Search,
            Access::Read,
            Schema::new()
                .required("query", ParamType::String, "Search query")
                .pagination()
                .build(),
            search_repositories,
        )
        .describe(t, "Search repositories", "Search for GitHub repositories"),
        Tool::new(
            "search_code",
            Category::Search,
            Access::Read,
            Schema::new()
                .required("query", ParamType::String, "Search query using GitHub code search syntax")
                .optional("sort", ParamType::String, "Sort field ('indexed' only)")
                .optional("order", ORDER, "Sort order")
                .pagination()
                .build(),
            search_code,
        )
        .describe(t, "Search code", "Search for code across GitHub repositories"),
    ]
}

pub fn issue_tool(t: &Translator) -> Tool {
    Tool::new(
        "search_issues",
        Category::Search,
        Access::Read,
        item_search_schema(&["comments", "reactions", "created", "updated", "interactions"]),
        search_issues,
    )
    .describe(
        t,
        "Search issues",
        "Search for issues in GitHub repositories using issues search syntax",
    )
}

pub fn pull_request_tool(t: &Translator) -> Tool {
    Tool::new(
        "search_pull_requests",
        Category::Search,
        Access::Read,
        item_search_schema(&["comments", "reactions", "created", "updated", "interactions"]),
        search_pull_requests,
    )
    .describe(
        t,
        "Search pull requests",
        "Search for pull requests in GitHub repositories using issues search syntax",
    )
}

pub fn user_tool(t: &Translator) -> Tool {
    Tool::new(
        "search_users",
        Category::Users,
        Access::Read,
        Schema::new()
            .required("query", ParamType::String, "Search query using GitHub users search syntax")
            .optional("sort", ParamType::Enum(&["followers", "repositories", "joined"]), "Sort field")
            .optional("order", ORDER, "Sort order")
            .pagination()
            .build(),
        search_users,
    )
    .describe(t, "Search users", "Search for GitHub users")
}

fn item_search_schema(sorts: &'static [&'static str]) -> Value {
    Schema::new()
        .required("query", ParamType::String, "Search query using GitHub issues search syntax")
        .optional("owner", ParamType::String, "Optional repository owner to scope the search")
        .optional("repo", ParamType::String, "Optional repository name to scope the search")
        .optional("sort", ParamType::Enum(sorts), "Sort field")
        .optional("order", ORDER, "Sort order")
        .pagination()
        .build()
}

/// Run one `/search/{kind}` query and return the raw result page.
pub(crate) async fn run(
    ctx: &RequestContext,
    kind: &str,
    query: &str,
    sort: Option<String>,
    order: Option<String>,
    page: crate::params::Pagination,
) -> Result<Value, crate::tools::ToolError> {
    let q = Query::new()
        .set("q", query)
        .opt("sort", sort)
        .opt("order", order)
        .page(page);
    let res = ctx
        .client
        .get_json::<Value>(&format!("/search/{}", kind), q.as_slice())
        .await
        .or_api_error(ctx, &format!("failed to search {}", kind))?;
    Ok(res.value)
}

async fn search_repositories(ctx: RequestContext, args: Args) -> ToolResult {
    let query: String = args.required("query")?;
    let page = args.optional_pagination()?;
    let v = run(&ctx, "repositories", &query, None, None, page).await?;
    Ok(CallToolResult::json(&v))
}

async fn search_code(ctx: RequestContext, args: Args) -> ToolResult {
    let query: String = args.required("query")?;
    let sort = args.optional_string("sort")?;
    let order = args.optional_string("order")?;
    let page = args.optional_pagination()?;
    let v = run(&ctx, "code", &query, sort, order, page).await?;
    Ok(CallToolResult::json(&v))
}

/// Prefix the item-type qualifier and an optional repo scope unless the
/// caller already wrote them.
fn scoped_query(query: &str, kind: &str, args: &Args) -> Result<String, crate::params::ParamError> {
    let mut q = query.trim().to_string();
    if !q.split_whitespace().any(|w| w == kind) {
        q = format!("{} {}", kind, q);
    }
    if args.has("owner") && args.has("repo") && !q.contains("repo:") {
        let (owner, repo) = owner_repo(args)?;
        q = format!("repo:{}/{} {}", owner, repo, q);
    }
    Ok(q)
}

async fn search_items(ctx: RequestContext, args: Args, kind: &str) -> ToolResult {
    let query: String = args.required("query")?;
    let query = scoped_query(&query, kind, &args)?;
    let sort = args.optional_string("sort")?;
    let order = args.optional_string("order")?;
    let page = args.optional_pagination()?;
    let v = run(&ctx, "issues", &query, sort, order, page).await?;
    Ok(CallToolResult::json(&v))
}

async fn search_issues(ctx: RequestContext, args: Args) -> ToolResult {
    search_items(ctx, args, "is:issue").await
}

async fn search_pull_requests(ctx: RequestContext, args: Args) -> ToolResult {
    search_items(ctx, args, "is:pr").await
}

async fn search_users(ctx: RequestContext, args: Args) -> ToolResult {
    let query: String = args.required("query")?;
    let sort = args.optional_string("sort")?;
    let order = args.optional_string("order")?;
    let page = args.optional_pagination()?;
    let v = run(&ctx, "users", &query, sort, order, page).await?;
    let items: Vec<Value> = v["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|u| {
                    serde_json::json!({
                        "login": u["login"],
                        "id": u["id"],
                        "profile_url": u["html_url"],
                        "avatar_url": u["avatar_url"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CallToolResult::json(&serde_json::json!({
        "total_count": v["total_count"],
        "incomplete_results": v["incomplete_results"],
        "items": items,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qualifiers_are_added_once() {
        let args = Args::from_value(json!({"owner": "o", "repo": "r"})).unwrap();
        assert_eq!(scoped_query("bug", "is:pr", &args).unwrap(), "repo:o/r is:pr bug");
        let none = Args::default();
        assert_eq!(scoped_query("is:issue bug", "is:issue", &none).unwrap(), "is:issue bug");
        assert_eq!(
            scoped_query("repo:x/y bug", "is:issue", &args).unwrap(),
            "is:issue repo:x/y bug"
        );
    }
}
