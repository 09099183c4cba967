use super::models::{MinimalUser, UserDetails};
use super::search;
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, Schema, Tool, ToolResult};
use crate::translations::Translator;
use serde::Deserialize;

pub fn context_tools(t: &Translator) -> Vec<Tool> {
    vec![Tool::new(
        "get_me",
        Category::Users,
        Access::Read,
        Schema::new().build(),
        get_me,
    )
    .describe(
        t,
        "Get my user profile",
        "Get details of the authenticated GitHub user. Use this when a request is about the user's own profile for GitHub.",
    )]
}

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![search::user_tool(t)]
}

#[derive(Debug, Deserialize)]
struct FullUser {
    login: String,
    id: Option<i64>,
    html_url: Option<String>,
    avatar_url: Option<String>,
    #[serde(flatten)]
    details: UserDetails,
}

impl From<FullUser> for MinimalUser {
    fn from(u: FullUser) -> Self {
        MinimalUser {
            login: u.login,
            id: u.id,
            profile_url: u.html_url,
            avatar_url: u.avatar_url,
            details: Some(u.details),
        }
    }
}

async fn get_me(ctx: RequestContext, _args: Args) -> ToolResult {
    let res = ctx
        .client
        .get_json::<FullUser>("/user", &[])
        .await
        .or_api_error(&ctx, "failed to get user")?;
    Ok(CallToolResult::json(&MinimalUser::from(res.value)))
}
