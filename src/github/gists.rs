use super::{Body, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::http::encode_path_segment;
use crate::mcp::CallToolResult;
use crate::params::Args;
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolResult};
use crate::translations::Translator;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn tools(t: &Translator) -> Vec<Tool> {
    vec![
        Tool::new(
            "list_gists",
            Category::Gists,
            Access::Read,
            Schema::new()
                .optional("username", ParamType::String, "GitHub username (omit for authenticated user's gists)")
                .optional("since", ParamType::String, "Only gists updated after this time (ISO 8601 timestamp)")
                .pagination()
                .build(),
            list_gists,
        )
        .describe(t, "List Gists", "List gists for a user"),
        Tool::new(
            "create_gist",
            Category::Gists,
            Access::Write,
            Schema::new()
                .optional("description", ParamType::String, "Description of the gist")
                .required("filename", ParamType::String, "Filename for simple single-file gist creation")
                .required("content", ParamType::String, "Content for simple single-file gist creation")
                .optional("public", ParamType::Boolean, "Whether the gist is public")
                .build(),
            create_gist,
        )
        .describe(t, "Create Gist", "Create a new gist"),
        Tool::new(
            "update_gist",
            Category::Gists,
            Access::Write,
            Schema::new()
                .required("gist_id", ParamType::String, "ID of the gist to update")
                .optional("description", ParamType::String, "Updated description of the gist")
                .required("filename", ParamType::String, "Filename to update or create")
                .required("content", ParamType::String, "Content for the file")
                .build(),
            update_gist,
        )
        .describe(t, "Update Gist", "Update an existing gist"),
    ]
}

/// What a write returns: enough to find the gist again without echoing its files.
#[derive(Debug, Deserialize)]
struct GistRef {
    id: String,
    html_url: Option<String>,
}

fn minimal(g: GistRef) -> CallToolResult {
    CallToolResult::json(&json!({ "id": g.id, "url": g.html_url }))
}

fn files(filename: String, content: String) -> Value {
    json!({ filename: { "content": content } })
}

async fn list_gists(ctx: RequestContext, args: Args) -> ToolResult {
    let path = match args.optional_string("username")? {
        Some(user) => format!("/users/{}/gists", encode_path_segment(&user)),
        None => "/gists".to_string(),
    };
    let q = Query::new()
        .opt("since", args.optional_string("since")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&path, q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list gists")?;
    Ok(CallToolResult::json(&res.value))
}

async fn create_gist(ctx: RequestContext, args: Args) -> ToolResult {
    let filename: String = args.required("filename")?;
    let content: String = args.required("content")?;
    let body = Body::new()
        .opt("description", args.optional_string("description")?)
        .set("public", args.optional_bool("public")?)
        .set("files", files(filename, content))
        .into_value();
    let res = ctx
        .client
        .send_json::<_, GistRef>(Method::POST, "/gists", Some(&body))
        .await
        .or_api_error(&ctx, "failed to create gist")?;
    Ok(minimal(res.value))
}

async fn update_gist(ctx: RequestContext, args: Args) -> ToolResult {
    let id: String = args.required("gist_id")?;
    let filename: String = args.required("filename")?;
    let content: String = args.required("content")?;
    let body = Body::new()
        .opt("description", args.optional_string("description")?)
        .set("files", files(filename, content))
        .into_value();
    let res = ctx
        .client
        .send_json::<_, GistRef>(
            Method::PATCH,
            &format!("/gists/{}", encode_path_segment(&id)),
            Some(&body),
        )
        .await
        .or_api_error(&ctx, "failed to update gist")?;
    Ok(minimal(res.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_payload() {
        let v = files("a.md".into(), "# hi".into());
        assert_eq!(v["a.md"]["content"], "# hi");
    }
}
