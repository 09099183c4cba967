use super::{owner_repo, repo_path, search, Body, Query};
use crate::context::RequestContext;
use crate::errors::GitHubResultExt;
use crate::http::{encode_path, encode_path_segment, RawRef};
use crate::mcp::{CallToolResult, ResourceContents};
use crate::params::{Args, ParamError};
use crate::tools::{Access, Category, ParamType, Schema, Tool, ToolError, ToolResult};
use crate::translations::Translator;
use base64::Engine as _;
use log::debug;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn tools(t: &Translator) -> Vec<Tool> {
    let mut tools = vec![
        Tool::new(
            "get_file_contents",
            Category::Repositories,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("path", ParamType::String, "Path to file or directory (directories end with '/')")
                .optional("ref", ParamType::String, "Git ref such as refs/heads/main or refs/tags/v1.0")
                .optional("sha", ParamType::String, "Commit SHA; takes precedence over ref")
                .build(),
            get_file_contents,
        )
        .describe(
            t,
            "Get file or directory contents",
            "Get the contents of a file or directory from a GitHub repository",
        ),
        Tool::new(
            "list_commits",
            Category::Repositories,
            Access::Read,
            Schema::new()
                .owner_repo()
                .optional("sha", ParamType::String, "Commit SHA, branch or tag name to list commits of")
                .optional("author", ParamType::String, "Author username or email to filter by")
                .pagination()
                .build(),
            list_commits,
        )
        .describe(t, "List commits", "Get list of commits of a branch in a GitHub repository"),
        Tool::new(
            "get_commit",
            Category::Repositories,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("sha", ParamType::String, "Commit SHA, branch name or tag name")
                .pagination()
                .build(),
            get_commit,
        )
        .describe(t, "Get commit details", "Get details for a commit from a GitHub repository"),
        Tool::new(
            "list_branches",
            Category::Repositories,
            Access::Read,
            Schema::new().owner_repo().pagination().build(),
            list_branches,
        )
        .describe(t, "List branches", "List branches in a GitHub repository"),
        Tool::new(
            "list_tags",
            Category::Repositories,
            Access::Read,
            Schema::new().owner_repo().pagination().build(),
            list_tags,
        )
        .describe(t, "List tags", "List git tags in a GitHub repository"),
        Tool::new(
            "get_tag",
            Category::Repositories,
            Access::Read,
            Schema::new()
                .owner_repo()
                .required("tag", ParamType::String, "Tag name")
                .build(),
            get_tag,
        )
        .describe(t, "Get tag details", "Get details about a specific git tag in a GitHub repository"),
        Tool::new(
            "create_or_update_file",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("path", ParamType::String, "Path where to create/update the file")
                .required("content", ParamType::String, "Content of the file")
                .required("message", ParamType::String, "Commit message")
                .required("branch", ParamType::String, "Branch to create/update the file in")
                .optional("sha", ParamType::String, "Blob SHA of the file being replaced (required for updates)")
                .build(),
            create_or_update_file,
        )
        .describe(
            t,
            "Create or update file",
            "Create or update a single file in a GitHub repository",
        ),
        Tool::new(
            "delete_file",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("path", ParamType::String, "Path to the file to delete")
                .required("message", ParamType::String, "Commit message")
                .required("branch", ParamType::String, "Branch to delete the file from")
                .build(),
            delete_file,
        )
        .describe(t, "Delete file", "Delete a file from a GitHub repository")
        .destructive(),
        Tool::new(
            "push_files",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("branch", ParamType::String, "Branch to push to")
                .required(
                    "files",
                    ParamType::Array(json!({
                        "type": "object",
                        "properties": {
                            "path": {"type": "string", "description": "Path where to create the file"},
                            "content": {"type": "string", "description": "File content"}
                        },
                        "required": ["path", "content"]
                    })),
                    "Array of file objects to push, each with path and content",
                )
                .required("message", ParamType::String, "Commit message")
                .build(),
            push_files,
        )
        .describe(
            t,
            "Push files to repository",
            "Push multiple files to a GitHub repository in a single commit",
        ),
        Tool::new(
            "create_repository",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .required("name", ParamType::String, "Repository name")
                .optional("description", ParamType::String, "Repository description")
                .optional("private", ParamType::Boolean, "Whether the repository should be private")
                .optional("autoInit", ParamType::Boolean, "Initialize with a README")
                .build(),
            create_repository,
        )
        .describe(t, "Create repository", "Create a new GitHub repository in your account"),
        Tool::new(
            "fork_repository",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .owner_repo()
                .optional("organization", ParamType::String, "Organization to fork to")
                .build(),
            fork_repository,
        )
        .describe(
            t,
            "Fork repository",
            "Fork a GitHub repository to your account or specified organization",
        ),
        Tool::new(
            "create_branch",
            Category::Repositories,
            Access::Write,
            Schema::new()
                .owner_repo()
                .required("branch", ParamType::String, "Name for the new branch")
                .optional("from_branch", ParamType::String, "Source branch (defaults to the repository default branch)")
                .build(),
            create_branch,
        )
        .describe(t, "Create branch", "Create a new branch in a GitHub repository"),
    ];
    tools.extend(search::repository_tools(t));
    tools
}

pub(crate) fn is_text_like(mime: &str) -> bool {
    mime.starts_with("text/") || mime == "application/json"
}

/// Media type of a blob: the served content type unless it is the generic
/// binary one, then a magic-number sniff, then a UTF-8 check.
pub(crate) fn detect_mime(served: Option<&str>, bytes: &[u8]) -> String {
    if let Some(ct) = served.filter(|ct| *ct != "application/octet-stream") {
        return ct.to_string();
    }
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    if std::str::from_utf8(bytes).is_ok() {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// Resource body for a fetched blob, text or base64 depending on its type.
pub(crate) fn resource_contents(uri: String, mime: String, bytes: Vec<u8>) -> ResourceContents {
    if is_text_like(&mime) {
        ResourceContents::Text {
            uri,
            mime_type: mime,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    } else {
        ResourceContents::Blob {
            uri,
            mime_type: mime,
            blob: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

pub(crate) fn contents_path(owner: &str, repo: &str, path: &str) -> String {
    format!(
        "{}/contents/{}",
        repo_path(owner, repo),
        encode_path(path.trim_start_matches('/'))
    )
}

async fn get_file_contents(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let path: String = args.required("path")?;
    let git_ref = args.optional_string("ref")?;
    let sha = args.optional_string("sha")?;
    let listing_ref = sha.clone().or_else(|| git_ref.clone());

    if path.ends_with('/') {
        let q = Query::new().opt("ref", listing_ref);
        let res = ctx
            .client
            .get_json::<Value>(&contents_path(&owner, &repo, &path), q.as_slice())
            .await
            .or_api_error(&ctx, "failed to get file contents")?;
        return Ok(CallToolResult::json(&res.value));
    }

    let (file_sha, raw_ref) = match sha {
        Some(sha) => (sha.clone(), RawRef::Sha(sha)),
        None => {
            let q = Query::new().opt("ref", listing_ref);
            let meta = ctx
                .client
                .get_json::<Value>(&contents_path(&owner, &repo, &path), q.as_slice())
                .await
                .or_api_error(&ctx, "failed to get file contents")?
                .value;
            if meta.is_array() {
                // A directory given without the trailing slash.
                return Ok(CallToolResult::json(&meta));
            }
            let blob_sha = meta["sha"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::failed("failed to get file SHA: response carried none"))?;
            let raw_ref = git_ref.map_or(RawRef::Head, RawRef::Ref);
            (blob_sha, raw_ref)
        }
    };
    let raw = ctx
        .client
        .raw_content(&owner, &repo, &path, &raw_ref)
        .await
        .or_api_error(&ctx, "failed to get raw repository content")?;
    let mime = detect_mime(raw.content_type.as_deref(), &raw.bytes);
    debug!("get_file_contents {}/{}/{} -> {}", owner, repo, path, mime);
    let uri = format!(
        "repo://{}/{}/sha/{}/contents/{}",
        owner,
        repo,
        file_sha,
        path.trim_start_matches('/')
    );
    Ok(CallToolResult::resource(
        json!({ "sha": file_sha }).to_string(),
        resource_contents(uri, mime, raw.bytes),
    ))
}

async fn list_commits(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new()
        .opt("sha", args.optional_string("sha")?)
        .opt("author", args.optional_string("author")?)
        .page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/commits", repo_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list commits")?;
    Ok(CallToolResult::json(&res.value))
}

async fn get_commit(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let sha: String = args.required("sha")?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(
            &format!("{}/commits/{}", repo_path(&owner, &repo), encode_path_segment(&sha)),
            q.as_slice(),
        )
        .await
        .or_api_error(&ctx, &format!("failed to get commit: {}", sha))?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_branches(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/branches", repo_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list branches")?;
    Ok(CallToolResult::json(&res.value))
}

async fn list_tags(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let q = Query::new().page(args.optional_pagination()?);
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/tags", repo_path(&owner, &repo)), q.as_slice())
        .await
        .or_api_error(&ctx, "failed to list tags")?;
    Ok(CallToolResult::json(&res.value))
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

async fn get_tag(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let tag: String = args.required("tag")?;
    let base = repo_path(&owner, &repo);
    let r = ctx
        .client
        .get_json::<GitRef>(&format!("{}/git/ref/tags/{}", base, encode_path(&tag)), &[])
        .await
        .or_api_error(&ctx, "failed to get tag reference")?;
    let res = ctx
        .client
        .get_json::<Value>(&format!("{}/git/tags/{}", base, r.value.object.sha), &[])
        .await
        .or_api_error(&ctx, "failed to get tag object")?;
    Ok(CallToolResult::json(&res.value))
}

async fn create_or_update_file(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let path: String = args.required("path")?;
    let content: String = args.required("content")?;
    let message: String = args.required("message")?;
    let branch: String = args.required("branch")?;
    let body = Body::new()
        .set("message", message)
        .set("content", base64::engine::general_purpose::STANDARD.encode(content))
        .set("branch", branch)
        .opt("sha", args.optional_string("sha")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::PUT, &contents_path(&owner, &repo, &path), Some(&body))
        .await
        .or_api_error(&ctx, "failed to create/update file")?;
    Ok(CallToolResult::json(&res.value))
}

async fn delete_file(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let path: String = args.required("path")?;
    let message: String = args.required("message")?;
    let branch: String = args.required("branch")?;
    let target = contents_path(&owner, &repo, &path);
    let existing = ctx
        .client
        .get_json::<Value>(&target, &[("ref", branch.clone())])
        .await
        .or_api_error(&ctx, "failed to get file to delete")?
        .value;
    let sha = existing["sha"]
        .as_str()
        .ok_or_else(|| ToolError::failed(format!("{} is not a file", path)))?;
    let body = Body::new()
        .set("message", message)
        .set("branch", branch)
        .set("sha", sha)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::DELETE, &target, Some(&body))
        .await
        .or_api_error(&ctx, "failed to delete file")?;
    Ok(CallToolResult::json(&res.value))
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    path: String,
    content: String,
}

fn parse_files(args: &Args) -> Result<Vec<FileEntry>, ParamError> {
    let raw: Vec<Value> = args.required("files")?;
    raw.into_iter()
        .map(|v| {
            serde_json::from_value::<FileEntry>(v)
                .map_err(|_| ParamError::invalid("files", "entries must be objects with path and content strings"))
        })
        .collect()
}

async fn push_files(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let branch: String = args.required("branch")?;
    let message: String = args.required("message")?;
    let files = parse_files(&args)?;
    let base = repo_path(&owner, &repo);
    let head_ref = format!("heads/{}", encode_path(&branch));

    let head = ctx
        .client
        .get_json::<GitRef>(&format!("{}/git/ref/{}", base, head_ref), &[])
        .await
        .or_api_error(&ctx, "failed to get branch reference")?
        .value
        .object
        .sha;

    #[derive(Deserialize)]
    struct Tree {
        sha: String,
    }
    #[derive(Deserialize)]
    struct Commit {
        sha: String,
        tree: Tree,
    }
    let parent = ctx
        .client
        .get_json::<Commit>(&format!("{}/git/commits/{}", base, head), &[])
        .await
        .or_api_error(&ctx, "failed to get base commit")?
        .value;

    let entries: Vec<Value> = files
        .iter()
        .map(|f| json!({"path": f.path, "mode": "100644", "type": "blob", "content": f.content}))
        .collect();
    let tree = ctx
        .client
        .send_json::<_, Tree>(
            Method::POST,
            &format!("{}/git/trees", base),
            Some(&json!({"base_tree": parent.tree.sha, "tree": entries})),
        )
        .await
        .or_api_error(&ctx, "failed to create tree")?
        .value;
    let commit = ctx
        .client
        .send_json::<_, Commit>(
            Method::POST,
            &format!("{}/git/commits", base),
            Some(&json!({"message": message, "tree": tree.sha, "parents": [parent.sha]})),
        )
        .await
        .or_api_error(&ctx, "failed to create commit")?
        .value;
    let updated = ctx
        .client
        .send_json::<_, Value>(
            Method::PATCH,
            &format!("{}/git/refs/{}", base, head_ref),
            Some(&json!({"sha": commit.sha, "force": false})),
        )
        .await
        .or_api_error(&ctx, "failed to update reference")?;
    Ok(CallToolResult::json(&updated.value))
}

async fn create_repository(ctx: RequestContext, args: Args) -> ToolResult {
    let name: String = args.required("name")?;
    let body = Body::new()
        .set("name", name)
        .opt("description", args.optional_string("description")?)
        .set("private", args.optional_bool("private")?)
        .set("auto_init", args.optional_bool("autoInit")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::POST, "/user/repos", Some(&body))
        .await
        .or_api_error(&ctx, "failed to create repository")?;
    Ok(CallToolResult::json(&res.value))
}

async fn fork_repository(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let body = Body::new()
        .opt("organization", args.optional_string("organization")?)
        .into_value();
    let res = ctx
        .client
        .send_json::<_, Value>(Method::POST, &format!("{}/forks", repo_path(&owner, &repo)), Some(&body))
        .await
        .or_api_error(&ctx, "failed to fork repository")?;
    Ok(CallToolResult::json(&res.value))
}

async fn create_branch(ctx: RequestContext, args: Args) -> ToolResult {
    let (owner, repo) = owner_repo(&args)?;
    let branch: String = args.required("branch")?;
    let base = repo_path(&owner, &repo);
    let from = match args.optional_string("from_branch")? {
        Some(b) => b,
        None => {
            #[derive(Deserialize)]
            struct Repo {
                default_branch: String,
            }
            ctx.client
                .get_json::<Repo>(&base, &[])
                .await
                .or_api_error(&ctx, "failed to get repository")?
                .value
                .default_branch
        }
    };
    let source = ctx
        .client
        .get_json::<GitRef>(&format!("{}/git/ref/heads/{}", base, encode_path(&from)), &[])
        .await
        .or_api_error(&ctx, "failed to get reference")?
        .value;
    let res = ctx
        .client
        .send_json::<_, Value>(
            Method::POST,
            &format!("{}/git/refs", base),
            Some(&json!({"ref": format!("refs/heads/{}", branch), "sha": source.object.sha})),
        )
        .await
        .or_api_error(&ctx, "failed to create branch")?;
    Ok(CallToolResult::json(&res.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_prefers_served_type_then_sniffs() {
        assert_eq!(detect_mime(Some("text/markdown"), b"# T"), "text/markdown");
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(detect_mime(Some("application/octet-stream"), &png), "image/png");
        assert_eq!(detect_mime(None, b"hello"), "text/plain");
        assert_eq!(detect_mime(None, &[0xc3, 0x28, 0xa0, 0xa1]), "application/octet-stream");
    }

    #[test]
    fn text_like_types_become_text_resources() {
        let r = resource_contents("u".into(), "application/json".into(), b"{}".to_vec());
        assert!(matches!(r, ResourceContents::Text { ref text, .. } if text == "{}"));
        let b = resource_contents("u".into(), "image/png".into(), vec![1, 2, 3]);
        assert!(matches!(b, ResourceContents::Blob { ref blob, .. } if blob == "AQID"));
    }

    #[test]
    fn file_entries_must_have_path_and_content() {
        let ok = Args::from_value(json!({"files": [{"path": "a", "content": "b"}]})).unwrap();
        assert_eq!(parse_files(&ok).unwrap()[0].path, "a");
        let bad = Args::from_value(json!({"files": [{"path": "a"}]})).unwrap();
        assert!(parse_files(&bad).is_err());
    }
}
