use crate::context::RequestContext;
use crate::github::repositories::contents_path;
use crate::github::{repo_path, Query};
use crate::http::GitHubError;
use crate::mcp::Completion;
use serde::Deserialize;
use serde_json::{Map, Value};

const URI_PREFIX: &str = "repo://";

/// `params` of a `completion/complete` request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteParams {
    #[serde(rename = "ref")]
    pub reference: CompletionRef,
    pub argument: CompletionArgument,
    #[serde(default)]
    pub context: Option<CompletionContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionArgument {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Values the client has already filled in for other template variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionContext {
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Owner and repository taken from a concrete (or partly concrete) resource URI,
/// falling back to the request's context arguments.
#[derive(Debug, Default, PartialEq, Eq)]
struct Target {
    owner: Option<String>,
    repo: Option<String>,
}

fn concrete(segment: Option<&str>) -> Option<String> {
    segment
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .map(str::to_string)
}

fn target(uri: &str, context: Option<&CompletionContext>) -> Target {
    let mut segments = uri.strip_prefix(URI_PREFIX).unwrap_or("").split('/');
    let from_context = |key: &str| {
        context
            .and_then(|c| c.arguments.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let owner = concrete(segments.next()).or_else(|| from_context("owner"));
    let repo = concrete(segments.next()).or_else(|| from_context("repo"));
    Target { owner, repo }
}

/// Revision named by a resource URI, if it carries one.
fn ref_from_uri(uri: &str) -> Option<String> {
    let after = |marker: &str| -> Option<String> {
        let idx = uri.find(marker)?;
        concrete(uri[idx + marker.len()..].split('/').next())
    };
    if let Some(branch) = after("/refs/heads/") {
        return Some(format!("refs/heads/{}", branch));
    }
    if let Some(tag) = after("/refs/tags/") {
        return Some(format!("refs/tags/{}", tag));
    }
    if let Some(pr) = after("/refs/pull/") {
        return Some(format!("refs/pull/{}/head", pr));
    }
    after("/sha/")
}

fn starts_with_ci(candidate: &str, prefix: &str) -> bool {
    candidate.to_lowercase().starts_with(&prefix.to_lowercase())
}

fn finish(values: Vec<String>, page_full: bool) -> Completion {
    Completion {
        total: values.len(),
        values,
        has_more: page_full,
    }
}

/// Complete `params.argument` for a resource template. Anything that is not a
/// `repo://` resource, or an argument this module does not know, completes to
/// nothing.
pub async fn complete(ctx: &RequestContext, params: &CompleteParams) -> Result<Completion, GitHubError> {
    if params.reference.kind != "ref/resource" {
        return Ok(Completion::empty());
    }
    let uri = params.reference.uri.as_deref().unwrap_or_default();
    if !uri.starts_with(URI_PREFIX) {
        return Ok(Completion::empty());
    }
    let value = params.argument.value.as_str();
    let t = target(uri, params.context.as_ref());
    match params.argument.name.as_str() {
        "owner" => complete_owner(ctx, value).await,
        "repo" => match t.owner {
            Some(owner) => complete_repo(ctx, &owner, value).await,
            None => Ok(Completion::empty()),
        },
        name @ ("branch" | "sha" | "tag" | "pr_number" | "path") => {
            let (Some(owner), Some(repo)) = (t.owner, t.repo) else {
                return Ok(Completion::empty());
            };
            match name {
                "branch" => complete_named(ctx, &owner, &repo, "branches", 30, value).await,
                "tag" => complete_named(ctx, &owner, &repo, "tags", 30, value).await,
                "sha" => complete_sha(ctx, &owner, &repo, value).await,
                "pr_number" => complete_pr_number(ctx, &owner, &repo, value).await,
                _ => complete_path(ctx, &owner, &repo, ref_from_uri(uri), value).await,
            }
        }
        _ => Ok(Completion::empty()),
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

async fn complete_owner(ctx: &RequestContext, value: &str) -> Result<Completion, GitHubError> {
    if value.is_empty() {
        return Ok(Completion::empty());
    }
    let q = Query::new()
        .set("q", format!("{} in:login", value))
        .set("page", 1)
        .set("per_page", 10);
    let res = ctx
        .client
        .get_json::<SearchPage<Login>>("/search/users", q.as_slice())
        .await?;
    let full = res.value.items.len() == 10;
    let values = res
        .value
        .items
        .into_iter()
        .map(|u| u.login)
        .filter(|l| starts_with_ci(l, value))
        .collect();
    Ok(finish(values, full))
}

async fn complete_repo(ctx: &RequestContext, owner: &str, value: &str) -> Result<Completion, GitHubError> {
    let query = if value.is_empty() {
        format!("user:{}", owner)
    } else {
        format!("user:{} {} in:name", owner, value)
    };
    let q = Query::new().set("q", query).set("page", 1).set("per_page", 10);
    let res = ctx
        .client
        .get_json::<SearchPage<Named>>("/search/repositories", q.as_slice())
        .await?;
    let full = res.value.items.len() == 10;
    let values = res
        .value
        .items
        .into_iter()
        .map(|r| r.name)
        .filter(|n| starts_with_ci(n, value))
        .collect();
    Ok(finish(values, full))
}

async fn complete_named(
    ctx: &RequestContext,
    owner: &str,
    repo: &str,
    collection: &str,
    per_page: usize,
    value: &str,
) -> Result<Completion, GitHubError> {
    let q = Query::new().set("page", 1).set("per_page", per_page);
    let res = ctx
        .client
        .get_json::<Vec<Named>>(&format!("{}/{}", repo_path(owner, repo), collection), q.as_slice())
        .await?;
    let full = res.value.len() == per_page;
    let values = res
        .value
        .into_iter()
        .map(|b| b.name)
        .filter(|n| starts_with_ci(n, value))
        .collect();
    Ok(finish(values, full))
}

async fn complete_sha(ctx: &RequestContext, owner: &str, repo: &str, value: &str) -> Result<Completion, GitHubError> {
    if value.len() < 3 {
        return Ok(Completion::empty());
    }
    #[derive(Deserialize)]
    struct Commit {
        sha: String,
    }
    let q = Query::new().set("page", 1).set("per_page", 10);
    let res = ctx
        .client
        .get_json::<Vec<Commit>>(&format!("{}/commits", repo_path(owner, repo)), q.as_slice())
        .await?;
    let full = res.value.len() == 10;
    let values = res
        .value
        .into_iter()
        .map(|c| c.sha)
        .filter(|s| starts_with_ci(s, value))
        .collect();
    Ok(finish(values, full))
}

async fn complete_pr_number(
    ctx: &RequestContext,
    owner: &str,
    repo: &str,
    value: &str,
) -> Result<Completion, GitHubError> {
    #[derive(Deserialize)]
    struct Pull {
        number: u64,
    }
    let q = Query::new()
        .set("state", "all")
        .set("page", 1)
        .set("per_page", 20);
    let res = ctx
        .client
        .get_json::<Vec<Pull>>(&format!("{}/pulls", repo_path(owner, repo)), q.as_slice())
        .await?;
    let full = res.value.len() == 20;
    let values = res
        .value
        .into_iter()
        .map(|p| p.number.to_string())
        .filter(|n| n.starts_with(value))
        .collect();
    Ok(finish(values, full))
}

async fn complete_path(
    ctx: &RequestContext,
    owner: &str,
    repo: &str,
    git_ref: Option<String>,
    value: &str,
) -> Result<Completion, GitHubError> {
    let (dir, prefix) = match value.rfind('/') {
        Some(i) => (&value[..i], &value[i + 1..]),
        None => ("", value),
    };
    #[derive(Deserialize)]
    struct Entry {
        name: String,
        #[serde(rename = "type")]
        kind: String,
    }
    let q = Query::new().opt("ref", git_ref);
    let res = ctx
        .client
        .get_json::<Value>(&contents_path(owner, repo, dir), q.as_slice())
        .await?;
    // A file path yields an object rather than a listing.
    let entries: Vec<Entry> = match res.value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    };
    let values = entries
        .into_iter()
        .filter(|e| starts_with_ci(&e.name, prefix))
        .map(|e| {
            let mut full = if dir.is_empty() {
                e.name
            } else {
                format!("{}/{}", dir, e.name)
            };
            if e.kind == "dir" {
                full.push('/');
            }
            full
        })
        .collect();
    Ok(finish(values, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_skips_placeholders_and_uses_context() {
        assert_eq!(
            target("repo://octo/hello/contents", None),
            Target {
                owner: Some("octo".into()),
                repo: Some("hello".into())
            }
        );
        assert_eq!(target("repo://{owner}/{repo}/contents{/path*}", None), Target::default());
        let ctx: CompletionContext =
            serde_json::from_value(json!({"arguments": {"owner": "o", "repo": "r"}})).unwrap();
        assert_eq!(
            target("repo://{owner}/{repo}/contents{/path*}", Some(&ctx)),
            Target {
                owner: Some("o".into()),
                repo: Some("r".into())
            }
        );
    }

    #[test]
    fn refs_are_read_from_uris() {
        assert_eq!(
            ref_from_uri("repo://o/r/refs/heads/main/contents/src"),
            Some("refs/heads/main".into())
        );
        assert_eq!(ref_from_uri("repo://o/r/refs/tags/v1.0/contents"), Some("refs/tags/v1.0".into()));
        assert_eq!(ref_from_uri("repo://o/r/refs/pull/12/head/contents"), Some("refs/pull/12/head".into()));
        assert_eq!(ref_from_uri("repo://o/r/sha/abc123/contents"), Some("abc123".into()));
        assert_eq!(ref_from_uri("repo://o/r/refs/heads/{branch}/contents"), None);
        assert_eq!(ref_from_uri("repo://o/r/contents"), None);
    }

    #[test]
    fn params_parse_from_the_wire() {
        let p: CompleteParams = serde_json::from_value(json!({
            "ref": {"type": "ref/resource", "uri": "repo://o/r/contents{/path*}"},
            "argument": {"name": "path", "value": "src/"}
        }))
        .unwrap();
        assert_eq!(p.reference.kind, "ref/resource");
        assert_eq!(p.argument.value, "src/");
        assert!(p.context.is_none());
    }
}
