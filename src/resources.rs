use crate::context::RequestContext;
use crate::github::repositories::{detect_mime, resource_contents};
use crate::http::{GitHubError, RawRef};
use crate::mcp::{ResourceContents, ResourceTemplateDescriptor};
use crate::translations::Translator;
use crate::uritemplate::{Binding, Bindings, TemplateError, UriTemplate};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("no resource template matches {0}")]
    Unknown(String),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid pull request number: {0}")]
    InvalidPullNumber(String),
    #[error("directories are not supported: {0}")]
    Directory(String),
    #[error("failed to get pull request: {0}")]
    PullRequest(#[source] GitHubError),
    #[error("failed to get raw content: {0}")]
    Raw(#[source] GitHubError),
}

impl ResourceError {
    /// Whether the caller sent something unusable, as opposed to GitHub failing.
    pub fn is_invalid_request(&self) -> bool {
        !matches!(self, ResourceError::PullRequest(_) | ResourceError::Raw(_))
    }
}

/// How a template names the revision to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    DefaultBranch,
    Branch,
    Tag,
    Sha,
    PullRequest,
}

#[derive(Debug, Clone)]
pub struct RepoResource {
    template: UriTemplate,
    kind: RefKind,
    name: String,
    description: String,
}

impl RepoResource {
    pub fn descriptor(&self) -> ResourceTemplateDescriptor {
        ResourceTemplateDescriptor {
            uri_template: self.template.as_str().to_string(),
            name: self.name.clone(),
            description: Some(self.description.clone()),
        }
    }
}

/// The five repository content templates, most specific first.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    resources: Vec<RepoResource>,
}

impl ResourceCatalog {
    pub fn new(t: &Translator) -> Result<Self, TemplateError> {
        let defs = [
            (
                "repo://{owner}/{repo}/refs/heads/{branch}/contents{/path*}",
                RefKind::Branch,
                "branch_content",
                "Repository Content for specific branch",
            ),
            (
                "repo://{owner}/{repo}/refs/tags/{tag}/contents{/path*}",
                RefKind::Tag,
                "tag_content",
                "Repository Content for specific tag",
            ),
            (
                "repo://{owner}/{repo}/refs/pull/{pr_number}/head/contents{/path*}",
                RefKind::PullRequest,
                "pr_content",
                "Repository Content for specific pull request",
            ),
            (
                "repo://{owner}/{repo}/sha/{sha}/contents{/path*}",
                RefKind::Sha,
                "commit_content",
                "Repository Content for specific commit",
            ),
            (
                "repo://{owner}/{repo}/contents{/path*}",
                RefKind::DefaultBranch,
                "content",
                "Repository Content",
            ),
        ];
        let mut resources = Vec::with_capacity(defs.len());
        for (raw, kind, key, default) in defs {
            let description = t.translate(
                &format!("RESOURCE_REPOSITORY_{}_DESCRIPTION", key.to_uppercase()),
                default,
            );
            resources.push(RepoResource {
                template: UriTemplate::parse(raw)?,
                kind,
                name: default.to_string(),
                description,
            });
        }
        Ok(Self { resources })
    }

    pub fn descriptors(&self) -> Vec<ResourceTemplateDescriptor> {
        self.resources.iter().map(RepoResource::descriptor).collect()
    }

    fn resolve(&self, uri: &str) -> Option<(&RepoResource, Bindings)> {
        self.resources
            .iter()
            .find_map(|r| r.template.matches(uri).map(|b| (r, b)))
    }

    /// Read one file named by a `repo://` URI.
    pub async fn read(&self, ctx: &RequestContext, uri: &str) -> Result<Vec<ResourceContents>, ResourceError> {
        let (resource, bindings) = self
            .resolve(uri)
            .ok_or_else(|| ResourceError::Unknown(uri.to_string()))?;
        let owner = scalar(&bindings, "owner").ok_or(ResourceError::Missing("owner"))?;
        let repo = scalar(&bindings, "repo").ok_or(ResourceError::Missing("repo"))?;
        let path = bindings.get("path").map(Binding::joined).unwrap_or_default();
        if path.is_empty() || path.ends_with('/') {
            return Err(ResourceError::Directory(path));
        }

        let raw_ref = match resource.kind {
            RefKind::DefaultBranch => RawRef::Head,
            RefKind::Branch => RawRef::Ref(format!(
                "refs/heads/{}",
                scalar(&bindings, "branch").ok_or(ResourceError::Missing("branch"))?
            )),
            RefKind::Tag => RawRef::Ref(format!(
                "refs/tags/{}",
                scalar(&bindings, "tag").ok_or(ResourceError::Missing("tag"))?
            )),
            RefKind::Sha => RawRef::Sha(scalar(&bindings, "sha").ok_or(ResourceError::Missing("sha"))?),
            RefKind::PullRequest => {
                let raw = scalar(&bindings, "pr_number").ok_or(ResourceError::Missing("pr_number"))?;
                let number: u64 = raw
                    .parse()
                    .map_err(|_| ResourceError::InvalidPullNumber(raw.clone()))?;
                RawRef::Sha(pull_head_sha(ctx, &owner, &repo, number).await?)
            }
        };

        let raw = ctx
            .client
            .raw_content(&owner, &repo, &path, &raw_ref)
            .await
            .map_err(ResourceError::Raw)?;
        let mime = detect_mime(raw.content_type.as_deref(), &raw.bytes);
        debug!("resources/read {} -> {} ({} bytes)", uri, mime, raw.bytes.len());
        Ok(vec![resource_contents(uri.to_string(), mime, raw.bytes)])
    }
}

fn scalar(b: &Bindings, name: &str) -> Option<String> {
    match b.get(name)? {
        Binding::Scalar(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

async fn pull_head_sha(ctx: &RequestContext, owner: &str, repo: &str, number: u64) -> Result<String, ResourceError> {
    #[derive(Deserialize)]
    struct Head {
        sha: String,
    }
    #[derive(Deserialize)]
    struct Pull {
        head: Head,
    }
    let res = ctx
        .client
        .get_json::<Pull>(
            &format!("{}/pulls/{}", crate::github::repo_path(owner, repo), number),
            &[],
        )
        .await
        .map_err(ResourceError::PullRequest)?;
    Ok(res.value.head.sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ResourceCatalog {
        ResourceCatalog::new(&Translator::with_overrides(Vec::new())).unwrap()
    }

    #[test]
    fn five_templates_with_names() {
        let d = catalog().descriptors();
        assert_eq!(d.len(), 5);
        assert!(d
            .iter()
            .any(|t| t.uri_template == "repo://{owner}/{repo}/sha/{sha}/contents{/path*}"));
        assert!(d.iter().all(|t| t.description.is_some()));
    }

    #[test]
    fn uris_resolve_to_the_right_kind() {
        let c = catalog();
        let kind = |uri: &str| c.resolve(uri).map(|(r, _)| r.kind);
        assert_eq!(kind("repo://o/r/contents/README.md"), Some(RefKind::DefaultBranch));
        assert_eq!(kind("repo://o/r/refs/heads/dev/contents/a.rs"), Some(RefKind::Branch));
        assert_eq!(kind("repo://o/r/refs/tags/v1/contents/a.rs"), Some(RefKind::Tag));
        assert_eq!(kind("repo://o/r/refs/pull/7/head/contents/a.rs"), Some(RefKind::PullRequest));
        assert_eq!(kind("repo://o/r/sha/abc123/contents/a.rs"), Some(RefKind::Sha));
        assert_eq!(kind("https://o/r/contents/a.rs"), None);
    }
}
