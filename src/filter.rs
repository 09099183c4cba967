//! Drops text authored by users without push access to the trusted repository.

use crate::context::RequestContext;
use crate::github::models::{Authored, Comment, Issue, PullRequest, Review};
use crate::http::GitHubError;
use crate::sanitize::{sanitize, SanitizeConfig};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("trusted repository must be in owner/name form, got {0:?}")]
    InvalidRepo(String),
    #[error("failed to initialize content filter: {0}")]
    Query(#[from] GitHubError),
}

const PUSH_PERMISSIONS: [&str; 3] = ["WRITE", "ADMIN", "MAINTAIN"];

#[derive(Debug)]
pub struct ContentFilter {
    enabled: bool,
    trusted_repo: String,
    owner: String,
    repo: String,
    is_private: bool,
    authenticated_user: String,
    // Keyed by lowercased login.
    trusted_users: RwLock<HashMap<String, bool>>,
}

impl ContentFilter {
    pub fn new(trusted_repo: &str, is_private: bool, authenticated_user: &str) -> Result<Self, FilterError> {
        let (owner, repo) = parse_repo(trusted_repo)?;
        let mut seed = HashMap::new();
        if !authenticated_user.is_empty() {
            seed.insert(authenticated_user.to_lowercase(), true);
        }
        Ok(Self {
            enabled: true,
            trusted_repo: trusted_repo.to_string(),
            owner,
            repo,
            is_private,
            authenticated_user: authenticated_user.to_string(),
            trusted_users: RwLock::new(seed),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn trusted_repo(&self) -> &str {
        &self.trusted_repo
    }

    fn cached(&self, key: &str) -> Option<bool> {
        let guard = self.trusted_users.read().unwrap_or_else(|p| p.into_inner());
        guard.get(key).copied()
    }

    fn remember(&self, key: String, trusted: bool) {
        let mut guard = self.trusted_users.write().unwrap_or_else(|p| p.into_inner());
        guard.insert(key, trusted);
    }

    /// Whether text authored by `username` may be shown.
    pub async fn should_include(&self, ctx: &RequestContext, username: &str) -> bool {
        if !self.enabled || self.is_private {
            return true;
        }
        if username.eq_ignore_ascii_case(&self.authenticated_user) {
            return true;
        }
        let key = username.to_lowercase();
        if let Some(trusted) = self.cached(&key) {
            return trusted;
        }
        match self.has_push_access(ctx, username).await {
            Ok(trusted) => {
                self.remember(key, trusted);
                trusted
            }
            Err(e) => {
                warn!("permission lookup for {} failed, hiding content: {}", username, e);
                false
            }
        }
    }

    async fn has_push_access(&self, ctx: &RequestContext, username: &str) -> Result<bool, GitHubError> {
        #[derive(Deserialize)]
        struct Edge {
            permission: String,
            node: Node,
        }
        #[derive(Deserialize)]
        struct Node {
            login: String,
        }
        #[derive(Deserialize)]
        struct Collaborators {
            #[serde(default)]
            edges: Vec<Edge>,
        }
        #[derive(Deserialize)]
        struct Repo {
            collaborators: Option<Collaborators>,
        }
        #[derive(Deserialize)]
        struct Data {
            repository: Option<Repo>,
        }
        let query = r#"
        query Collaborator($owner: String!, $name: String!, $user: String!) {
          repository(owner: $owner, name: $name) {
            collaborators(query: $user, first: 1) {
              edges { permission node { login } }
            }
          }
        }
        "#;
        let vars = json!({ "owner": self.owner, "name": self.repo, "user": username });
        let data: Data = ctx.client.graphql(query, &vars).await?;
        let trusted = data
            .repository
            .and_then(|r| r.collaborators)
            .map(|c| {
                c.edges.iter().any(|e| {
                    e.node.login.eq_ignore_ascii_case(username)
                        && PUSH_PERMISSIONS.contains(&e.permission.as_str())
                })
            })
            .unwrap_or(false);
        debug!("collaborator {} trusted={}", username, trusted);
        Ok(trusted)
    }
}

fn parse_repo(s: &str) -> Result<(String, String), FilterError> {
    match s.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(FilterError::InvalidRepo(s.to_string())),
    }
}

/// Look up the trusted repository's visibility and the viewer, and return a
/// context carrying the resulting filter. An empty `trusted_repo` leaves the
/// context unfiltered.
pub async fn init_filter(ctx: RequestContext, trusted_repo: &str) -> Result<RequestContext, FilterError> {
    let trusted_repo = trusted_repo.trim();
    if trusted_repo.is_empty() {
        return Ok(ctx);
    }
    let (owner, repo) = parse_repo(trusted_repo)?;

    #[derive(Deserialize)]
    struct Repo {
        #[serde(rename = "isPrivate")]
        is_private: bool,
    }
    #[derive(Deserialize)]
    struct Viewer {
        login: String,
    }
    #[derive(Deserialize)]
    struct Data {
        repository: Option<Repo>,
        viewer: Viewer,
    }
    let query = r#"
    query FilterInit($owner: String!, $name: String!) {
      repository(owner: $owner, name: $name) { isPrivate }
      viewer { login }
    }
    "#;
    let data: Data = ctx
        .client
        .graphql(query, &json!({ "owner": owner, "name": repo }))
        .await?;
    let is_private = data.repository.map(|r| r.is_private).unwrap_or(false);
    let filter = ContentFilter::new(trusted_repo, is_private, &data.viewer.login)?;
    debug!(
        "content filter on {} (private={}, viewer={})",
        trusted_repo, is_private, data.viewer.login
    );
    Ok(ctx.with_content_filter(Arc::new(filter)))
}

impl RequestContext {
    pub async fn should_include(&self, username: &str) -> bool {
        match &self.content_filter {
            Some(f) => f.should_include(self, username).await,
            None => true,
        }
    }

    /// Drop items whose author is not trusted. Items with no author are dropped
    /// only when filtering is active.
    pub async fn retain_trusted<T: Authored>(&self, items: Vec<T>) -> Vec<T> {
        let active = self.content_filter.as_ref().is_some_and(|f| f.enabled());
        if !active {
            return items;
        }
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let include = match item.author() {
                Some(login) => self.should_include(login).await,
                None => false,
            };
            if include {
                kept.push(item);
            }
        }
        kept
    }
}

fn clean(text: &Option<String>, cfg: &SanitizeConfig) -> Option<String> {
    text.as_deref().map(|t| sanitize(t, cfg))
}

pub fn filter_issue(issue: &Issue, cfg: &SanitizeConfig) -> Issue {
    Issue {
        title: clean(&issue.title, cfg),
        body: clean(&issue.body, cfg),
        ..issue.clone()
    }
}

pub fn filter_pull_request(pr: &PullRequest, cfg: &SanitizeConfig) -> PullRequest {
    PullRequest {
        title: clean(&pr.title, cfg),
        body: clean(&pr.body, cfg),
        ..pr.clone()
    }
}

pub fn filter_issue_comment(comment: &Comment, cfg: &SanitizeConfig) -> Comment {
    Comment {
        body: clean(&comment.body, cfg),
        ..comment.clone()
    }
}

pub fn filter_pull_request_review(review: &Review, cfg: &SanitizeConfig) -> Review {
    Review {
        body: clean(&review.body, cfg),
        ..review.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::models::User;

    #[test]
    fn parses_owner_and_name() {
        assert_eq!(
            parse_repo("octo/hello").unwrap(),
            ("octo".to_string(), "hello".to_string())
        );
        assert!(parse_repo("octo").is_err());
        assert!(parse_repo("/x").is_err());
        assert!(parse_repo("a/b/c").is_err());
    }

    #[test]
    fn viewer_is_seeded_as_trusted() {
        let f = ContentFilter::new("o/r", false, "Me").unwrap();
        assert_eq!(f.cached("me"), Some(true));
        assert!(f.enabled());
        assert_eq!(f.trusted_repo(), "o/r");
    }

    #[test]
    fn helpers_do_not_mutate_input() {
        let issue = Issue {
            title: Some("a\u{200B}b".into()),
            body: Some("<!-- hi -->x".into()),
            user: Some(User {
                login: "u".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = filter_issue(&issue, &SanitizeConfig::default());
        assert_eq!(out.title.as_deref(), Some("ab"));
        assert_eq!(out.body.as_deref(), Some("[HTML_COMMENT]x"));
        assert_eq!(issue.body.as_deref(), Some("<!-- hi -->x"));
        assert_eq!(out.user, issue.user);
    }

    #[test]
    fn review_and_comment_bodies_are_sanitized() {
        let cfg = SanitizeConfig::default();
        let c = Comment {
            body: Some("<script>x</script>ok".into()),
            ..Default::default()
        };
        assert_eq!(
            filter_issue_comment(&c, &cfg).body.as_deref(),
            Some("[HTML_ELEMENT]ok")
        );
        let r = Review::default();
        assert_eq!(filter_pull_request_review(&r, &cfg).body, None);
        let pr = PullRequest {
            title: Some("t".into()),
            ..Default::default()
        };
        assert_eq!(filter_pull_request(&pr, &cfg).title.as_deref(), Some("t"));
    }
}
