pub mod actions;
pub mod code_scanning;
pub mod dependabot;
pub mod discussions;
pub mod dynamic;
pub mod gists;
pub mod issues;
pub mod models;
pub mod notifications;
pub mod pullrequest_reviews;
pub mod pullrequests;
pub mod repositories;
pub mod search;
pub mod secret_scanning;
pub mod security_advisories;
pub mod users;

use crate::config::Config;
use crate::context::RequestContext;
use crate::http::encode_path_segment;
use crate::params::{Args, ParamError};
use crate::toolsets::{Toolset, ToolsetError, ToolsetGroup, ALL, DYNAMIC};
use crate::translations::Translator;
use log::info;
use serde_json::{Map, Value};
use std::sync::Arc;

pub fn default_toolsets(t: &Translator) -> Vec<Toolset> {
    vec![
        Toolset::new("context", "Information about the current user and session", users::context_tools(t)),
        Toolset::new("repos", "Repository files, branches, commits and search", repositories::tools(t)),
        Toolset::new("issues", "Issues and issue comments", issues::tools(t)),
        Toolset::new("users", "GitHub user search", users::tools(t)),
        Toolset::new(
            "pull_requests",
            "Pull requests and reviews",
            [pullrequests::tools(t), pullrequest_reviews::tools(t)].concat(),
        ),
        Toolset::new("code_security", "Code scanning alerts", code_scanning::tools(t)),
        Toolset::new("secret_protection", "Secret scanning alerts", secret_scanning::tools(t)),
        Toolset::new("dependabot", "Dependabot alerts", dependabot::tools(t)),
        Toolset::new("notifications", "GitHub notifications", notifications::tools(t)),
        Toolset::new("discussions", "GitHub Discussions", discussions::tools(t)),
        Toolset::new("gists", "GitHub Gists", gists::tools(t)),
        Toolset::new("security_advisories", "Security advisories", security_advisories::tools(t)),
        Toolset::new("actions", "GitHub Actions workflows and runs", actions::tools(t)),
    ]
}

/// Assemble every toolset and enable the configured ones. In dynamic mode only
/// the discovery toolset (plus any explicitly named ones) starts enabled.
pub fn build_toolset_group(t: &Translator, cfg: &Config) -> Result<Arc<ToolsetGroup>, ToolsetError> {
    let mut sets = default_toolsets(t);
    if cfg.dynamic_toolsets {
        sets.push(Toolset::new(
            DYNAMIC,
            "Discover and enable toolsets at runtime",
            dynamic::tools(t),
        ));
    }
    let group = ToolsetGroup::new(sets, cfg.read_only);
    if cfg.dynamic_toolsets {
        group.enable(DYNAMIC)?;
        for name in cfg.toolsets.iter().filter(|n| n.as_str() != ALL) {
            group.enable(name)?;
        }
    } else {
        group.enable_all(&cfg.toolsets)?;
    }
    info!(
        "registered {} tools (read_only={}, dynamic={})",
        group.active_tools().len(),
        cfg.read_only,
        cfg.dynamic_toolsets
    );
    Ok(Arc::new(group))
}

pub(crate) fn repo_path(owner: &str, repo: &str) -> String {
    format!(
        "/repos/{}/{}",
        encode_path_segment(owner),
        encode_path_segment(repo)
    )
}

pub(crate) fn owner_repo(args: &Args) -> Result<(String, String), ParamError> {
    Ok((args.required("owner")?, args.required("repo")?))
}

/// Whether content by `author` may be shown in this request.
pub(crate) async fn trusted(ctx: &RequestContext, author: Option<&str>) -> bool {
    match (&ctx.content_filter, author) {
        (None, _) => true,
        (Some(f), _) if !f.enabled() => true,
        (Some(_), Some(login)) => ctx.should_include(login).await,
        (Some(_), None) => false,
    }
}

/// REST query string under construction.
#[derive(Debug, Default)]
pub(crate) struct Query(Vec<(&'static str, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    pub fn opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn page(mut self, p: crate::params::Pagination) -> Self {
        self.0.extend(p.query());
        self
    }

    pub fn as_slice(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

/// JSON request body with only the fields the caller supplied.
#[derive(Debug, Default)]
pub(crate) struct Body(Map<String, Value>);

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn opt<T: Into<Value>>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn non_empty(self, key: &str, values: Vec<String>) -> Self {
        if values.is_empty() {
            self
        } else {
            self.set(key, values)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use std::collections::HashSet;

    fn translator() -> Translator {
        Translator::with_overrides(Vec::new())
    }

    #[test]
    fn tool_names_are_unique_and_described() {
        let mut seen = HashSet::new();
        let mut sets = default_toolsets(&translator());
        sets.push(Toolset::new(DYNAMIC, "d", dynamic::tools(&translator())));
        for tool in sets.iter().flat_map(|s| s.tools.iter()) {
            assert!(seen.insert(tool.name.clone()), "duplicate tool {}", tool.name);
            assert!(!tool.description.is_empty(), "{} has no description", tool.name);
        }
    }

    #[test]
    fn every_schema_requires_only_declared_properties() {
        let all: Vec<Tool> = default_toolsets(&translator())
            .into_iter()
            .flat_map(|s| s.tools)
            .collect();
        for tool in all {
            let props = tool.input_schema["properties"].as_object().cloned().unwrap_or_default();
            if let Some(req) = tool.input_schema.get("required").and_then(Value::as_array) {
                for r in req {
                    let name = r.as_str().unwrap();
                    assert!(props.contains_key(name), "{} requires undeclared {}", tool.name, name);
                }
            }
        }
    }

    #[test]
    fn dynamic_mode_starts_with_discovery_only() {
        let cfg = Config {
            dynamic_toolsets: true,
            ..Config::default()
        };
        let group = build_toolset_group(&translator(), &cfg).unwrap();
        let names: Vec<String> = group.active_tools().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&"enable_toolset".to_string()));
        assert!(!names.contains(&"get_me".to_string()));
    }

    #[test]
    fn unknown_configured_toolset_fails() {
        let cfg = Config {
            toolsets: vec!["nope".into()],
            ..Config::default()
        };
        assert!(build_toolset_group(&translator(), &cfg).is_err());
    }

    #[test]
    fn read_only_registration_has_no_write_tools() {
        let cfg = Config {
            read_only: true,
            ..Config::default()
        };
        let group = build_toolset_group(&translator(), &cfg).unwrap();
        assert!(group.active_tools().iter().all(|t| t.is_read_only()));
        assert!(group.find_tool("create_issue").is_none());
        assert!(group.find_tool("get_issue").is_some());
    }
}
