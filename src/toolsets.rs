use crate::tools::Tool;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::RwLock;
use thiserror::Error;

pub const ALL: &str = "all";
pub const DYNAMIC: &str = "dynamic";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolsetError {
    #[error("toolset {0} does not exist")]
    Unknown(String),
}

/// A named bundle of tools enabled together.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub name: &'static str,
    pub description: String,
    pub tools: Vec<Tool>,
}

impl Toolset {
    pub fn new(name: &'static str, description: impl Into<String>, tools: Vec<Tool>) -> Self {
        Self {
            name,
            description: description.into(),
            tools,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolsetInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "currently_enabled")]
    pub enabled: bool,
}

/// Every known toolset plus the set currently enabled. Built at startup; only
/// the enabled set changes afterwards (dynamic mode).
#[derive(Debug)]
pub struct ToolsetGroup {
    toolsets: Vec<Toolset>,
    enabled: RwLock<BTreeSet<&'static str>>,
    read_only: bool,
}

impl ToolsetGroup {
    pub fn new(toolsets: Vec<Toolset>, read_only: bool) -> Self {
        Self {
            toolsets,
            enabled: RwLock::new(BTreeSet::new()),
            read_only,
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    fn lookup(&self, name: &str) -> Result<&Toolset, ToolsetError> {
        self.toolsets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ToolsetError::Unknown(name.to_string()))
    }

    /// Enable one toolset by name (`all` enables every one). Returns whether
    /// anything changed.
    pub fn enable(&self, name: &str) -> Result<bool, ToolsetError> {
        let name = name.trim();
        let names: Vec<&'static str> = if name == ALL {
            self.toolsets.iter().map(|t| t.name).collect()
        } else {
            vec![self.lookup(name)?.name]
        };
        let mut enabled = self.enabled.write().unwrap_or_else(|p| p.into_inner());
        let mut changed = false;
        for n in names {
            changed |= enabled.insert(n);
        }
        Ok(changed)
    }

    pub fn enable_all<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ToolsetError> {
        for n in names {
            self.enable(n.as_ref())?;
        }
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(name)
    }

    fn visible<'a>(&self, ts: &'a Toolset) -> impl Iterator<Item = &'a Tool> + 'a {
        let read_only = self.read_only;
        ts.tools.iter().filter(move |t| !read_only || t.is_read_only())
    }

    /// Tools of every enabled toolset, honoring read-only mode.
    pub fn active_tools(&self) -> Vec<Tool> {
        self.toolsets
            .iter()
            .filter(|ts| self.is_enabled(ts.name))
            .flat_map(|ts| self.visible(ts))
            .cloned()
            .collect()
    }

    pub fn find_tool(&self, name: &str) -> Option<Tool> {
        self.toolsets
            .iter()
            .filter(|ts| self.is_enabled(ts.name))
            .flat_map(|ts| self.visible(ts))
            .find(|t| t.name == name)
            .cloned()
    }

    /// Toolsets a caller may enable, i.e. everything except the dynamic one.
    pub fn list(&self) -> Vec<ToolsetInfo> {
        self.toolsets
            .iter()
            .filter(|ts| ts.name != DYNAMIC)
            .map(|ts| ToolsetInfo {
                name: ts.name.to_string(),
                description: ts.description.clone(),
                enabled: self.is_enabled(ts.name),
            })
            .collect()
    }

    pub fn toolset_tools(&self, name: &str) -> Result<Vec<Tool>, ToolsetError> {
        let ts = self.lookup(name)?;
        Ok(self.visible(ts).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::mcp::CallToolResult;
    use crate::params::Args;
    use crate::tools::{Access, Category, Schema, ToolResult};

    async fn noop(_: RequestContext, _: Args) -> ToolResult {
        Ok(CallToolResult::text(""))
    }

    fn group(read_only: bool) -> ToolsetGroup {
        let t = |n: &str, a| Tool::new(n, Category::Issues, a, Schema::new().build(), noop);
        ToolsetGroup::new(
            vec![
                Toolset::new("issues", "Issues", vec![t("get_issue", Access::Read), t("create_issue", Access::Write)]),
                Toolset::new("gists", "Gists", vec![t("list_gists", Access::Read)]),
                Toolset::new(DYNAMIC, "Discovery", vec![t("enable_toolset", Access::Read)]),
            ],
            read_only,
        )
    }

    #[test]
    fn unknown_toolset_is_an_error() {
        let g = group(false);
        assert_eq!(
            g.enable("nope").unwrap_err(),
            ToolsetError::Unknown("nope".into())
        );
    }

    #[test]
    fn all_enables_everything() {
        let g = group(false);
        g.enable_all(&["all"]).unwrap();
        assert_eq!(g.active_tools().len(), 4);
        assert!(!g.enable("gists").unwrap());
    }

    #[test]
    fn read_only_hides_write_tools() {
        let g = group(true);
        g.enable("issues").unwrap();
        let names: Vec<_> = g.active_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["get_issue"]);
        assert!(g.find_tool("create_issue").is_none());
    }

    #[test]
    fn list_excludes_dynamic_and_reports_state() {
        let g = group(false);
        g.enable("gists").unwrap();
        let l = g.list();
        assert_eq!(l.len(), 2);
        assert!(l.iter().any(|i| i.name == "gists" && i.enabled));
        assert!(l.iter().any(|i| i.name == "issues" && !i.enabled));
    }
}
