use crate::context::RequestContext;
use crate::mcp::{CallToolResult, ToolAnnotations, ToolDescriptor};
use crate::params::{Args, ParamError};
use crate::translations::Translator;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Why a tool call did not produce a normal result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Bad input. Reported to the caller as an `isError` result.
    #[error(transparent)]
    Params(#[from] ParamError),
    /// An already formatted failure, typically a recorded GitHub error.
    #[error("{}", .0.text_content())]
    Reported(CallToolResult),
    /// Unexpected; becomes a JSON-RPC internal error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Reported(CallToolResult::error(message))
    }

    /// Fold expected failures into a tool result; only internal errors remain.
    pub fn into_result(self) -> Result<CallToolResult, anyhow::Error> {
        match self {
            ToolError::Params(e) => Ok(CallToolResult::error(e.to_string())),
            ToolError::Reported(r) => Ok(r),
            ToolError::Internal(e) => Err(e),
        }
    }
}

pub type ToolResult = Result<CallToolResult, ToolError>;

pub type ToolHandler = Arc<dyn Fn(RequestContext, Args) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// Presentation grouping. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Users,
    Issues,
    PullRequests,
    Repositories,
    Search,
    CodeScanning,
    Actions,
    Dependabot,
    Discussions,
    Gists,
    Notifications,
    SecretProtection,
    SecurityAdvisories,
    Toolsets,
}

impl Category {
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Users => "Users",
            Category::Issues => "Issues",
            Category::PullRequests => "Pull Requests",
            Category::Repositories => "Repositories",
            Category::Search => "Search",
            Category::CodeScanning => "Code Scanning",
            Category::Actions => "Actions",
            Category::Dependabot => "Dependabot",
            Category::Discussions => "Discussions",
            Category::Gists => "Gists",
            Category::Notifications => "Notifications",
            Category::SecretProtection => "Secret Protection",
            Category::SecurityAdvisories => "Security Advisories",
            Category::Toolsets => "Toolsets",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
    pub category: Category,
    pub access: Access,
    handler: ToolHandler,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("access", &self.access)
            .finish()
    }
}

impl Tool {
    pub fn new<F, Fut>(name: &str, category: Category, access: Access, schema: Value, handler: F) -> Self
    where
        F: Fn(RequestContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            description: String::new(),
            input_schema: schema,
            annotations: ToolAnnotations {
                title: None,
                read_only_hint: Some(access == Access::Read),
                destructive_hint: None,
            },
            category,
            access,
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }

    /// Attach the user-facing title and description, both overridable through
    /// the translator.
    pub fn describe(mut self, t: &Translator, title: &str, description: &str) -> Self {
        let key = self.name.to_uppercase();
        self.description = t.translate(&format!("TOOL_{}_DESCRIPTION", key), description);
        self.annotations.title = Some(t.translate(&format!("TOOL_{}_USER_TITLE", key), title));
        self
    }

    pub fn destructive(mut self) -> Self {
        self.annotations.destructive_hint = Some(true);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::Read
    }

    pub fn call(&self, ctx: RequestContext, args: Args) -> BoxFuture<'static, ToolResult> {
        (self.handler)(ctx, args)
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

pub fn read_only(tools: &[Tool]) -> Vec<Tool> {
    tools.iter().filter(|t| t.is_read_only()).cloned().collect()
}

/// Group by category in display order; tools within a group sorted by name.
pub fn by_category(tools: &[Tool]) -> Vec<(Category, Vec<Tool>)> {
    let mut sorted: Vec<Tool> = tools.to_vec();
    sorted.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    let mut groups: Vec<(Category, Vec<Tool>)> = Vec::new();
    for tool in sorted {
        match groups.last_mut() {
            Some((cat, items)) if *cat == tool.category => items.push(tool),
            _ => groups.push((tool.category, vec![tool])),
        }
    }
    groups
}

/// JSON type of one input property.
#[derive(Debug, Clone)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    StringArray,
    /// Array whose items follow the given schema.
    Array(Value),
    Enum(&'static [&'static str]),
}

impl ParamType {
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Array(items) => json!({"type": "array", "items": items}),
            ParamType::Enum(values) => json!({"type": "string", "enum": values}),
        }
    }
}

/// Builder for a tool's input schema. Required names can only be added
/// together with their property.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    fn property(mut self, name: &str, ty: ParamType, description: &str, required: bool) -> Self {
        let mut prop = ty.schema();
        if let Value::Object(m) = &mut prop {
            m.insert("description".into(), Value::String(description.to_string()));
        }
        self.properties.insert(name.to_string(), prop);
        if required && !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.property(name, ty, description, true)
    }

    pub fn optional(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.property(name, ty, description, false)
    }

    pub fn owner_repo(self) -> Self {
        self.required("owner", ParamType::String, "Repository owner")
            .required("repo", ParamType::String, "Repository name")
    }

    pub fn pagination(self) -> Self {
        self.optional("page", ParamType::Number, "Page number for pagination (min 1)")
            .optional(
                "perPage",
                ParamType::Number,
                "Results per page for pagination (min 1, max 100)",
            )
    }

    pub fn build(self) -> Value {
        let mut schema = json!({
            "type": "object",
            "properties": self.properties,
        });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_: RequestContext, _: Args) -> ToolResult {
        Ok(CallToolResult::text("ok"))
    }

    fn tool(name: &str, category: Category, access: Access) -> Tool {
        Tool::new(name, category, access, Schema::new().build(), noop)
    }

    #[test]
    fn category_order_puts_core_groups_first() {
        let mut all = vec![
            Category::Gists,
            Category::Search,
            Category::Users,
            Category::Actions,
            Category::CodeScanning,
            Category::Issues,
        ];
        all.sort();
        assert_eq!(
            all,
            vec![
                Category::Users,
                Category::Issues,
                Category::Search,
                Category::CodeScanning,
                Category::Actions,
                Category::Gists,
            ]
        );
    }

    #[test]
    fn by_category_sorts_groups_and_names() {
        let tools = vec![
            tool("list_issues", Category::Issues, Access::Read),
            tool("get_me", Category::Users, Access::Read),
            tool("add_issue_comment", Category::Issues, Access::Write),
        ];
        let groups = by_category(&tools);
        assert_eq!(groups[0].0, Category::Users);
        let names: Vec<_> = groups[1].1.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["add_issue_comment", "list_issues"]);
    }

    #[test]
    fn read_only_view_drops_writes() {
        let tools = vec![
            tool("a", Category::Issues, Access::Read),
            tool("b", Category::Issues, Access::Write),
        ];
        let ro = read_only(&tools);
        assert_eq!(ro.len(), 1);
        assert_eq!(ro[0].name, "a");
        assert_eq!(ro[0].annotations.read_only_hint, Some(true));
    }

    #[test]
    fn schema_required_is_subset_of_properties() {
        let s = Schema::new()
            .owner_repo()
            .optional("state", ParamType::Enum(&["open", "closed"]), "State")
            .pagination()
            .build();
        let props = s["properties"].as_object().unwrap();
        for r in s["required"].as_array().unwrap() {
            assert!(props.contains_key(r.as_str().unwrap()));
        }
        assert_eq!(s["properties"]["state"]["enum"][1], "closed");
        assert!(Schema::new().build().get("required").is_none());
    }

    #[test]
    fn describe_uses_translation_keys() {
        let t = Translator::with_overrides([(
            "TOOL_GET_ME_DESCRIPTION".to_string(),
            "custom".to_string(),
        )]);
        let tl = tool("get_me", Category::Users, Access::Read).describe(&t, "Me", "default");
        assert_eq!(tl.description, "custom");
        assert_eq!(tl.annotations.title.as_deref(), Some("Me"));
    }

    #[test]
    fn tool_errors_fold_into_results() {
        let r = ToolError::from(ParamError::Missing("owner".into()))
            .into_result()
            .unwrap();
        assert!(r.is_error);
        assert_eq!(r.text_content(), "missing required parameter: owner");
        assert!(ToolError::Internal(anyhow::anyhow!("x")).into_result().is_err());
    }
}
