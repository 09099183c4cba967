use crate::tools::{by_category, Tool};
use serde_json::Value;

/// Render `tools` as Markdown. The output depends only on the set of tools, not
/// on their order.
pub fn convert(tools: &[Tool]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut sections = Vec::new();
    for (category, items) in by_category(tools) {
        let entries: Vec<String> = items.iter().map(render_tool).collect();
        sections.push(format!("### {}\n\n{}", category, entries.join("\n\n")));
    }
    format!("## Tools\n\n{}\n", sections.join("\n\n"))
}

fn render_tool(tool: &Tool) -> String {
    let mut lines = vec![format!("- **{}** - {}", tool.name, tool.description)];
    let props = tool.input_schema.get("properties").and_then(Value::as_object);
    let required: Vec<&str> = tool
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    match props {
        Some(props) if !props.is_empty() => {
            let mut names: Vec<&String> = props.keys().collect();
            names.sort();
            for name in names {
                let prop = &props[name.as_str()];
                let description = prop.get("description").and_then(Value::as_str).unwrap_or("");
                let need = if required.contains(&name.as_str()) {
                    "required"
                } else {
                    "optional"
                };
                lines.push(format!(
                    "  - `{}`: {} ({}, {})",
                    name,
                    description,
                    type_label(prop),
                    need
                ));
            }
        }
        _ => lines.push("  - No parameters required".to_string()),
    }
    lines.join("\n")
}

fn type_label(prop: &Value) -> String {
    let ty = prop.get("type").and_then(Value::as_str).unwrap_or("any");
    if ty == "array" {
        if let Some(item) = prop.pointer("/items/type").and_then(Value::as_str) {
            return format!("{}[]", item);
        }
    }
    ty.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::mcp::CallToolResult;
    use crate::params::Args;
    use crate::tools::{Access, Category, ParamType, Schema, ToolResult};

    async fn noop(_: RequestContext, _: Args) -> ToolResult {
        Ok(CallToolResult::text(""))
    }

    fn tool(name: &str, category: Category, schema: Value) -> Tool {
        let mut t = Tool::new(name, category, Access::Read, schema, noop);
        t.description = format!("{} tool", name);
        t
    }

    #[test]
    fn empty_set_renders_nothing() {
        assert_eq!(convert(&[]), "");
    }

    #[test]
    fn categories_then_names_with_parameters() {
        let tools = vec![
            tool(
                "list_issues",
                Category::Issues,
                Schema::new()
                    .required("owner", ParamType::String, "Repository owner")
                    .optional("labels", ParamType::StringArray, "Labels")
                    .build(),
            ),
            tool("get_me", Category::Users, Schema::new().build()),
            tool("get_issue", Category::Issues, Schema::new().build()),
        ];
        let md = convert(&tools);
        let expected = "## Tools\n\n\
### Users\n\n\
- **get_me** - get_me tool\n  - No parameters required\n\n\
### Issues\n\n\
- **get_issue** - get_issue tool\n  - No parameters required\n\n\
- **list_issues** - list_issues tool\n  - `labels`: Labels (string[], optional)\n  - `owner`: Repository owner (string, required)\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let a = tool("a", Category::Gists, Schema::new().build());
        let b = tool("b", Category::Actions, Schema::new().build());
        assert_eq!(convert(&[a.clone(), b.clone()]), convert(&[b, a]));
    }
}
