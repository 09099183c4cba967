use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed '{{' at offset {0}")]
    Unclosed(usize),
    #[error("empty variable name at offset {0}")]
    EmptyName(usize),
    #[error("unsupported expression {{{0}}}")]
    Unsupported(String),
    #[error("path expansion {{/{0}*}} must end the template")]
    TailNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var(String),
    Tail(String),
}

/// A bound variable: one segment, or the list of segments a tail matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Scalar(String),
    List(Vec<String>),
}

impl Binding {
    /// The value as a single string; lists are joined with `/`.
    pub fn joined(&self) -> String {
        match self {
            Binding::Scalar(s) => s.clone(),
            Binding::List(items) => items.join("/"),
        }
    }
}

pub type Bindings = HashMap<String, Binding>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;
        let mut offset = 0;
        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or(TemplateError::Unclosed(offset + open))?;
            let expr = &after[..close];
            if let Some(Part::Tail(name)) = parts.last() {
                return Err(TemplateError::TailNotLast(name.clone()));
            }
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(parse_expr(expr, offset + open)?);
            let consumed = open + 1 + close + 1;
            rest = &rest[consumed..];
            offset += consumed;
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            if let Some(Part::Tail(name)) = parts.last() {
                return Err(TemplateError::TailNotLast(name.clone()));
            }
            parts.push(Part::Literal(literal));
        }
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Variable names in template order.
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Var(n) | Part::Tail(n) => Some(n.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Bind `uri` against the template. Segment values are percent-decoded.
    pub fn matches(&self, uri: &str) -> Option<Bindings> {
        let mut bindings = Bindings::new();
        let mut rest = uri;
        for (i, part) in self.parts.iter().enumerate() {
            match part {
                Part::Literal(lit) => rest = rest.strip_prefix(lit.as_str())?,
                Part::Var(name) => {
                    let end = match self.parts.get(i + 1) {
                        Some(Part::Literal(next)) => {
                            let stop = rest.find('/').unwrap_or(rest.len());
                            let seg = &rest[..stop];
                            if next.starts_with('/') {
                                stop
                            } else {
                                seg.find(next.as_str())?
                            }
                        }
                        _ => rest.find('/').unwrap_or(rest.len()),
                    };
                    if end == 0 {
                        return None;
                    }
                    bindings.insert(name.clone(), Binding::Scalar(decode(&rest[..end])));
                    rest = &rest[end..];
                }
                Part::Tail(name) => {
                    let segments = match rest {
                        "" => Vec::new(),
                        r => r.strip_prefix('/')?.split('/').map(decode).collect(),
                    };
                    bindings.insert(name.clone(), Binding::List(segments));
                    rest = "";
                }
            }
        }
        rest.is_empty().then_some(bindings)
    }
}

fn parse_expr(expr: &str, offset: usize) -> Result<Part, TemplateError> {
    if expr.is_empty() {
        return Err(TemplateError::EmptyName(offset));
    }
    if let Some(tail) = expr.strip_prefix('/') {
        let name = tail
            .strip_suffix('*')
            .ok_or_else(|| TemplateError::Unsupported(expr.to_string()))?;
        if name.is_empty() {
            return Err(TemplateError::EmptyName(offset));
        }
        return Ok(Part::Tail(name.to_string()));
    }
    if !expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::Unsupported(expr.to_string()));
    }
    Ok(Part::Var(expr.to_string()))
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(b: &Bindings, k: &str) -> String {
        match &b[k] {
            Binding::Scalar(s) => s.clone(),
            other => panic!("{} is not scalar: {:?}", k, other),
        }
    }

    #[test]
    fn binds_segments_and_tail() {
        let t = UriTemplate::parse("repo://{owner}/{repo}/refs/heads/{branch}/contents{/path*}").unwrap();
        assert_eq!(t.variables(), vec!["owner", "repo", "branch", "path"]);
        let b = t.matches("repo://octo/hello/refs/heads/main/contents/src/lib.rs").unwrap();
        assert_eq!(scalar(&b, "owner"), "octo");
        assert_eq!(scalar(&b, "branch"), "main");
        assert_eq!(b["path"], Binding::List(vec!["src".into(), "lib.rs".into()]));
        assert_eq!(b["path"].joined(), "src/lib.rs");
    }

    #[test]
    fn empty_tail_binds_empty_list() {
        let t = UriTemplate::parse("repo://{owner}/{repo}/contents{/path*}").unwrap();
        let b = t.matches("repo://o/r/contents").unwrap();
        assert_eq!(b["path"], Binding::List(vec![]));
    }

    #[test]
    fn literal_mismatch_fails() {
        let t = UriTemplate::parse("repo://{owner}/{repo}/contents{/path*}").unwrap();
        assert!(t.matches("repo://o/r/sha/abc/contents/x").is_none());
        assert!(t.matches("file://o/r/contents").is_none());
        assert!(t.matches("repo:///r/contents").is_none());
    }

    #[test]
    fn values_are_percent_decoded() {
        let t = UriTemplate::parse("repo://{owner}/{repo}/contents{/path*}").unwrap();
        let b = t.matches("repo://o/r/contents/docs/read%20me.md").unwrap();
        assert_eq!(b["path"].joined(), "docs/read me.md");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(UriTemplate::parse("repo://{owner"), Err(TemplateError::Unclosed(7)));
        assert!(matches!(UriTemplate::parse("a{}b"), Err(TemplateError::EmptyName(_))));
        assert!(matches!(UriTemplate::parse("a{?q}"), Err(TemplateError::Unsupported(_))));
        assert!(matches!(
            UriTemplate::parse("a{/p*}/b"),
            Err(TemplateError::TailNotLast(_))
        ));
    }
}
