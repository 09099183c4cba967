use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter: {0}")]
    Missing(String),
    #[error("parameter {name} is not of type {expected}")]
    WrongType { name: String, expected: &'static str },
    #[error("parameter {name} {reason}")]
    Invalid { name: String, reason: String },
}

impl ParamError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ParamError::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A Rust type a JSON argument can be coerced into.
pub trait ArgType: Sized {
    const TYPE_NAME: &'static str;
    fn from_json(v: &Value) -> Option<Self>;
    fn is_zero(&self) -> bool;
}

impl ArgType for String {
    const TYPE_NAME: &'static str = "string";
    fn from_json(v: &Value) -> Option<Self> {
        v.as_str().map(str::to_string)
    }
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl ArgType for f64 {
    const TYPE_NAME: &'static str = "number";
    fn from_json(v: &Value) -> Option<Self> {
        v.as_f64()
    }
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl ArgType for bool {
    const TYPE_NAME: &'static str = "boolean";
    fn from_json(v: &Value) -> Option<Self> {
        v.as_bool()
    }
    fn is_zero(&self) -> bool {
        !*self
    }
}

impl ArgType for Vec<Value> {
    const TYPE_NAME: &'static str = "array";
    fn from_json(v: &Value) -> Option<Self> {
        v.as_array().cloned()
    }
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl ArgType for Map<String, Value> {
    const TYPE_NAME: &'static str = "object";
    fn from_json(v: &Value) -> Option<Self> {
        v.as_object().cloned()
    }
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// Arguments of one tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl From<Map<String, Value>> for Args {
    fn from(m: Map<String, Value>) -> Self {
        Args(m)
    }
}

impl Args {
    /// Accepts the `arguments` member of a call; anything but an object (or null)
    /// is rejected.
    pub fn from_value(v: Value) -> Result<Self, ParamError> {
        match v {
            Value::Object(m) => Ok(Args(m)),
            Value::Null => Ok(Args::default()),
            _ => Err(ParamError::WrongType {
                name: "arguments".into(),
                expected: "object",
            }),
        }
    }

    fn present(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn has(&self, name: &str) -> bool {
        self.present(name).is_some()
    }

    pub fn required<T: ArgType>(&self, name: &str) -> Result<T, ParamError> {
        let v = self
            .present(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))?;
        let t = T::from_json(v).ok_or_else(|| ParamError::WrongType {
            name: name.to_string(),
            expected: T::TYPE_NAME,
        })?;
        if t.is_zero() {
            return Err(ParamError::Missing(name.to_string()));
        }
        Ok(t)
    }

    pub fn optional<T: ArgType>(&self, name: &str) -> Result<Option<T>, ParamError> {
        match self.present(name) {
            None => Ok(None),
            Some(v) => T::from_json(v).map(Some).ok_or_else(|| ParamError::WrongType {
                name: name.to_string(),
                expected: T::TYPE_NAME,
            }),
        }
    }

    /// Optional string that treats `""` like an absent value.
    pub fn optional_string(&self, name: &str) -> Result<Option<String>, ParamError> {
        Ok(self.optional::<String>(name)?.filter(|s| !s.is_empty()))
    }

    pub fn optional_bool(&self, name: &str) -> Result<bool, ParamError> {
        Ok(self.optional::<bool>(name)?.unwrap_or(false))
    }

    /// Required integer. JSON numbers arrive as doubles and are truncated; the
    /// value must fit an `i64` and must not be zero.
    pub fn required_int(&self, name: &str) -> Result<i64, ParamError> {
        let n = self.required::<f64>(name)?;
        to_int(name, n)
    }

    pub fn optional_int(&self, name: &str) -> Result<Option<i64>, ParamError> {
        match self.optional::<f64>(name)? {
            None => Ok(None),
            Some(n) => to_int(name, n).map(Some),
        }
    }

    pub fn optional_int_or(&self, name: &str, default: i64) -> Result<i64, ParamError> {
        Ok(self.optional_int(name)?.unwrap_or(default))
    }

    /// Optional array of strings. Mixed arrays are accepted as long as every
    /// element is a string, number or boolean.
    pub fn optional_string_array(&self, name: &str) -> Result<Vec<String>, ParamError> {
        let Some(v) = self.present(name) else {
            return Ok(Vec::new());
        };
        let items = v.as_array().ok_or_else(|| ParamError::WrongType {
            name: name.to_string(),
            expected: "array",
        })?;
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => Err(ParamError::WrongType {
                    name: name.to_string(),
                    expected: "array of strings",
                }),
            })
            .collect()
    }

    /// `page` and `perPage` with defaults 1 and 30.
    pub fn optional_pagination(&self) -> Result<Pagination, ParamError> {
        self.pagination_with_keys("page", "perPage")
    }

    /// Pagination for tools whose documented schema spells the size `per_page`.
    pub fn pagination_with_keys(
        &self,
        page_key: &str,
        per_page_key: &str,
    ) -> Result<Pagination, ParamError> {
        let page = self.optional_int_or(page_key, 1)?;
        let per_page = self.optional_int_or(per_page_key, Pagination::DEFAULT_PER_PAGE as i64)?;
        if page < 1 {
            return Err(ParamError::invalid(page_key, "must be at least 1"));
        }
        if !(1..=Pagination::MAX_PER_PAGE as i64).contains(&per_page) {
            return Err(ParamError::invalid(per_page_key, "must be between 1 and 100"));
        }
        Ok(Pagination {
            page: page as u32,
            per_page: per_page as u32,
        })
    }
}

fn to_int(name: &str, n: f64) -> Result<i64, ParamError> {
    if !n.is_finite() || n < i64::MIN as f64 || n > i64::MAX as f64 {
        return Err(ParamError::invalid(name, "is out of range"));
    }
    Ok(n.trunc() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: u32 = 30;
    pub const MAX_PER_PAGE: u32 = 100;

    /// REST query parameters.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> Args {
        Args::from_value(v).unwrap()
    }

    #[test]
    fn required_rejects_missing_wrong_type_and_zero() {
        let a = args(json!({"owner": "o", "empty": "", "num": 3, "flag": false}));
        assert_eq!(a.required::<String>("owner").unwrap(), "o");
        assert_eq!(
            a.required::<String>("repo").unwrap_err(),
            ParamError::Missing("repo".into())
        );
        assert_eq!(
            a.required::<String>("empty").unwrap_err().to_string(),
            "missing required parameter: empty"
        );
        assert!(matches!(
            a.required::<String>("num").unwrap_err(),
            ParamError::WrongType { expected: "string", .. }
        ));
        assert!(a.required::<bool>("flag").is_err());
    }

    #[test]
    fn optional_returns_none_when_absent_and_errors_on_mismatch() {
        let a = args(json!({"state": "open", "n": "x", "nothing": null}));
        assert_eq!(a.optional::<String>("state").unwrap().as_deref(), Some("open"));
        assert_eq!(a.optional::<String>("missing").unwrap(), None);
        assert_eq!(a.optional::<String>("nothing").unwrap(), None);
        assert!(a.optional::<f64>("n").is_err());
    }

    #[test]
    fn required_int_truncates() {
        let a = args(json!({"number": 42.9, "zero": 0, "huge": 1e300}));
        assert_eq!(a.required_int("number").unwrap(), 42);
        assert!(matches!(a.required_int("zero"), Err(ParamError::Missing(_))));
        assert!(matches!(a.required_int("huge"), Err(ParamError::Invalid { .. })));
    }

    #[test]
    fn string_arrays_accept_mixed_scalars() {
        let a = args(json!({
            "labels": ["bug", "ui"],
            "mixed": ["a", 1, true],
            "bad": ["a", {"x": 1}],
            "notarray": "a"
        }));
        assert_eq!(a.optional_string_array("labels").unwrap(), vec!["bug", "ui"]);
        assert_eq!(
            a.optional_string_array("mixed").unwrap(),
            vec!["a", "1", "true"]
        );
        assert!(a.optional_string_array("bad").is_err());
        assert!(a.optional_string_array("notarray").is_err());
        assert!(a.optional_string_array("absent").unwrap().is_empty());
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(args(json!({})).optional_pagination().unwrap(), Pagination::default());
        let p = args(json!({"page": 3, "perPage": 100})).optional_pagination().unwrap();
        assert_eq!((p.page, p.per_page), (3, 100));
        assert!(args(json!({"perPage": 101})).optional_pagination().is_err());
        assert!(args(json!({"perPage": 0})).optional_pagination().is_err());
        assert!(args(json!({"page": 0})).optional_pagination().is_err());
        let p = args(json!({"per_page": 5}))
            .pagination_with_keys("page", "per_page")
            .unwrap();
        assert_eq!(p.per_page, 5);
    }

    #[test]
    fn arguments_must_be_an_object() {
        assert!(Args::from_value(json!([1])).is_err());
        assert_eq!(Args::from_value(Value::Null).unwrap(), Args::default());
    }
}
