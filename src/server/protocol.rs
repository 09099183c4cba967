use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request id: string, number or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{:?}", s),
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }

    pub fn parse_error(msg: &str) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {}", msg))
    }

    pub fn invalid_request(msg: &str) -> Self {
        Self::new(Self::INVALID_REQUEST, format!("Invalid request: {}", msg))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(msg: &str) -> Self {
        Self::new(Self::INVALID_PARAMS, format!("Invalid params: {}", msg))
    }

    pub fn internal_error(msg: &str) -> Self {
        Self::new(Self::INTERNAL_ERROR, format!("Internal error: {}", msg))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_result(id: RequestId, result: Result<Value, JsonRpcError>) -> Self {
        match result {
            Ok(v) => Self::success(id, v),
            Err(e) => Self::error(id, e),
        }
    }
}

/// A request (has an id) or a notification (has none).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Value,
}

/// One decoded input line.
#[derive(Debug)]
pub enum Incoming {
    Message(Request),
    /// Parsed as JSON but not as a JSON-RPC message; the id is kept when present.
    Invalid(RequestId, String),
    /// Not JSON at all.
    Malformed(String),
}

impl Incoming {
    pub fn decode(line: &str) -> Self {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Incoming::Malformed(e.to_string()),
        };
        let Value::Object(mut obj) = value else {
            return Incoming::Invalid(RequestId::Null, "message must be an object".into());
        };
        let id = match obj.remove("id") {
            None => None,
            Some(raw) => match serde_json::from_value::<RequestId>(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    return Incoming::Invalid(RequestId::Null, "id must be a string or number".into())
                }
            },
        };
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Incoming::Invalid(id.unwrap_or(RequestId::Null), "jsonrpc must be \"2.0\"".into());
        }
        let method = match obj.remove("method") {
            Some(Value::String(m)) => m,
            _ => return Incoming::Invalid(id.unwrap_or(RequestId::Null), "method is required".into()),
        };
        let params = obj.remove("params").unwrap_or(Value::Null);
        Incoming::Message(Request { id, method, params })
    }
}

/// `params` of `notifications/cancelled`.
#[derive(Debug, Deserialize)]
pub struct CancelledParams {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `params` of `tools/call`.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `params` of `resources/read`.
#[derive(Debug, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
    pub resources: ResourcesCapability,
    pub completions: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    pub subscribe: bool,
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_requests_and_notifications() {
        match Incoming::decode(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#) {
            Incoming::Message(r) => {
                assert_eq!(r.id, Some(RequestId::Number(7)));
                assert_eq!(r.method, "tools/list");
                assert_eq!(r.params, Value::Null);
            }
            other => panic!("unexpected {:?}", other),
        }
        match Incoming::decode(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#) {
            Incoming::Message(r) => assert!(r.id.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_envelopes() {
        assert!(matches!(Incoming::decode("{not json"), Incoming::Malformed(_)));
        assert!(matches!(Incoming::decode("[1,2]"), Incoming::Invalid(RequestId::Null, _)));
        match Incoming::decode(r#"{"jsonrpc":"2.0","id":"a"}"#) {
            Incoming::Invalid(id, msg) => {
                assert_eq!(id, RequestId::String("a".into()));
                assert!(msg.contains("method"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn responses_keep_ids_and_codes() {
        let ok = serde_json::to_value(JsonRpcResponse::success(RequestId::String("x".into()), json!({}))).unwrap();
        assert_eq!(ok["id"], "x");
        assert!(ok.get("error").is_none());
        let err = serde_json::to_value(JsonRpcResponse::error(
            RequestId::Null,
            JsonRpcError::parse_error("eof"),
        ))
        .unwrap();
        assert_eq!(err["error"]["code"], -32700);
        assert_eq!(err["id"], Value::Null);
    }
}
