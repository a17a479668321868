use crate::errors::{ErrorCode, McpError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.code.as_i32(),
                message: error.message,
            }),
        }
    }
}

/// Parses one JSON-RPC message, or returns the error response to send back.
pub fn parse_request(raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|_| {
        JsonRpcResponse::failure(Value::Null, McpError::new(ErrorCode::ParseError, "Parse error"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|_| {
        JsonRpcResponse::failure(
            id.clone(),
            McpError::new(ErrorCode::InvalidRequest, "Invalid request"),
        )
    })?;
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcResponse::failure(
            id,
            McpError::new(ErrorCode::InvalidRequest, "Invalid request: jsonrpc must be \"2.0\""),
        ));
    }
    Ok(request)
}

/// Stable map key for a request id (`1` and `"1"` stay distinct).
pub fn request_key(id: &Value) -> String {
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_have_no_id() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#;
        let parsed = parse_request(raw).expect("must parse");
        assert!(parsed.is_notification());
        assert_eq!(parsed.method, "notifications/initialized");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_request("{not json").unwrap_err();
        assert_eq!(err.error.unwrap().code, -32700);
        assert_eq!(err.id, Value::Null);
    }

    #[test]
    fn missing_method_is_an_invalid_request() {
        let err = parse_request(r#"{"jsonrpc":"2.0","id":4}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, -32600);
        assert_eq!(err.id, serde_json::json!(4));
    }

    #[test]
    fn wrong_version_is_an_invalid_request() {
        let err = parse_request(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, -32600);
    }

    #[test]
    fn request_keys_distinguish_number_and_string_ids() {
        assert_ne!(
            request_key(&serde_json::json!(1)),
            request_key(&serde_json::json!("1"))
        );
    }
}
