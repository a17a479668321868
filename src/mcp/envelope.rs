use crate::errors::ToolError;
use serde_json::{json, Value};

fn text_content(value: &Value) -> Value {
    let text = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
    json!([{ "type": "text", "text": text }])
}

/// `tools/call` result for a normalized tool output.
pub fn tool_success(result: &Value) -> Value {
    json!({
        "content": text_content(result),
        "structuredContent": result,
        "isError": false,
    })
}

/// `tools/call` result for a failed call. Tool failures are results, not
/// JSON-RPC errors, so the agent can read and act on them.
pub fn tool_failure(error: &ToolError) -> Value {
    let envelope = error.envelope();
    json!({
        "content": text_content(&envelope),
        "structuredContent": envelope,
        "isError": true,
    })
}
