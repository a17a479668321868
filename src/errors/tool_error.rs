use crate::errors::UpstreamError;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParameter,
    UnknownTool,
    ToolExecution,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            tool: None,
            hint: None,
            details: None,
            retryable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches the tool name unless one is already recorded.
    pub fn with_tool(mut self, tool: &str) -> Self {
        if self.tool.is_none() {
            self.tool = Some(tool.to_string());
        }
        self
    }

    /// `field` names the offending parameter; `reason` says what is wrong with it.
    pub fn invalid_parameter(field: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ToolErrorKind::InvalidParameter,
            "INVALID_PARAMETER",
            format!("{}: {}", field, reason),
        )
        .with_details(serde_json::json!({ "field": field, "reason": reason }))
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(
            ToolErrorKind::UnknownTool,
            "UNKNOWN_TOOL",
            format!("Unknown tool: {}", name),
        )
    }

    pub fn execution(tool: &str, cause: &UpstreamError) -> Self {
        Self::from(cause.clone()).with_tool(tool)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }

    /// The `{errorKind, message, ...}` envelope returned across the protocol boundary.
    pub fn envelope(&self) -> Value {
        let mut out = serde_json::json!({
            "errorKind": self.kind,
            "code": self.code,
            "message": self.message,
            "retryable": self.retryable,
        });
        if let Value::Object(map) = &mut out {
            if let Some(tool) = &self.tool {
                map.insert("tool".to_string(), Value::String(tool.clone()));
            }
            if let Some(hint) = &self.hint {
                map.insert("hint".to_string(), Value::String(hint.clone()));
            }
            if let Some(details) = &self.details {
                map.insert("details".to_string(), details.clone());
            }
        }
        out
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tool {
            Some(tool) => write!(f, "{}: {}", tool, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for ToolError {}

impl From<UpstreamError> for ToolError {
    fn from(err: UpstreamError) -> Self {
        let details = match &err {
            UpstreamError::AuthRefresh { status, body } => {
                serde_json::json!({ "cause": "auth_refresh", "status": status, "body": body })
            }
            UpstreamError::Status { status, body } => {
                serde_json::json!({ "cause": "upstream", "status": status, "body": body })
            }
            UpstreamError::Timeout { timeout_ms } => {
                serde_json::json!({ "cause": "timeout", "timeout_ms": timeout_ms })
            }
            UpstreamError::Rejected { code, message } => {
                serde_json::json!({ "cause": "rejected", "upstream_code": code, "upstream_message": message })
            }
            UpstreamError::Transport(_) => serde_json::json!({ "cause": "transport" }),
            UpstreamError::Decode(_) => serde_json::json!({ "cause": "decode" }),
        };
        let hint = match &err {
            UpstreamError::AuthRefresh { .. } => {
                Some("Check CLIENT_ID, CLIENT_SECRET and REFRESH_TOKEN; the next call retries the exchange.")
            }
            UpstreamError::Status { status: 404, .. } => {
                Some("The referenced id or uri does not exist upstream.")
            }
            UpstreamError::Status { status: 401, .. } | UpstreamError::Status { status: 403, .. } => {
                Some("The credential lacks the scope required by this endpoint.")
            }
            _ => None,
        };
        let mut out = Self::new(ToolErrorKind::ToolExecution, err.code(), err.to_string())
            .with_details(details);
        out.retryable = err.is_retryable();
        if let Some(hint) = hint {
            out = out.with_hint(hint);
        }
        out
    }
}
