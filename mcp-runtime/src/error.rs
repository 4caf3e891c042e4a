use std::fmt;

use serde_json::{Value, json};
use slide_core::error::{codes, tool_codes};

/// Protocol-level failure, surfaced as the `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::with_code(codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_code(codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::with_code(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Tool-surface rejections share the method-not-found code.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_code(codes::METHOD_NOT_FOUND, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(codes::INTERNAL_ERROR, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(data) = &self.data {
            payload["data"] = data.clone();
        }
        payload
    }
}

/// In-band tool failure. Rendered to the client as `Error: <message>` with `isError: true`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn missing(field: &str) -> Self {
        Self::new(tool_codes::MISSING_ARGUMENT, format!("{field} is required")).with_field(field)
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::new(tool_codes::INVALID_ARGUMENT, message).with_field(field)
    }

    pub fn unknown_operation(operation: &str) -> Self {
        Self::new(
            tool_codes::UNKNOWN_OPERATION,
            format!("unknown operation: {operation}"),
        )
        .with_field("operation")
    }

    pub fn missing_operation() -> Self {
        Self::new(
            tool_codes::MISSING_ARGUMENT,
            "operation parameter is required",
        )
        .with_field("operation")
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_value_omits_absent_data() {
        let value = RpcError::invalid_params("Tool name required").to_value();
        assert_eq!(value["code"], -32602);
        assert_eq!(value["message"], "Tool name required");
        assert!(value.get("data").is_none());

        let value = RpcError::internal("boom")
            .with_data(json!({"detail": 1}))
            .to_value();
        assert_eq!(value["data"]["detail"], 1);
    }

    #[test]
    fn tool_error_messages_name_the_argument() {
        assert_eq!(ToolError::missing("agent_id").to_string(), "agent_id is required");
        assert_eq!(
            ToolError::unknown_operation("nope").to_string(),
            "unknown operation: nope"
        );
    }
}
