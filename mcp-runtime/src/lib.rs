//! JSON-RPC front-end for the Slide tool catalog.
//!
//! [`McpServer`] decodes one message at a time, tells requests from
//! notifications, admits each `tools/call` through the tools-mode policy and
//! dispatches it to the registry. Transports own framing: see [`stdio`] here and
//! the HTTP+SSE transport in the `slide-mcp-http` crate.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use slide_core::ServerConfig;
use slide_core::config::{SERVER_NAME, SERVER_VERSION};
use slide_core::policy::{admit_operation, admit_tool};

pub mod args;
pub mod context;
pub mod enrich;
pub mod error;
pub mod registry;
pub mod rest;
pub mod stdio;
pub mod tools;
pub mod util;

pub use context::ToolContext;
pub use error::{RpcError, ToolError};

use registry::Registry;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone)]
pub struct McpServer {
    ctx: ToolContext,
    registry: Arc<Registry>,
}

impl McpServer {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self::with_context(ToolContext::new(config))
    }

    pub fn with_context(ctx: ToolContext) -> Self {
        Self {
            ctx,
            registry: Arc::new(tools::catalog()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.ctx.config
    }

    /// Handles a single message or a batch. Notifications contribute nothing
    /// to the returned list.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    pub async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        // Without an `id` nothing is ever written back, even for a broken envelope.
        let Some(id) = obj.get("id").cloned() else {
            match obj.get("method").and_then(Value::as_str) {
                Some(method) => self.handle_notification(method),
                None => tracing::debug!(event = "mcp_message_ignored", reason = "no id or method"),
            }
            return None;
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id,
                RpcError::invalid_request("method is required"),
            ));
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        Some(match self.handle_request(method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                tracing::info!(event = "mcp_client_initialized");
            }
            "notifications/cancelled" => {
                tracing::info!(event = "mcp_request_cancelled");
            }
            other => {
                tracing::info!(event = "mcp_unknown_notification", method = %other);
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload().await),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn initialize_payload(&self) -> Value {
        let hierarchy = match tools::meta::hierarchy_view(&self.ctx).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(event = "initial_context_failed", error = %e);
                json!({
                    "error": format!("Failed to fetch initial context: {e}"),
                    "note": format!(
                        "Initial context will be available via the {} tool",
                        tools::meta::HIERARCHY
                    ),
                })
            }
        };
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "initialContext": {
                "clients_devices_agents": hierarchy,
                "_metadata": {
                    "description": "Initial overview of all clients, devices, and agents loaded at startup for improved performance",
                    "source_tool": tools::meta::HIERARCHY,
                    "usage_note": format!(
                        "This data is also available via the {} tool and should be refreshed if needed",
                        tools::meta::HIERARCHY
                    ),
                    "timestamp": Utc::now().timestamp().to_string()
                }
            }
        })
    }

    fn tools_list_payload(&self) -> Value {
        let config = self.config();
        let tools: Vec<Value> = self
            .registry
            .iter()
            .filter(|tool| admit_tool(config, tool.name).is_ok())
            .map(|tool| tool.to_listing(config))
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("Invalid params"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("Tool name required"))?;

        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| RpcError::unavailable(format!("Unknown tool: {name}")))?;

        let config = self.config();
        admit_tool(config, name).map_err(|denial| RpcError::unavailable(denial.message()))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let operation = match tool.fixed_operation() {
            Some(fixed) => fixed.to_string(),
            None => match args.get("operation").and_then(Value::as_str) {
                Some(op) if !op.is_empty() => op.to_string(),
                _ => return Ok(tool_call_result(Err(ToolError::missing_operation()))),
            },
        };

        admit_operation(config, name, &operation)
            .map_err(|denial| RpcError::unavailable(denial.message()))?;

        let Some(handler) = tool.find(&operation) else {
            return Ok(tool_call_result(Err(ToolError::unknown_operation(&operation))));
        };

        tracing::debug!(event = "tool_call", tool = %name, operation = %operation);
        let outcome = handler.invoke(&self.ctx, &args).await;
        if let Err(e) = &outcome {
            tracing::info!(
                event = "tool_call_failed",
                tool = %name,
                operation = %operation,
                code = %e.code,
                error = %e
            );
        }
        Ok(tool_call_result(outcome))
    }
}

fn tool_call_result(outcome: Result<String, ToolError>) -> Value {
    let (text, is_error) = match outcome {
        Ok(text) => (text, false),
        Err(e) => (format!("Error: {}", e.message), true),
    };
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}

/// Whether `message` is a notification: an object without an `id`.
/// Batches count as notifications only when every entry is one.
pub fn is_notification(message: &Value) -> bool {
    match message {
        Value::Object(obj) => !obj.contains_key("id"),
        Value::Array(items) => !items.is_empty() && items.iter().all(is_notification),
        _ => false,
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, err: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": err.to_value()
    })
}
