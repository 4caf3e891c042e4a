//! Table-driven tool catalog: each tool names its operations and the handler
//! behind each one. The schema's `operation` enum is derived from that table so
//! the two cannot drift apart.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};
use slide_core::ServerConfig;
use slide_core::config::ToolsMode;

use crate::args::Args;
use crate::context::ToolContext;
use crate::error::ToolError;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;
pub type Handler = for<'a> fn(&'a ToolContext, &'a Args) -> HandlerFuture<'a>;

pub const READ_ONLY_SUFFIX: &str = " (Read-only mode: only list/get operations available)";

/// Registers an async handler `fn(&ToolContext, &Args) -> Result<String, ToolError>`.
macro_rules! op {
    ($name:expr, $handler:path) => {
        $crate::registry::Operation::new($name, |ctx, args| Box::pin($handler(ctx, args)))
    };
}
pub(crate) use op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    /// Requires the presentation or reports gate.
    ReportingFeatures,
}

impl Gate {
    fn is_open(self, config: &ServerConfig) -> bool {
        match self {
            Gate::Always => true,
            Gate::ReportingFeatures => config.reporting_features_enabled(),
        }
    }
}

#[derive(Clone)]
pub struct Operation {
    pub name: &'static str,
    handler: Handler,
    gate: Gate,
}

impl Operation {
    pub fn new(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            handler,
            gate: Gate::Always,
        }
    }

    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub async fn invoke(&self, ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
        if !self.gate.is_open(&ctx.config) {
            return Err(ToolError::new(
                slide_core::error::tool_codes::UNKNOWN_OPERATION,
                format!(
                    "{} operation requires reporting or presentation tools to be enabled",
                    self.name
                ),
            ));
        }
        (self.handler)(ctx, args).await
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("gate", &self.gate)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    description: &'static str,
    schema: Value,
    operations: Vec<Operation>,
    /// Set for tools without an `operation` argument.
    fixed_operation: Option<&'static str>,
}

impl ToolSpec {
    pub fn new(name: &'static str, description: &'static str, schema: Value) -> Self {
        Self {
            name,
            description,
            schema,
            operations: Vec::new(),
            fixed_operation: None,
        }
    }

    /// A tool whose every call runs `operation`.
    pub fn alias(
        name: &'static str,
        description: &'static str,
        operation: Operation,
    ) -> Self {
        Self {
            name,
            description,
            schema: json!({"type": "object", "properties": {}}),
            fixed_operation: Some(operation.name),
            operations: vec![operation],
        }
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn fixed_operation(&self) -> Option<&'static str> {
        self.fixed_operation
    }

    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn description(&self, config: &ServerConfig) -> String {
        if config.tools_mode == ToolsMode::Reporting {
            format!("{}{READ_ONLY_SUFFIX}", self.description)
        } else {
            self.description.to_string()
        }
    }

    /// Argument schema with the `operation` enum limited to operations whose gate is open.
    pub fn input_schema(&self, config: &ServerConfig) -> Value {
        let mut schema = self.schema.clone();
        if self.fixed_operation.is_some() {
            return schema;
        }
        let names: Vec<&str> = self
            .operations
            .iter()
            .filter(|op| op.gate.is_open(config))
            .map(|op| op.name)
            .collect();
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            let operation = properties
                .entry("operation")
                .or_insert_with(|| json!({"type": "string"}));
            operation["enum"] = json!(names);
        }
        if let Some(object) = schema.as_object_mut() {
            let required = object.entry("required").or_insert_with(|| json!([]));
            if let Some(list) = required.as_array_mut() {
                if !list.iter().any(|v| v == "operation") {
                    list.insert(0, json!("operation"));
                }
            }
        }
        schema
    }

    pub fn to_listing(&self, config: &ServerConfig) -> Value {
        json!({
            "name": self.name,
            "description": self.description(config),
            "inputSchema": self.input_schema(config),
        })
    }
}

/// `if operation == X then require [...]` clauses for a tool schema's `allOf`.
pub fn require_when(rules: &[(&str, &[&str])]) -> Value {
    Value::Array(
        rules
            .iter()
            .map(|(operation, required)| {
                json!({
                    "if": {"properties": {"operation": {"const": operation}}},
                    "then": {"required": required},
                })
            })
            .collect(),
    )
}

/// Shared pagination and sort properties for list operations.
pub fn paging_properties(sort_by: &[&str]) -> Value {
    json!({
        "limit": {"type": "number", "description": "Number of results per page (max 50)"},
        "offset": {"type": "number", "description": "Pagination offset"},
        "sort_asc": {"type": "boolean", "description": "Sort in ascending order"},
        "sort_by": {"type": "string", "enum": sort_by, "description": "Field to sort by"},
    })
}

/// Merges several `properties` objects into one.
pub fn properties(parts: &[Value]) -> Value {
    let mut merged = serde_json::Map::new();
    for part in parts {
        if let Some(object) = part.as_object() {
            merged.extend(object.clone());
        }
    }
    Value::Object(merged)
}

#[derive(Debug, Clone)]
pub struct Registry {
    tools: Vec<ToolSpec>,
}

impl Registry {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }
}
