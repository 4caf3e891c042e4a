//! Tool and operation admission for each tools mode.
//!
//! Admission runs in a fixed order: the deny-list, then the feature gates for
//! presentation and reports, then the tools-mode tier. Operation admission is a
//! separate step evaluated once the tool itself has been admitted.

use crate::config::{ServerConfig, ToolsMode};

pub mod tools {
    pub const AGENTS: &str = "slide_agents";
    pub const BACKUPS: &str = "slide_backups";
    pub const SNAPSHOTS: &str = "slide_snapshots";
    pub const RESTORES: &str = "slide_restores";
    pub const VMS: &str = "slide_vms";
    pub const NETWORKS: &str = "slide_networks";
    pub const DEVICES: &str = "slide_devices";
    pub const ALERTS: &str = "slide_alerts";
    pub const USER_MANAGEMENT: &str = "slide_user_management";
    pub const PRESENTATION: &str = "slide_presentation";
    pub const REPORTS: &str = "slide_reports";
    pub const META: &str = "slide_meta";
    pub const DOCS: &str = "slide_docs";
    pub const HIERARCHY_ALIAS: &str = "list_all_clients_devices_and_agents";
}

const READ_ONLY_TOOLS: &[&str] = &[
    tools::AGENTS,
    tools::BACKUPS,
    tools::SNAPSHOTS,
    tools::USER_MANAGEMENT,
    tools::ALERTS,
    tools::DEVICES,
    tools::NETWORKS,
    tools::VMS,
    tools::RESTORES,
    tools::PRESENTATION,
    tools::META,
    tools::DOCS,
    tools::HIERARCHY_ALIAS,
];

const RESTORE_MANAGEMENT_TOOLS: &[&str] = &[tools::VMS, tools::RESTORES, tools::NETWORKS];

const READ_OPERATIONS: &[&str] = &[
    "list",
    "get",
    "browse",
    "list_deleted",
    "list_files",
    "get_file",
    "browse_file",
    "list_images",
    "get_image",
    "browse_image",
    "list_users",
    "get_user",
    "list_accounts",
    "get_account",
    "list_clients",
    "get_client",
    "get_runbook_template",
];

/// Tools whose operations never mutate anything and are not classified per operation.
const UNCLASSIFIED_TOOLS: &[&str] = &[tools::META, tools::DOCS, tools::HIERARCHY_ALIAS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Disabled { tool: String },
    ToolNotInMode { tool: String, mode: ToolsMode },
    OperationNotInMode { tool: String, operation: String, mode: ToolsMode },
}

impl Denial {
    pub fn message(&self) -> String {
        match self {
            Denial::Disabled { tool } => format!("Tool '{tool}' is disabled"),
            Denial::ToolNotInMode { tool, mode } => {
                format!("Tool '{tool}' not available in '{mode}' mode")
            }
            Denial::OperationNotInMode {
                tool,
                operation,
                mode,
            } => format!("operation '{operation}' not available for {tool} in '{mode}' mode"),
        }
    }
}

pub fn is_read_only_tool(tool: &str) -> bool {
    READ_ONLY_TOOLS.contains(&tool)
}

pub fn is_read_operation(operation: &str) -> bool {
    READ_OPERATIONS.contains(&operation)
}

/// Mutating operations the restores tier may still perform.
pub fn is_restore_management_operation(tool: &str, operation: &str) -> bool {
    match tool {
        tools::VMS => matches!(operation, "create" | "update" | "delete"),
        tools::RESTORES => matches!(
            operation,
            "create_file"
                | "delete_file"
                | "browse_file"
                | "create_image"
                | "delete_image"
                | "browse_image"
        ),
        tools::NETWORKS => matches!(
            operation,
            "create"
                | "update"
                | "delete"
                | "create_ipsec"
                | "update_ipsec"
                | "delete_ipsec"
                | "create_port_forward"
                | "update_port_forward"
                | "delete_port_forward"
                | "create_wg_peer"
                | "update_wg_peer"
                | "delete_wg_peer"
        ),
        tools::DEVICES => operation == "update",
        tools::AGENTS => matches!(operation, "create" | "pair" | "update"),
        tools::BACKUPS => operation == "start",
        tools::USER_MANAGEMENT => matches!(
            operation,
            "update_account" | "create_client" | "update_client" | "delete_client"
        ),
        _ => false,
    }
}

/// Operations blocked in full-safe mode.
pub fn is_dangerous_operation(tool: &str, operation: &str) -> bool {
    match tool {
        tools::AGENTS | tools::SNAPSHOTS => operation == "delete",
        tools::DEVICES => matches!(operation, "poweroff" | "reboot"),
        _ => false,
    }
}

pub fn tool_allowed_in_mode(mode: ToolsMode, tool: &str) -> bool {
    match mode {
        ToolsMode::Reporting => is_read_only_tool(tool),
        ToolsMode::Restores => {
            is_read_only_tool(tool) || RESTORE_MANAGEMENT_TOOLS.contains(&tool)
        }
        ToolsMode::FullSafe | ToolsMode::Full => true,
    }
}

pub fn operation_allowed_in_mode(mode: ToolsMode, tool: &str, operation: &str) -> bool {
    if UNCLASSIFIED_TOOLS.contains(&tool) {
        return true;
    }
    match mode {
        ToolsMode::Reporting => is_read_operation(operation),
        ToolsMode::Restores => {
            is_read_operation(operation) || is_restore_management_operation(tool, operation)
        }
        ToolsMode::FullSafe => !is_dangerous_operation(tool, operation),
        ToolsMode::Full => true,
    }
}

/// Whether `tool` is visible and callable under `config`.
pub fn admit_tool(config: &ServerConfig, tool: &str) -> Result<(), Denial> {
    if config.is_disabled(tool) {
        return Err(Denial::Disabled {
            tool: tool.to_string(),
        });
    }
    let gated_off = (tool == tools::PRESENTATION && !config.enable_presentation)
        || (tool == tools::REPORTS && !config.enable_reports);
    if gated_off || !tool_allowed_in_mode(config.tools_mode, tool) {
        return Err(Denial::ToolNotInMode {
            tool: tool.to_string(),
            mode: config.tools_mode,
        });
    }
    Ok(())
}

pub fn admit_operation(config: &ServerConfig, tool: &str, operation: &str) -> Result<(), Denial> {
    if operation_allowed_in_mode(config.tools_mode, tool, operation) {
        Ok(())
    } else {
        Err(Denial::OperationNotInMode {
            tool: tool.to_string(),
            operation: operation.to_string(),
            mode: config.tools_mode,
        })
    }
}
