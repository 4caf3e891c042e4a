use serde_json::json;
use slide_core::models::{Alert, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_bool, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::ALERTS,
        "Manage system alerts and notifications. Supports list, get, and update (resolve/unresolve) operations.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["created"]),
                json!({
                    "device_id": {"type": "string", "description": "Filter by device ID - used with 'list' operation"},
                    "agent_id": {"type": "string", "description": "Filter by agent ID - used with 'list' operation"},
                    "resolved": {"type": "boolean", "description": "Filter by resolved status - used with 'list' operation, or required for 'update' operation"},
                    "alert_id": {"type": "string", "description": "ID of the alert - required for 'get' and 'update' operations"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get", &["alert_id"]),
                ("update", &["alert_id", "resolved"]),
            ]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("update", update))
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &["device_id", "agent_id", "resolved"], Some("created"))?;
    let page: Page<Alert> = ctx.api.list("/v1/alert", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "alert_id",
            "System alerts for devices not checking in, failed backups, storage issues, etc.",
        )
        .workflow("Alerts can be resolved manually. Check alert_type for the specific issue and alert_fields for details."),
    )?)
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let alert_id = required_string(args, "alert_id")?;
    let alert: Alert = ctx.api.get(&format!("/v1/alert/{alert_id}")).await?;
    render(&alert)
}

async fn update(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let alert_id = required_string(args, "alert_id")?;
    let resolved = optional_bool(args, "resolved")?.ok_or_else(|| ToolError::missing("resolved"))?;
    let alert: Alert = ctx
        .api
        .patch(
            &format!("/v1/alert/{alert_id}"),
            &json!({"resolved": resolved}),
        )
        .await?;
    render(&alert)
}
