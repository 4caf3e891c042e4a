use serde_json::{Value, json};
use slide_core::models::{Backup, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::BACKUPS,
        "Manage backup operations - view backup status and start new backups. Supports list, get, and start operations.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["id", "start_time"]),
                json!({
                    "agent_id": {"type": "string", "description": "Filter by agent ID for 'list', required for 'start'"},
                    "device_id": {"type": "string", "description": "Filter by device ID for 'list'"},
                    "snapshot_id": {"type": "string", "description": "Filter by snapshot ID for 'list'"},
                    "backup_id": {"type": "string", "description": "ID of the backup - required for 'get'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[("get", &["backup_id"]), ("start", &["agent_id"])]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("start", start))
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(
        args,
        &["agent_id", "device_id", "snapshot_id"],
        Some("start_time"),
    )?;
    let page: Page<Backup> = ctx.api.list("/v1/backup", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "backup_id",
            "Backups represent backup jobs. Status indicates success/failure. If successful, snapshot_id will be present.",
        )
        .workflow("Backups create snapshots when successful. Failed backups will have error_code and error_message."),
    )?)
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let backup_id = required_string(args, "backup_id")?;
    let backup: Backup = ctx.api.get(&format!("/v1/backup/{backup_id}")).await?;
    render(&backup)
}

async fn start(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let body = json!({ "agent_id": required_string(args, "agent_id")? });
    let started: Value = ctx.api.post("/v1/backup", Some(&body)).await?;
    render(&started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_defaults_to_start_time_sort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/backup"))
            .and(query_param("sort_by", "start_time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"backup_id": "b_1", "status": "succeeded", "snapshot_id": "s_1"}]
            })))
            .mount(&server)
            .await;

        let out = list(&context_for(&server), &args(json!({})))
            .await
            .expect("list");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["data"][0]["snapshot_id"], "s_1");
        assert_eq!(value["_metadata"]["primary_identifier"], "backup_id");
    }

    #[tokio::test]
    async fn start_requires_agent() {
        let server = MockServer::start().await;
        let err = start(&context_for(&server), &args(json!({})))
            .await
            .expect_err("missing agent");
        assert_eq!(err.message, "agent_id is required");
    }
}
