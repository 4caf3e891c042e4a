use serde_json::{Value, json};
use slide_core::models::{Device, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, pick, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::DEVICES,
        "Manage Slide devices - the physical appliances that store backups. Supports list, get, update, poweroff, and reboot operations.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["hostname", "created"]),
                json!({
                    "client_id": {"type": "string", "description": "Filter by client ID for 'list', or assign a client with 'update'"},
                    "device_id": {"type": "string", "description": "ID of the device - required for 'get', 'update', 'poweroff' and 'reboot'"},
                    "display_name": {"type": "string", "description": "Display name for the device - used with 'update'"},
                    "hostname": {"type": "string", "description": "Hostname for the device - used with 'update'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get", &["device_id"]),
                ("update", &["device_id"]),
                ("poweroff", &["device_id"]),
                ("reboot", &["device_id"]),
            ]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("update", update))
    .operation(op!("poweroff", poweroff))
    .operation(op!("reboot", reboot))
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &["client_id"], Some("hostname"))?;
    let page: Page<Device> = ctx.api.list("/v1/device", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "hostname",
            "When referring to devices, use the hostname as the primary identifier. Device IDs are internal identifiers not commonly used by humans.",
        )
        .workflow("Devices are the physical machines running the Slide appliance. Agents are the backup software installed on computers that get backed up to these devices."),
    )?)
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let device_id = required_string(args, "device_id")?;
    let device: Device = ctx.api.get(&format!("/v1/device/{device_id}")).await?;
    render(&device)
}

async fn update(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let device_id = required_string(args, "device_id")?;
    let body = pick(args, &["display_name", "hostname", "client_id"]);
    let device: Device = ctx
        .api
        .patch(&format!("/v1/device/{device_id}"), &Value::Object(body))
        .await?;
    render(&device)
}

async fn shutdown(ctx: &ToolContext, args: &Args, action: &str) -> Result<String, ToolError> {
    let device_id = required_string(args, "device_id")?;
    let response: Value = ctx
        .api
        .post(&format!("/v1/device/{device_id}/shutdown/{action}"), None)
        .await?;
    tracing::info!(event = "device_shutdown_requested", device_id = %device_id, action);
    if response.is_null() {
        return render(&json!({"message": format!("Device {action} requested successfully")}));
    }
    render(&response)
}

async fn poweroff(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    shutdown(ctx, args, "poweroff").await
}

async fn reboot(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    shutdown(ctx, args, "reboot").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_defaults_to_hostname_sort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/device"))
            .and(query_param("sort_by", "hostname"))
            .and(query_param("client_id", "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"device_id": "d1", "hostname": "slide-01"}]
            })))
            .mount(&server)
            .await;

        let out = list(&context_for(&server), &args(json!({"client_id": "c1"})))
            .await
            .expect("list");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["data"][0]["hostname"], "slide-01");
        assert_eq!(value["_metadata"]["primary_identifier"], "hostname");
    }

    #[tokio::test]
    async fn reboot_with_empty_body_reports_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/device/d1/shutdown/reboot"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let out = reboot(&context_for(&server), &args(json!({"device_id": "d1"})))
            .await
            .expect("reboot");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["message"], "Device reboot requested successfully");
    }
}
