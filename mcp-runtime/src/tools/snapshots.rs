use serde_json::json;
use slide_core::models::{Page, Snapshot};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render, with_metadata};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub const SNAPSHOT_LOCATIONS: [&str; 6] = [
    "exists_local",
    "exists_cloud",
    "exists_deleted",
    "exists_deleted_retention",
    "exists_deleted_manual",
    "exists_deleted_other",
];

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::SNAPSHOTS,
        "Manage snapshots - completed backup data that can be used for restores and virtual machines. Supports list and get operations.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["backup_start_time", "backup_end_time", "created"]),
                json!({
                    "agent_id": {"type": "string", "description": "Filter by agent ID for 'list'"},
                    "snapshot_location": {
                        "type": "string",
                        "description": "Filter by snapshot location for 'list'",
                        "enum": SNAPSHOT_LOCATIONS
                    },
                    "snapshot_id": {"type": "string", "description": "ID of the snapshot - required for 'get'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[("get", &["snapshot_id"])]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &["agent_id", "snapshot_location"], Some("created"))?;
    let page: Page<Snapshot> = ctx.api.list("/v1/snapshot", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "snapshot_id",
            "Snapshots are point-in-time backups that can be used for restores. Check locations to see where stored.",
        )
        .workflow("Snapshots can be restored as files, images, or virtual machines. Verify status shows boot/filesystem verification results.")
        .note(
            "location_guidance",
            "Each snapshot has a locations array showing where it's stored. If a location's device_id matches the agent's device_id, it's stored locally on that device. If the device_id is different, it's likely stored in the cloud. This is important for choosing where to deploy virtual machines.",
        )
        .note(
            "virtualization_device_selection",
            "When creating virtual machines from this snapshot, you can choose any device_id from the locations array. If you use the agent's original device_id, the VM will run locally on that device. If you use a different device_id from locations (cloud device), the VM will run in the cloud. Always inform the user whether their VM will be local or cloud-based.",
        ),
    )?)
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let snapshot_id = required_string(args, "snapshot_id")?;
    let snapshot: Snapshot = ctx.api.get(&format!("/v1/snapshot/{snapshot_id}")).await?;
    render(&with_metadata(
        &snapshot,
        Metadata::new(
            "snapshot_id",
            "This snapshot can be restored as files, images, or virtual machines.",
        )
        .note(
            "location_guidance",
            "The locations array shows where this snapshot is stored. If a location's device_id matches the agent_id's device, it's stored locally. If different, it's likely in the cloud.",
        )
        .note(
            "virtualization_device_selection",
            "When creating VMs from this snapshot, choose device_id from locations. Agent's original device = local VM, different device = cloud VM. Always tell the user if their VM will be local or cloud-based.",
        )
        .note(
            "restore_options",
            "This snapshot can be used for file restores, image exports, or virtual machine creation depending on your recovery needs.",
        ),
    )?)
}
