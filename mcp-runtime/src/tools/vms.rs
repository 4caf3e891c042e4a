use serde_json::{Value, json};
use slide_core::models::{Page, VirtualMachine};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_string, pick, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, render, vm_value, vm_viewer_url};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub const RDP_PORT: u16 = 3389;

const DISK_BUSES: [&str; 2] = ["sata", "virtio"];
const NETWORK_MODELS: [&str; 3] = ["hypervisor_default", "e1000", "rtl8139"];
const NETWORK_TYPES: [&str; 4] = ["network", "network-isolated", "bridge", "network-id"];
const STATES: [&str; 3] = ["running", "stopped", "paused"];

const VM_PRESENTATION: &str = "When referring to the virtual machine, use the virt_id as the primary identifier. Virtual machine IDs are internal identifiers not commonly used by humans.";
const CONSOLE_ACCESS: &str = "The easiest way to access this virtual machine is through the _vnc_viewer_url property - this provides a direct browser link to the VM console that requires no additional software or configuration.";
const VNC_GUIDANCE: &str = "The _vnc_viewer_url is the easiest way to access this VM console - simply click the link to open the VM in your browser. No VNC client setup required.";

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::VMS,
        "Manage virtual machines created from snapshots. Virtual machines allow you to boot and interact with backed-up systems for testing, recovery, or migration purposes. Includes RDP bookmark generation for easy desktop access.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["created"]),
                json!({
                    "virt_id": {"type": "string", "description": "ID of the virtual machine - required for 'get', 'update', 'delete' and 'get_rdp_bookmark'"},
                    "snapshot_id": {"type": "string", "description": "ID of the snapshot to create the VM from - required for 'create'"},
                    "device_id": {"type": "string", "description": "ID of the device to create the VM on - required for 'create'"},
                    "cpu_count": {"type": "number", "description": "Number of CPUs for 'create' and 'update'"},
                    "memory_in_mb": {"type": "number", "description": "Memory in MB for 'create' and 'update'"},
                    "disk_bus": {"type": "string", "description": "Disk bus type for 'create'", "enum": DISK_BUSES},
                    "network_model": {"type": "string", "description": "Network model for 'create'", "enum": NETWORK_MODELS},
                    "network_type": {"type": "string", "description": "Network type for 'create'", "enum": NETWORK_TYPES},
                    "network_source": {"type": "string", "description": "Network ID for 'create' when network_type is 'network-id'"},
                    "boot_mods": {"type": "array", "description": "Optional boot modifications for 'create'", "items": {"type": "string"}},
                    "state": {"type": "string", "description": "VM state for 'update'", "enum": STATES},
                    "expires_at": {"type": "string", "description": "Expiration timestamp for 'update'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get", &["virt_id"]),
                ("create", &["snapshot_id", "device_id"]),
                ("update", &["virt_id"]),
                ("delete", &["virt_id"]),
                ("get_rdp_bookmark", &["virt_id"]),
            ]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("create", create))
    .operation(op!("update", update))
    .operation(op!("delete", delete))
    .operation(op!("get_rdp_bookmark", rdp_bookmark))
}

/// VM payload with its viewer link mirrored into the metadata block.
fn vm_with_metadata(vm: &VirtualMachine, metadata: Metadata) -> Result<Value, ToolError> {
    let metadata = match vm_viewer_url(vm) {
        Some(url) => metadata
            .note("vnc_guidance", VNC_GUIDANCE)
            .note("vnc_viewer_url", url),
        None => metadata,
    };
    let mut value = vm_value(vm)?;
    value["_metadata"] = metadata.into_value();
    Ok(value)
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("created"))?;
    let page: Page<VirtualMachine> = ctx.api.list("/v1/restore/virt", &query).await?;
    let data = page
        .data
        .iter()
        .map(vm_value)
        .collect::<Result<Vec<_>, _>>()?;
    let metadata = Metadata::new(
        "virt_id",
        "Virtual machines created from snapshots for testing or disaster recovery.",
    )
    .workflow("VMs can be started/stopped and accessed via VNC. Great for testing backups before full restore.")
    .note(
        "vnc_guidance",
        "The easiest way to access a virtual machine is through the _vnc_viewer_url property - this provides a direct browser link to the VM console that requires no additional software or configuration.",
    )
    .note(
        "console_access",
        "Always use the _vnc_viewer_url for immediate browser-based console access. This is much easier than configuring a separate VNC client.",
    )
    .note(
        "network_type_reference",
        "Valid network_type values: 'network' (NAT with internet, recommended), 'network-isolated', 'bridge', 'network-id'",
    )
    .note(
        "network_dependencies",
        "If you need a VM with network_type 'network-id', create the custom network first with slide_networks operation 'create'. Built-in network types do not require pre-existing networks.",
    )
    .note(
        "deployment_awareness",
        "Each VM's device_id indicates where it's running. Some VMs may run locally on the customer's devices while others run in the cloud, depending on which device_id was used during creation.",
    );
    render(&json!({
        "pagination": page.pagination,
        "data": data,
        "_metadata": metadata.into_value(),
    }))
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let virt_id = required_string(args, "virt_id")?;
    let vm: VirtualMachine = ctx.api.get(&format!("/v1/restore/virt/{virt_id}")).await?;
    render(&vm_with_metadata(
        &vm,
        Metadata::new("virt_id", VM_PRESENTATION)
            .note("console_access", CONSOLE_ACCESS)
            .note(
                "deployment_location",
                "The device_id field indicates where this VM is running. If this matches the original agent's device_id, it's running locally. If different, it's likely running in the cloud.",
            ),
    )?)
}

fn check_enum(args: &Args, key: &str, allowed: &[&str]) -> Result<(), ToolError> {
    if let Some(value) = optional_string(args, key)? {
        if !allowed.contains(&value.as_str()) {
            return Err(ToolError::invalid(
                key,
                format!("invalid {key} '{value}'. Valid options: {}", allowed.join(", ")),
            ));
        }
    }
    Ok(())
}

async fn create(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let snapshot_id = required_string(args, "snapshot_id")?;
    let device_id = required_string(args, "device_id")?;
    check_enum(args, "disk_bus", &DISK_BUSES)?;
    check_enum(args, "network_model", &NETWORK_MODELS)?;
    check_enum(args, "network_type", &NETWORK_TYPES)?;
    if optional_string(args, "network_type")?.as_deref() == Some("network-id")
        && optional_string(args, "network_source")?.is_none()
    {
        return Err(ToolError::missing("network_source"));
    }

    let mut body = pick(
        args,
        &[
            "cpu_count",
            "memory_in_mb",
            "disk_bus",
            "network_model",
            "network_type",
            "network_source",
            "boot_mods",
        ],
    );
    body.insert("snapshot_id".to_string(), Value::String(snapshot_id));
    body.insert("device_id".to_string(), Value::String(device_id));

    let vm: VirtualMachine = ctx
        .api
        .post("/v1/restore/virt", Some(&Value::Object(body)))
        .await?;
    render(&vm_with_metadata(
        &vm,
        Metadata::new("virt_id", VM_PRESENTATION)
            .note(
                "next_steps",
                "Control the virtual machine with slide_vms operation 'update' to change its state (running, stopped, paused) or its resources.",
            )
            .note(
                "resource_guidance",
                "For optimal performance, 8192MB of RAM is recommended for most VMs.",
            )
            .note("console_access", CONSOLE_ACCESS)
            .note(
                "client_id_matching",
                "When using network_type 'network-id', the VM's client must match the network's client_id. A network with an empty client_id can only be used with VMs that also have no client.",
            )
            .note(
                "deployment_location",
                "Always tell the user whether this VM was deployed locally or in the cloud. If device_id matches the original agent's device it runs locally, otherwise it runs in the cloud.",
            ),
    )?)
}

async fn update(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let virt_id = required_string(args, "virt_id")?;
    check_enum(args, "state", &STATES)?;
    let body = pick(args, &["state", "expires_at", "memory_in_mb", "cpu_count"]);
    let vm: VirtualMachine = ctx
        .api
        .patch(&format!("/v1/restore/virt/{virt_id}"), &Value::Object(body))
        .await?;
    render(&vm_with_metadata(
        &vm,
        Metadata::new("virt_id", VM_PRESENTATION).note("console_access", CONSOLE_ACCESS),
    )?)
}

async fn delete(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let virt_id = required_string(args, "virt_id")?;
    ctx.api
        .delete(&format!("/v1/restore/virt/{virt_id}"), None)
        .await?;
    render(&json!({"message": "Virtual machine deleted successfully"}))
}

/// `.rdp` file body targeting `host` on the standard RDP port.
pub fn rdp_file(host: &str, virt_id: &str) -> String {
    [
        format!("full address:s:{host}:{RDP_PORT}"),
        "prompt for credentials:i:1".to_string(),
        "administrative session:i:1".to_string(),
        "screen mode id:i:2".to_string(),
        "use multimon:i:0".to_string(),
        "session bpp:i:32".to_string(),
        "authentication level:i:2".to_string(),
        "redirectclipboard:i:1".to_string(),
        "alternate shell:s:".to_string(),
        format!("remoteapplicationname:s:Slide VM {virt_id}"),
    ]
    .join("\r\n")
        + "\r\n"
}

async fn rdp_bookmark(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let virt_id = required_string(args, "virt_id")?;
    let vm: VirtualMachine = ctx.api.get(&format!("/v1/restore/virt/{virt_id}")).await?;
    let Some((host, _vnc_port)) = vm.direct_endpoint() else {
        return Err(ToolError::invalid(
            "virt_id",
            format!("virtual machine {virt_id} has no reachable host address for RDP"),
        ));
    };
    render(&json!({
        "virt_id": vm.virt_id,
        "state": vm.state,
        "filename": format!("slide-vm-{}.rdp", vm.virt_id),
        "rdp_file": rdp_file(host, &vm.virt_id),
        "_metadata": {
            "usage": "Save rdp_file as the given filename and open it with a Remote Desktop client. The VM must be running and allow RDP connections.",
            "state_note": "If state is not 'running', start the VM with slide_vms operation 'update' and state 'running' first.",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_adds_exact_viewer_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/restore/virt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{
                    "virt_id": "v1",
                    "vnc": [{"type": "ws", "websocket_uri": "wss://h/x"}],
                    "vnc_password": "pw"
                }]
            })))
            .mount(&server)
            .await;

        let out = list(&context_for(&server), &args(json!({})))
            .await
            .expect("list");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(
            value["data"][0]["_vnc_viewer_url"],
            "https://slide.recipes/mcpTools/vncViewer.php?id=v1&ws=wss%3A%2F%2Fh%2Fx&password=cHc=&encoding=base64"
        );
        assert!(value["pagination"].is_object());
        assert!(value["_metadata"].is_object());
    }

    #[tokio::test]
    async fn get_mirrors_viewer_url_into_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/restore/virt/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "virt_id": "v1",
                "vnc": [{"type": "ws", "websocket_uri": "wss://h/x"}],
                "vnc_password": "pw"
            })))
            .mount(&server)
            .await;

        let out = get(&context_for(&server), &args(json!({"virt_id": "v1"})))
            .await
            .expect("get");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["_metadata"]["vnc_viewer_url"], value["_vnc_viewer_url"]);
    }

    #[tokio::test]
    async fn create_validates_enums_and_network_source() {
        let server = MockServer::start().await;
        let ctx = context_for(&server);
        let err = create(
            &ctx,
            &args(json!({"snapshot_id": "s", "device_id": "d", "disk_bus": "scsi"})),
        )
        .await
        .expect_err("bad bus");
        assert!(err.message.starts_with("invalid disk_bus 'scsi'"));

        let err = create(
            &ctx,
            &args(json!({"snapshot_id": "s", "device_id": "d", "network_type": "network-id"})),
        )
        .await
        .expect_err("missing source");
        assert_eq!(err.message, "network_source is required");
    }

    #[tokio::test]
    async fn rdp_bookmark_uses_vm_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/restore/virt/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "virt_id": "v2",
                "state": "running",
                "vnc": [{"type": "direct", "host": "192.168.7.20", "port": 5901}]
            })))
            .mount(&server)
            .await;

        let out = rdp_bookmark(&context_for(&server), &args(json!({"virt_id": "v2"})))
            .await
            .expect("bookmark");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["filename"], "slide-vm-v2.rdp");
        assert!(
            value["rdp_file"]
                .as_str()
                .expect("text")
                .starts_with("full address:s:192.168.7.20:3389\r\n")
        );
    }

    #[tokio::test]
    async fn rdp_bookmark_needs_a_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/restore/virt/v3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"virt_id": "v3"})))
            .mount(&server)
            .await;

        let err = rdp_bookmark(&context_for(&server), &args(json!({"virt_id": "v3"})))
            .await
            .expect_err("no host");
        assert!(err.message.contains("no reachable host"));
    }
}
