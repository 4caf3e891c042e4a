//! Typed shapes of the Slide REST API.
//!
//! Every struct tolerates missing fields so a partial upstream payload still
//! deserializes. Timestamps stay as the provider's RFC 3339 strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pagination {
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<i64>,
}

/// List envelope returned by every collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            pagination: Pagination::default(),
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Device {
    pub device_id: String,
    pub display_name: String,
    pub last_seen_at: String,
    pub hostname: String,
    pub ip_addresses: Vec<String>,
    pub addresses: Vec<Value>,
    pub public_ip_address: String,
    pub image_version: String,
    pub package_version: String,
    pub storage_used_bytes: i64,
    pub storage_total_bytes: i64,
    pub serial_number: String,
    pub hardware_model_name: String,
    pub service_model_name: String,
    pub service_model_name_short: String,
    pub service_status: String,
    pub nfr: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booted_at: Option<String>,
}

impl Device {
    /// A device without a client id belongs to no client.
    pub fn is_unassigned(&self) -> bool {
        self.client_id.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Agent {
    pub agent_id: String,
    pub device_id: String,
    pub display_name: String,
    pub last_seen_at: String,
    pub hostname: String,
    pub ip_addresses: Vec<String>,
    pub addresses: Vec<Value>,
    pub public_ip_address: String,
    pub agent_version: String,
    pub platform: String,
    pub os: String,
    pub os_version: String,
    pub firmware_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booted_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentPairCode {
    pub agent_id: String,
    pub display_name: String,
    pub pair_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Backup {
    pub backup_id: String,
    pub agent_id: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Deletion {
    #[serde(rename = "type")]
    pub kind: String,
    pub deleted: String,
    pub deleted_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_and_last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub agent_id: String,
    pub locations: Vec<Location>,
    pub backup_started_at: String,
    pub backup_ended_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<Deletion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_boot_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_fs_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_boot_screenshot_url: Option<String>,
}

impl Snapshot {
    pub fn is_deleted(&self) -> bool {
        self.deleted.as_deref().is_some_and(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileRestore {
    pub file_restore_id: String,
    pub device_id: String,
    pub agent_id: String,
    pub snapshot_id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadUri {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileRestoreEntry {
    pub name: String,
    pub path: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub modified_at: String,
    pub download_uris: Vec<DownloadUri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageExport {
    pub image_export_id: String,
    pub device_id: String,
    pub agent_id: String,
    pub snapshot_id: String,
    pub image_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageExportEntry {
    pub disk_id: String,
    pub name: String,
    pub size: i64,
    pub download_uris: Vec<DownloadUri>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Vnc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websocket_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VirtualMachine {
    pub virt_id: String,
    pub device_id: String,
    pub agent_id: String,
    pub snapshot_id: String,
    pub state: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub cpu_count: i64,
    pub memory_in_mb: i64,
    pub disk_bus: String,
    pub network_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_source: Option<String>,
    pub vnc: Vec<Vnc>,
    pub vnc_password: String,
}

impl VirtualMachine {
    /// First VNC endpoint that exposes a websocket.
    pub fn websocket_uri(&self) -> Option<&str> {
        self.vnc
            .iter()
            .filter_map(|vnc| vnc.websocket_uri.as_deref())
            .find(|uri| !uri.is_empty())
    }

    /// First VNC endpoint that exposes a host and port.
    pub fn direct_endpoint(&self) -> Option<(&str, i64)> {
        self.vnc.iter().find_map(|vnc| match (vnc.host.as_deref(), vnc.port) {
            (Some(host), Some(port)) if !host.is_empty() => Some((host, port)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct User {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub email: String,
    pub role_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: String,
    pub alert_fields: String,
    pub created_at: String,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
pub struct BillingAddress {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    pub primary_contact: String,
    pub primary_email: String,
    pub primary_phone: String,
    pub billing_address: BillingAddress,
    pub alert_emails: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Client {
    pub client_id: String,
    pub name: String,
    pub comments: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkIpsecConn {
    pub ipsec_id: String,
    pub name: String,
    pub psk: String,
    pub local_id: String,
    pub local_addrs: Vec<String>,
    pub local_networks: Vec<String>,
    pub remote_id: String,
    pub remote_addrs: Vec<String>,
    pub remote_networks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkPortForward {
    pub port_forward_id: String,
    pub proto: String,
    pub port: i64,
    pub dest: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkWgPeer {
    pub wg_peer_id: String,
    pub peer_name: String,
    pub wg_public_key: String,
    pub wg_private_key: String,
    pub wg_address: String,
    pub wg_endpoint: String,
    pub remote_networks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Network {
    pub network_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub comments: String,
    pub bridge_device_id: String,
    pub router_prefix: String,
    pub dhcp: bool,
    pub dhcp_range_start: String,
    pub dhcp_range_end: String,
    pub nameservers: Vec<String>,
    pub internet: bool,
    pub connected_virt_ids: Vec<String>,
    pub ipsec_conns: Vec<NetworkIpsecConn>,
    pub port_forwards: Vec<NetworkPortForward>,
    pub wg_peers: Vec<NetworkWgPeer>,
    pub wg: bool,
    pub wg_prefix: String,
    pub wg_public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_tolerates_missing_fields() {
        let page: Page<Agent> = serde_json::from_value(json!({
            "pagination": {"total": 1},
            "data": [{"agent_id": "a_1", "display_name": "DC01"}]
        }))
        .expect("page");
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.next_offset, None);
        assert_eq!(page.data[0].agent_id, "a_1");
        assert_eq!(page.data[0].hostname, "");
    }

    #[test]
    fn device_without_client_is_unassigned() {
        let orphan: Device = serde_json::from_value(json!({"device_id": "d1"})).expect("device");
        assert!(orphan.is_unassigned());
        let blank: Device =
            serde_json::from_value(json!({"device_id": "d2", "client_id": ""})).expect("device");
        assert!(blank.is_unassigned());
        let owned: Device =
            serde_json::from_value(json!({"device_id": "d3", "client_id": "c1"})).expect("device");
        assert!(!owned.is_unassigned());
    }

    #[test]
    fn vm_picks_first_websocket_endpoint() {
        let vm: VirtualMachine = serde_json::from_value(json!({
            "virt_id": "v1",
            "vnc": [
                {"type": "direct", "host": "10.0.0.5", "port": 5900},
                {"type": "websocket", "websocket_uri": "wss://x/y"}
            ]
        }))
        .expect("vm");
        assert_eq!(vm.websocket_uri(), Some("wss://x/y"));
        assert_eq!(vm.direct_endpoint(), Some(("10.0.0.5", 5900)));
    }

    #[test]
    fn billing_address_uses_pascal_case_keys() {
        let account: Account = serde_json::from_value(json!({
            "account_id": "acc_1",
            "billing_address": {"Line1": "1 Main", "City": "Springfield"}
        }))
        .expect("account");
        assert_eq!(account.billing_address.line1, "1 Main");
        let back = serde_json::to_value(&account.billing_address).expect("serialize");
        assert_eq!(back["City"], "Springfield");
        assert!(back.get("Line2").is_none());
    }
}
