//! LLM-facing decoration of REST payloads: `_metadata` blocks and derived
//! per-entity fields such as console links and WireGuard configs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value, json};
use slide_core::models::{Network, NetworkWgPeer, Page, VirtualMachine};

use crate::error::ToolError;
use crate::util::to_pretty_json;

pub const VNC_VIEWER_BASE: &str = "https://slide.recipes/mcpTools/vncViewer.php";

/// `_metadata` block attached to enriched responses.
#[derive(Debug, Clone, Default)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new(primary_identifier: &str, presentation_guidance: &str) -> Self {
        Self::default()
            .note("primary_identifier", primary_identifier)
            .note("presentation_guidance", presentation_guidance)
    }

    pub fn workflow(self, guidance: &str) -> Self {
        self.note("workflow_guidance", guidance)
    }

    pub fn note(mut self, key: &str, text: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), Value::String(text.into()));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Serializes `entity` and attaches `_metadata` next to its fields.
pub fn with_metadata<T: Serialize>(entity: &T, metadata: Metadata) -> Result<Value, ToolError> {
    let mut value = to_value(entity)?;
    if let Value::Object(map) = &mut value {
        map.insert("_metadata".to_string(), metadata.into_value());
    }
    Ok(value)
}

/// `{pagination, data, _metadata}` for a list endpoint.
pub fn list_envelope<T: Serialize>(page: &Page<T>, metadata: Metadata) -> Result<Value, ToolError> {
    Ok(json!({
        "pagination": page.pagination,
        "data": to_value(&page.data)?,
        "_metadata": metadata.into_value(),
    }))
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| {
        ToolError::new(
            slide_core::error::tool_codes::PARSE_ERROR,
            format!("failed to marshal result: {e}"),
        )
    })
}

pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String, ToolError> {
    to_value(value).map(|v| to_pretty_json(&v))
}

/// Browser console link for a VM with a websocket VNC endpoint.
pub fn vnc_viewer_url(virt_id: &str, websocket_uri: &str, vnc_password: &str) -> String {
    let encoded_ws: String = url::form_urlencoded::byte_serialize(websocket_uri.as_bytes()).collect();
    format!(
        "{VNC_VIEWER_BASE}?id={virt_id}&ws={encoded_ws}&password={}&encoding=base64",
        STANDARD.encode(vnc_password.as_bytes())
    )
}

pub fn vm_viewer_url(vm: &VirtualMachine) -> Option<String> {
    vm.websocket_uri()
        .map(|ws| vnc_viewer_url(&vm.virt_id, ws, &vm.vnc_password))
}

/// Serialized VM with `_vnc_viewer_url` when a websocket endpoint exists.
pub fn vm_value(vm: &VirtualMachine) -> Result<Value, ToolError> {
    let mut value = to_value(vm)?;
    if let (Some(url), Value::Object(map)) = (vm_viewer_url(vm), &mut value) {
        map.insert("_vnc_viewer_url".to_string(), Value::String(url));
    }
    Ok(value)
}

fn allowed_ips(remote_networks: &[String], network_prefix: &str) -> String {
    if !remote_networks.is_empty() {
        remote_networks.join(", ")
    } else if !network_prefix.is_empty() {
        network_prefix.to_string()
    } else {
        "0.0.0.0/0, ::/0".to_string()
    }
}

/// Client-side WireGuard config for a peer of a network.
pub fn wireguard_config(peer: &NetworkWgPeer, server_public_key: &str, network_prefix: &str) -> String {
    format!(
        "[Interface]\nPrivateKey = {}\nAddress = {}\n\n[Peer]\nPublicKey = {}\nEndpoint = {}\nAllowedIPs = {}\nPersistentKeepalive = 25\n",
        peer.wg_private_key,
        peer.wg_address,
        server_public_key,
        peer.wg_endpoint,
        allowed_ips(&peer.remote_networks, network_prefix),
    )
}

pub fn wg_peer_value(peer: &NetworkWgPeer, network: &Network) -> Result<Value, ToolError> {
    let mut value = to_value(peer)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "_wireguard_config".to_string(),
            Value::String(wireguard_config(peer, &network.wg_public_key, &network.wg_prefix)),
        );
    }
    Ok(value)
}

/// Serialized network whose WireGuard peers carry their client configs.
pub fn network_value(network: &Network) -> Result<Value, ToolError> {
    let mut value = to_value(network)?;
    let peers = network
        .wg_peers
        .iter()
        .map(|peer| wg_peer_value(peer, network))
        .collect::<Result<Vec<_>, _>>()?;
    if let Value::Object(map) = &mut value {
        map.insert("wg_peers".to_string(), Value::Array(peers));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_url_escapes_websocket_and_encodes_password() {
        assert_eq!(
            vnc_viewer_url("v1", "wss://h/x?y=1", "pw"),
            "https://slide.recipes/mcpTools/vncViewer.php?id=v1&ws=wss%3A%2F%2Fh%2Fx%3Fy%3D1&password=cHc=&encoding=base64"
        );
    }

    #[test]
    fn vm_without_websocket_has_no_viewer_url() {
        let vm: VirtualMachine = serde_json::from_value(json!({
            "virt_id": "v1",
            "vnc": [{"type": "direct", "host": "10.0.0.1", "port": 5900}],
            "vnc_password": "pw"
        }))
        .expect("vm");
        let value = vm_value(&vm).expect("value");
        assert!(value.get("_vnc_viewer_url").is_none());
        assert_eq!(value["virt_id"], "v1");
    }

    #[test]
    fn wireguard_allowed_ips_fall_back_to_prefix_then_everything() {
        let mut peer = NetworkWgPeer {
            wg_private_key: "priv".into(),
            wg_address: "10.8.0.2/32".into(),
            wg_endpoint: "vpn.example:51820".into(),
            ..Default::default()
        };
        let config = wireguard_config(&peer, "pub", "10.8.0.0/24");
        assert_eq!(
            config,
            "[Interface]\nPrivateKey = priv\nAddress = 10.8.0.2/32\n\n[Peer]\nPublicKey = pub\nEndpoint = vpn.example:51820\nAllowedIPs = 10.8.0.0/24\nPersistentKeepalive = 25\n"
        );
        assert!(wireguard_config(&peer, "pub", "").contains("AllowedIPs = 0.0.0.0/0, ::/0\n"));
        peer.remote_networks = vec!["192.168.1.0/24".into(), "10.0.0.0/8".into()];
        assert!(
            wireguard_config(&peer, "pub", "10.8.0.0/24")
                .contains("AllowedIPs = 192.168.1.0/24, 10.0.0.0/8\n")
        );
    }

    #[test]
    fn list_envelope_keeps_order_and_attaches_metadata() {
        let page: Page<Value> = serde_json::from_value(json!({
            "pagination": {"total": 2, "next_offset": 2},
            "data": [{"id": "b"}, {"id": "a"}]
        }))
        .expect("page");
        let value = list_envelope(&page, Metadata::new("id", "guidance").workflow("flow"))
            .expect("envelope");
        assert_eq!(value["data"][0]["id"], "b");
        assert_eq!(value["pagination"]["next_offset"], 2);
        assert_eq!(value["_metadata"]["primary_identifier"], "id");
        assert_eq!(value["_metadata"]["workflow_guidance"], "flow");
    }
}
