use serde_json::{Map, Value, json};
use slide_core::models::{Network, NetworkIpsecConn, NetworkPortForward, NetworkWgPeer, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_string_array, pick, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, network_value, render, wg_peer_value};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

const NETWORK_FIELDS: [&str; 12] = [
    "bridge_device_id",
    "client_id",
    "comments",
    "dhcp",
    "dhcp_range_start",
    "dhcp_range_end",
    "internet",
    "nameservers",
    "router_prefix",
    "wg",
    "wg_prefix",
    "name",
];

const CLARIFICATION: &str = "IMPORTANT: Network configuration errors can cause serious connectivity issues. Always ask users to specify their requirements clearly before creating networks. Don't assume default values for critical settings like network type, IP addressing, or bridge device selection.";

pub fn spec() -> ToolSpec {
    let string_list = |description: &str| json!({"type": "array", "description": description, "items": {"type": "string"}});
    ToolSpec::new(
        tools::NETWORKS,
        "Manage networks and their configurations including IPSec connections, port forwards, and WireGuard peers. Networks enable virtual machines to communicate with each other and external networks.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["id"]),
                json!({
                    "network_id": {"type": "string", "description": "ID of the network - required for get, update, delete operations and all sub-resource operations"},
                    "name": {"type": "string", "description": "Name of the network - required for 'create' operation"},
                    "type": {"type": "string", "description": "Network type - required for 'create' operation", "enum": ["standard", "bridge-lan"]},
                    "bridge_device_id": {"type": "string", "description": "Device ID for bridge networks - used with 'create' and 'update' operations"},
                    "client_id": {"type": "string", "description": "Client ID for the network - should match the client_id of VMs that will use this network"},
                    "comments": {"type": "string", "description": "Comments about the network - used with 'create' and 'update' operations"},
                    "dhcp": {"type": "boolean", "description": "Enable DHCP server - used with 'create' and 'update' operations"},
                    "dhcp_range_start": {"type": "string", "description": "DHCP range start address - used with 'create' and 'update' operations"},
                    "dhcp_range_end": {"type": "string", "description": "DHCP range end address - used with 'create' and 'update' operations"},
                    "internet": {"type": "boolean", "description": "Allow internet access - used with 'create' and 'update' operations"},
                    "nameservers": string_list("DNS servers - used with 'create' and 'update' operations"),
                    "router_prefix": {"type": "string", "description": "Router IP address with prefix (e.g., '192.168.1.1/24') - must be a usable IP address within the network, not the network address itself"},
                    "wg": {"type": "boolean", "description": "Enable WireGuard VPN - used with 'create' and 'update' operations"},
                    "wg_prefix": {"type": "string", "description": "WireGuard network prefix - must not overlap with other networks"},
                    "ipsec_id": {"type": "string", "description": "ID of the IPSec connection - required for 'update_ipsec' and 'delete_ipsec' operations"},
                    "remote_addrs": string_list("Remote addresses for IPSec - required for 'create_ipsec' operation"),
                    "remote_networks": string_list("Remote networks for IPSec - required for 'create_ipsec' operation, or for WireGuard peers"),
                    "port_forward_id": {"type": "string", "description": "ID of the port forward - required for 'update_port_forward' and 'delete_port_forward' operations"},
                    "proto": {"type": "string", "description": "Protocol for port forward - required for 'create_port_forward' operation", "enum": ["tcp", "udp"]},
                    "dest": {"type": "string", "description": "Destination address:port for port forward - required for 'create_port_forward' operation"},
                    "wg_peer_id": {"type": "string", "description": "ID of the WireGuard peer - required for 'update_wg_peer' and 'delete_wg_peer' operations"},
                    "peer_name": {"type": "string", "description": "Name of the WireGuard peer - required for 'create_wg_peer' operation"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get", &["network_id"]),
                ("create", &["name", "type"]),
                ("update", &["network_id"]),
                ("delete", &["network_id"]),
                ("create_ipsec", &["network_id", "name", "remote_addrs", "remote_networks"]),
                ("update_ipsec", &["network_id", "ipsec_id"]),
                ("delete_ipsec", &["network_id", "ipsec_id"]),
                ("create_port_forward", &["network_id", "proto", "dest"]),
                ("update_port_forward", &["network_id", "port_forward_id"]),
                ("delete_port_forward", &["network_id", "port_forward_id"]),
                ("create_wg_peer", &["network_id", "peer_name"]),
                ("update_wg_peer", &["network_id", "wg_peer_id"]),
                ("delete_wg_peer", &["network_id", "wg_peer_id"]),
            ]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("create", create))
    .operation(op!("update", update))
    .operation(op!("delete", delete))
    .operation(op!("create_ipsec", create_ipsec))
    .operation(op!("update_ipsec", update_ipsec))
    .operation(op!("delete_ipsec", delete_ipsec))
    .operation(op!("create_port_forward", create_port_forward))
    .operation(op!("update_port_forward", update_port_forward))
    .operation(op!("delete_port_forward", delete_port_forward))
    .operation(op!("create_wg_peer", create_wg_peer))
    .operation(op!("update_wg_peer", update_wg_peer))
    .operation(op!("delete_wg_peer", delete_wg_peer))
}

/// Router prefixes need CIDR notation and must name a host, not the network address.
pub fn validate_router_prefix(prefix: &str) -> Result<(), ToolError> {
    if prefix.is_empty() {
        return Ok(());
    }
    let Some((ip, _)) = prefix.split_once('/') else {
        return Err(ToolError::invalid(
            "router_prefix",
            "router_prefix is expecting CIDR notation for the routers IP address (e.g., '192.168.1.1/24')",
        ));
    };
    if ip.ends_with(".0") {
        return Err(ToolError::invalid(
            "router_prefix",
            "router_prefix cannot be the network address (e.g., use '192.168.1.1/24' not '192.168.1.0/24')",
        ));
    }
    Ok(())
}

pub fn validate_wg_prefix(prefix: &str) -> Result<(), ToolError> {
    if !prefix.is_empty() && !prefix.contains('/') {
        return Err(ToolError::invalid(
            "wg_prefix",
            "wg_prefix is expecting CIDR notation for the WireGuard IP address (e.g., '10.0.0.1/24')",
        ));
    }
    Ok(())
}

fn network_body(args: &Args) -> Result<Map<String, Value>, ToolError> {
    if let Some(prefix) = args.get("router_prefix").and_then(Value::as_str) {
        validate_router_prefix(prefix)?;
    }
    if let Some(prefix) = args.get("wg_prefix").and_then(Value::as_str) {
        validate_wg_prefix(prefix)?;
    }
    optional_string_array(args, "nameservers")?;
    Ok(pick(args, &NETWORK_FIELDS))
}

fn network_with_metadata(network: &Network, metadata: Metadata) -> Result<Value, ToolError> {
    let mut value = network_value(network)?;
    value["_metadata"] = metadata.into_value();
    Ok(value)
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("id"))?;
    let page: Page<Network> = ctx.api.list("/v1/network", &query).await?;
    let data = page
        .data
        .iter()
        .map(network_value)
        .collect::<Result<Vec<_>, _>>()?;
    let metadata = Metadata::new(
        "name",
        "Networks enable disaster recovery and isolated networking for virtual machines.",
    )
    .workflow("Networks can be standard (isolated) or bridge-lan (connected to device LAN). Virtual machines can be connected to networks.")
    .note(
        "wireguard_guidance",
        "Networks with WireGuard enabled will have WG peers that include ready-to-use configuration files in the _wireguard_config field.",
    )
    .note(
        "creation_guidance",
        "When creating new networks, ask users for clarification about configuration details rather than guessing. Key areas that often need clarification: network type (standard vs bridge-lan), bridge device selection, IP address ranges, DHCP configuration, internet access requirements, and WireGuard VPN needs.",
    )
    .note("clarification_guidance", CLARIFICATION)
    .note(
        "client_id_matching",
        "CRITICAL: When working with networks, agents and VMs assigned to the network MUST be part of the same client as the network. A network with client_id '' (empty string) can only be used with VMs that also have client_id ''. Mismatched client IDs will cause network assignment failures.",
    );
    render(&json!({
        "pagination": page.pagination,
        "data": data,
        "_metadata": metadata.into_value(),
    }))
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let network: Network = ctx.api.get(&format!("/v1/network/{network_id}")).await?;
    render(&network_with_metadata(
        &network,
        Metadata::new(
            "network_id",
            "Network configuration with associated services and peers.",
        )
        .note(
            "wireguard_guidance",
            "If this network has WireGuard enabled, WG peers will include ready-to-use configuration files in the _wireguard_config field.",
        ),
    )?)
}

async fn create(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let mut body = network_body(args)?;
    body.insert("name".to_string(), Value::String(required_string(args, "name")?));
    body.insert("type".to_string(), Value::String(required_string(args, "type")?));
    let network: Network = ctx
        .api
        .post("/v1/network", Some(&Value::Object(body)))
        .await?;
    let client_id = network.client_id.clone().unwrap_or_default();
    render(&network_with_metadata(
        &network,
        Metadata::new(
            "network_id",
            "Network created successfully. You can now connect virtual machines to this network or configure additional services.",
        )
        .note(
            "next_steps",
            format!(
                "You can now create virtual machines using this network_id with network_type: 'network-id' and network_source: '{}'",
                network.network_id
            ),
        )
        .note(
            "router_prefix_guidance",
            "The router_prefix is the IP address of the router that will be used to connect to the network. It should NOT be the network address (the first IP in the subnet). For example, use '192.168.1.1/24' not '192.168.1.0/24'.",
        )
        .note(
            "wireguard_guidance",
            "If WireGuard is enabled, you can create WG peers to allow VPN access to this network using slide_networks operation 'create_wg_peer'.",
        )
        .note(
            "client_id_constraint",
            format!(
                "CRITICAL: This network can only be used with VMs and agents that have the same client_id. If this network has client_id '{client_id}', then any VMs using network_type: 'network-id' with this network MUST also have the same client_id. Empty string client_id can only work with other empty string client_ids."
            ),
        )
        .note("clarification_guidance", CLARIFICATION),
    )?)
}

async fn update(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let body = network_body(args)?;
    let network: Network = ctx
        .api
        .patch(&format!("/v1/network/{network_id}"), &Value::Object(body))
        .await?;
    render(&network_with_metadata(
        &network,
        Metadata::new("network_id", "Network updated successfully.").note(
            "wireguard_guidance",
            "If WireGuard is enabled, existing WG peers will include ready-to-use configuration files in the _wireguard_config field.",
        ),
    )?)
}

async fn delete(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    ctx.api
        .delete(&format!("/v1/network/{network_id}"), None)
        .await?;
    render(&json!({"message": "Network deleted successfully"}))
}

fn required_string_array(args: &Args, key: &str) -> Result<Vec<String>, ToolError> {
    optional_string_array(args, key)?.ok_or_else(|| ToolError::missing(key))
}

async fn create_ipsec(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let body = json!({
        "name": required_string(args, "name")?,
        "remote_addrs": required_string_array(args, "remote_addrs")?,
        "remote_networks": required_string_array(args, "remote_networks")?,
    });
    let conn: NetworkIpsecConn = ctx
        .api
        .post(&format!("/v1/network/{network_id}/ipsec"), Some(&body))
        .await?;
    render(&conn)
}

async fn update_ipsec(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let ipsec_id = required_string(args, "ipsec_id")?;
    optional_string_array(args, "remote_addrs")?;
    optional_string_array(args, "remote_networks")?;
    let body = pick(args, &["name", "remote_addrs", "remote_networks"]);
    let conn: NetworkIpsecConn = ctx
        .api
        .patch(
            &format!("/v1/network/{network_id}/ipsec/{ipsec_id}"),
            &Value::Object(body),
        )
        .await?;
    render(&conn)
}

async fn delete_ipsec(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let ipsec_id = required_string(args, "ipsec_id")?;
    ctx.api
        .delete(&format!("/v1/network/{network_id}/ipsec/{ipsec_id}"), None)
        .await?;
    render(&json!({"message": "Network IPsec connection deleted successfully"}))
}

async fn create_port_forward(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let body = json!({
        "proto": required_string(args, "proto")?,
        "dest": required_string(args, "dest")?,
    });
    let forward: NetworkPortForward = ctx
        .api
        .post(&format!("/v1/network/{network_id}/port-forward"), Some(&body))
        .await?;
    render(&forward)
}

async fn update_port_forward(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let port_forward_id = required_string(args, "port_forward_id")?;
    let body = pick(args, &["proto", "dest"]);
    let forward: NetworkPortForward = ctx
        .api
        .patch(
            &format!("/v1/network/{network_id}/port-forward/{port_forward_id}"),
            &Value::Object(body),
        )
        .await?;
    render(&forward)
}

async fn delete_port_forward(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let port_forward_id = required_string(args, "port_forward_id")?;
    ctx.api
        .delete(
            &format!("/v1/network/{network_id}/port-forward/{port_forward_id}"),
            None,
        )
        .await?;
    render(&json!({"message": "Network port forward deleted successfully"}))
}

fn peer_metadata() -> Metadata {
    Metadata::new(
        "wg_peer_id",
        "WireGuard peer configuration for VPN access to the network.",
    )
    .note(
        "config_file_guidance",
        "Use the _wireguard_config field to get a ready-to-use WireGuard configuration file. Save this as a .conf file and import it into your WireGuard client.",
    )
    .note(
        "usage_instructions",
        "1. Save the _wireguard_config as a .conf file, 2. Import into WireGuard client, 3. Connect to access the specified remote networks.",
    )
}

/// Peer payload with a client config built from the parent network's server key.
async fn peer_response(
    ctx: &ToolContext,
    network_id: &str,
    peer: &NetworkWgPeer,
) -> Result<String, ToolError> {
    let network: Network = ctx
        .api
        .get(&format!("/v1/network/{network_id}"))
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to get network details: {}", e.message)))?;
    let mut value = wg_peer_value(peer, &network)?;
    value["_metadata"] = peer_metadata().into_value();
    render(&value)
}

async fn create_wg_peer(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let mut body = json!({"peer_name": required_string(args, "peer_name")?});
    if let Some(networks) = optional_string_array(args, "remote_networks")? {
        body["remote_networks"] = json!(networks);
    }
    let peer: NetworkWgPeer = ctx
        .api
        .post(&format!("/v1/network/{network_id}/wg-peer"), Some(&body))
        .await?;
    peer_response(ctx, &network_id, &peer).await
}

async fn update_wg_peer(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let wg_peer_id = required_string(args, "wg_peer_id")?;
    optional_string_array(args, "remote_networks")?;
    let body = pick(args, &["peer_name", "remote_networks"]);
    let peer: NetworkWgPeer = ctx
        .api
        .patch(
            &format!("/v1/network/{network_id}/wg-peer/{wg_peer_id}"),
            &Value::Object(body),
        )
        .await?;
    peer_response(ctx, &network_id, &peer).await
}

async fn delete_wg_peer(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let network_id = required_string(args, "network_id")?;
    let wg_peer_id = required_string(args, "wg_peer_id")?;
    ctx.api
        .delete(&format!("/v1/network/{network_id}/wg-peer/{wg_peer_id}"), None)
        .await?;
    render(&json!({"message": "Network WireGuard peer deleted successfully"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn router_prefix_rules() {
        assert!(validate_router_prefix("192.168.1.1/24").is_ok());
        assert!(validate_router_prefix("").is_ok());
        assert!(
            validate_router_prefix("192.168.1.1")
                .expect_err("no cidr")
                .message
                .contains("CIDR notation")
        );
        assert!(
            validate_router_prefix("192.168.1.0/24")
                .expect_err("network address")
                .message
                .contains("cannot be the network address")
        );
        assert!(validate_wg_prefix("10.0.0.1").is_err());
        assert!(validate_wg_prefix("10.0.0.1/24").is_ok());
    }

    #[tokio::test]
    async fn create_rejects_network_address_before_calling_api() {
        let server = MockServer::start().await;
        let err = create(
            &context_for(&server),
            &args(json!({"name": "lab", "type": "standard", "router_prefix": "10.1.0.0/24"})),
        )
        .await
        .expect_err("invalid prefix");
        assert_eq!(err.field.as_deref(), Some("router_prefix"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn get_attaches_wireguard_configs_to_peers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network_id": "n1",
                "wg": true,
                "wg_prefix": "10.8.0.0/24",
                "wg_public_key": "server-pub",
                "wg_peers": [{
                    "wg_peer_id": "p1",
                    "wg_private_key": "priv",
                    "wg_address": "10.8.0.2/32",
                    "wg_endpoint": "vpn:51820"
                }]
            })))
            .mount(&server)
            .await;

        let out = get(&context_for(&server), &args(json!({"network_id": "n1"})))
            .await
            .expect("get");
        let value: Value = serde_json::from_str(&out).expect("json");
        let config = value["wg_peers"][0]["_wireguard_config"]
            .as_str()
            .expect("config");
        assert!(config.contains("PublicKey = server-pub\n"));
        assert!(config.contains("AllowedIPs = 10.8.0.0/24\n"));
        assert_eq!(value["_metadata"]["primary_identifier"], "network_id");
    }

    #[tokio::test]
    async fn create_wg_peer_reads_server_key_from_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/network/n1/wg-peer"))
            .and(body_json(json!({"peer_name": "laptop", "remote_networks": ["192.168.5.0/24"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wg_peer_id": "p9",
                "peer_name": "laptop",
                "wg_private_key": "k",
                "wg_address": "10.8.0.9/32",
                "wg_endpoint": "vpn:51820",
                "remote_networks": ["192.168.5.0/24"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "network_id": "n1",
                "wg_public_key": "srv"
            })))
            .mount(&server)
            .await;

        let out = create_wg_peer(
            &context_for(&server),
            &args(json!({
                "network_id": "n1",
                "peer_name": "laptop",
                "remote_networks": ["192.168.5.0/24"]
            })),
        )
        .await
        .expect("peer");
        let value: Value = serde_json::from_str(&out).expect("json");
        let config = value["_wireguard_config"].as_str().expect("config");
        assert!(config.contains("PublicKey = srv\n"));
        assert!(config.contains("AllowedIPs = 192.168.5.0/24\n"));
    }

    #[tokio::test]
    async fn delete_port_forward_returns_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/network/n1/port-forward/pf1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let out = delete_port_forward(
            &context_for(&server),
            &args(json!({"network_id": "n1", "port_forward_id": "pf1"})),
        )
        .await
        .expect("deleted");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["message"], "Network port forward deleted successfully");
    }
}
