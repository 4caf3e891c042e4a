//! Aggregated views across clients, devices, agents and snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use slide_core::models::{Agent, Client, Device, Snapshot};
use slide_core::policy::tools;

use crate::args::{Args, arg_bool, optional_string, required_string};
use crate::context::ToolContext;
use crate::enrich::{render, to_value};
use crate::error::ToolError;
use crate::registry::{Gate, ToolSpec, op, properties, require_when};
use crate::tools::lookup::{Directory, PAGE_SIZE, agent_label, collect_pages, device_label};

pub const HIERARCHY: &str = "list_all_clients_devices_and_agents";
pub const UNASSIGNED_CLIENT: &str = "[Unassigned]";

/// Detailed snapshot-change lists stop growing past this many entries.
pub const DETAIL_LIMIT: usize = 100;

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::META,
        "Meta tools for reporting and aggregated data views. Provides hierarchical views and time-based snapshot analysis.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                json!({
                    "period": {"type": "string", "description": "Time period for snapshot changes - used with 'get_snapshot_changes' operation", "enum": ["day", "week", "month"]},
                    "summary_only": {"type": "boolean", "description": "Return only summary counts without detailed snapshot lists (reduces output size) - default: false"},
                    "client_id": {"type": "string", "description": "Filter by client ID - optional for time-based operations"},
                    "device_id": {"type": "string", "description": "Filter by device ID - optional for time-based operations"},
                    "agent_id": {"type": "string", "description": "Filter by agent ID - optional for time-based operations"},
                    "report_type": {"type": "string", "description": "Type of report data to generate - used with 'get_reporting_data' operation", "enum": ["daily", "weekly", "monthly"]}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get_snapshot_changes", &["period"]),
                ("get_reporting_data", &["report_type"]),
            ]),
        }),
    )
    .operation(op!(HIERARCHY, hierarchy))
    .operation(op!("get_snapshot_changes", snapshot_changes).gated(Gate::ReportingFeatures))
    .operation(op!("get_reporting_data", reporting_data).gated(Gate::ReportingFeatures))
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentNode {
    pub agent_id: String,
    pub display_name: String,
    pub hostname: String,
    pub last_seen_at: String,
    pub platform: String,
    pub os: String,
    pub os_version: String,
}

impl From<Agent> for AgentNode {
    fn from(agent: Agent) -> Self {
        Self {
            agent_id: agent.agent_id,
            display_name: agent.display_name,
            hostname: agent.hostname,
            last_seen_at: agent.last_seen_at,
            platform: agent.platform,
            os: agent.os,
            os_version: agent.os_version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceNode {
    pub device_id: String,
    pub hostname: String,
    pub display_name: String,
    pub last_seen_at: String,
    pub service_status: String,
    pub agents: Vec<AgentNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientNode {
    pub client_id: String,
    pub name: String,
    pub comments: String,
    pub devices: Vec<DeviceNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices_error: Option<String>,
}

async fn device_node(ctx: &ToolContext, device: Device) -> DeviceNode {
    let agents = collect_pages::<Agent>(
        ctx,
        "/v1/agent",
        &[("device_id", device.device_id.as_str())],
        PAGE_SIZE,
    )
    .await;
    let (agents, agents_error) = match agents {
        Ok(agents) => (agents.into_iter().map(AgentNode::from).collect(), None),
        Err(e) => (Vec::new(), Some(format!("Failed to get agents: {}", e.message))),
    };
    DeviceNode {
        device_id: device.device_id,
        hostname: device.hostname,
        display_name: device.display_name,
        last_seen_at: device.last_seen_at,
        service_status: device.service_status,
        agents,
        agents_error,
    }
}

/// Clients, their devices and each device's agents. Devices without a client
/// are grouped under a synthetic `[Unassigned]` client listed first.
pub async fn build_hierarchy(ctx: &ToolContext) -> Result<Vec<ClientNode>, ToolError> {
    let clients: Vec<Client> = collect_pages(ctx, "/v1/client", &[], PAGE_SIZE)
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to get clients: {}", e.message)))?;
    let all_devices: Vec<Device> = collect_pages(ctx, "/v1/device", &[], PAGE_SIZE)
        .await
        .map_err(|e| {
            ToolError::new(e.code, format!("failed to get unassigned devices: {}", e.message))
        })?;

    let mut nodes = Vec::with_capacity(clients.len() + 1);
    let unassigned: Vec<Device> = all_devices
        .into_iter()
        .filter(Device::is_unassigned)
        .collect();
    if !unassigned.is_empty() {
        let mut devices = Vec::with_capacity(unassigned.len());
        for device in unassigned {
            devices.push(device_node(ctx, device).await);
        }
        nodes.push(ClientNode {
            client_id: String::new(),
            name: UNASSIGNED_CLIENT.to_string(),
            comments: "Devices not assigned to any specific client".to_string(),
            devices,
            devices_error: None,
        });
    }

    for client in clients {
        let listed = collect_pages::<Device>(
            ctx,
            "/v1/device",
            &[("client_id", client.client_id.as_str())],
            PAGE_SIZE,
        )
        .await;
        let mut node = ClientNode {
            client_id: client.client_id,
            name: client.name,
            comments: client.comments,
            devices: Vec::new(),
            devices_error: None,
        };
        match listed {
            Ok(devices) => {
                for device in devices {
                    node.devices.push(device_node(ctx, device).await);
                }
            }
            Err(e) => node.devices_error = Some(format!("Failed to get devices: {}", e.message)),
        }
        nodes.push(node);
    }
    Ok(nodes)
}

/// The hierarchy view as returned by the tool and embedded in `initialize`.
pub async fn hierarchy_view(ctx: &ToolContext) -> Result<Value, ToolError> {
    let clients = build_hierarchy(ctx).await?;
    Ok(json!({
        "clients": clients,
        "_metadata": {
            "description": "Complete hierarchy of clients, devices, and agents",
            "structure": "clients -> devices -> agents",
            "client_identification": "Clients are identified by name. '[Unassigned]' represents devices not assigned to any client.",
            "device_identification": "Devices are identified by hostname (the primary human-readable identifier).",
            "agent_identification": "Agents are identified by display_name (or hostname if display_name is empty).",
            "relationships": {
                "client_to_device": "One client can have multiple devices",
                "device_to_agent": "One device can have multiple agents (backup software instances)"
            },
            "workflow_guidance": "This gives you a complete overview of the backup infrastructure. Clients are organizational units (often customers in MSP scenarios), devices are the Slide appliances, and agents are the backup software installed on computers."
        }
    }))
}

pub(crate) async fn hierarchy(ctx: &ToolContext, _args: &Args) -> Result<String, ToolError> {
    render(&hierarchy_view(ctx).await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub fn parse(value: &str) -> Result<Self, ToolError> {
        match value {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(ToolError::invalid("period", format!("invalid period: {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Start of the window ending at `now`.
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::Day => now - Duration::days(1),
            Period::Week => now - Duration::days(7),
            Period::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotChange {
    pub snapshot_id: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_started_at: Option<String>,
    pub backup_ended_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSummary {
    pub total_new: usize,
    pub total_deleted: usize,
    pub new_by_agent_count: usize,
    pub deleted_by_agent_count: usize,
}

#[derive(Debug, Clone)]
pub struct SnapshotChanges {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub new: Vec<SnapshotChange>,
    pub deleted: Vec<SnapshotChange>,
    pub summary: ChangeSummary,
}

/// Classifies active and deleted snapshots against the window `(start, end)`.
pub fn classify_changes(
    active: &[Snapshot],
    deleted: &[Snapshot],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    keep_details: bool,
) -> (Vec<SnapshotChange>, Vec<SnapshotChange>, ChangeSummary) {
    let in_window = |t: DateTime<Utc>| t > start && t < end;
    let mut summary = ChangeSummary::default();
    let mut new_agents = BTreeSet::new();
    let mut deleted_agents = BTreeSet::new();
    let mut new = Vec::new();
    let mut removed = Vec::new();

    for snapshot in active {
        let Some(ended) = parse_time(&snapshot.backup_ended_at) else {
            continue;
        };
        if !in_window(ended) {
            continue;
        }
        summary.total_new += 1;
        new_agents.insert(snapshot.agent_id.as_str());
        if keep_details && new.len() < DETAIL_LIMIT {
            new.push(SnapshotChange {
                snapshot_id: snapshot.snapshot_id.clone(),
                agent_id: snapshot.agent_id.clone(),
                backup_started_at: Some(snapshot.backup_started_at.clone()),
                backup_ended_at: snapshot.backup_ended_at.clone(),
                deleted_at: None,
                deletion_type: None,
                agent_name: None,
                device_id: None,
                device_name: None,
            });
        }
    }

    for snapshot in deleted.iter().filter(|s| s.is_deleted()) {
        for deletion in &snapshot.deletions {
            let Some(at) = parse_time(&deletion.deleted) else {
                continue;
            };
            if !in_window(at) {
                continue;
            }
            summary.total_deleted += 1;
            deleted_agents.insert(snapshot.agent_id.as_str());
            if keep_details && removed.len() < DETAIL_LIMIT {
                removed.push(SnapshotChange {
                    snapshot_id: snapshot.snapshot_id.clone(),
                    agent_id: snapshot.agent_id.clone(),
                    backup_started_at: None,
                    backup_ended_at: snapshot.backup_ended_at.clone(),
                    deleted_at: Some(deletion.deleted.clone()),
                    deletion_type: Some(deletion.kind.clone()),
                    agent_name: None,
                    device_id: None,
                    device_name: None,
                });
            }
        }
    }

    summary.new_by_agent_count = new_agents.len();
    summary.deleted_by_agent_count = deleted_agents.len();
    (new, removed, summary)
}

async fn resolve_names(ctx: &ToolContext, directory: &Directory, change: &mut SnapshotChange) {
    let Some(agent) = directory.agent(ctx, &change.agent_id).await else {
        return;
    };
    change.agent_name = Some(agent_label(&agent));
    if let Some(device) = directory.device(ctx, &agent.device_id).await {
        change.device_name = Some(device_label(&device));
    }
    change.device_id = Some(agent.device_id);
}

/// Collects snapshot changes for the window ending now. Detail entries get
/// their agent and device names resolved when `summary_only` is off.
pub async fn collect_changes(
    ctx: &ToolContext,
    period: Period,
    filters: &[(&str, &str)],
    summary_only: bool,
) -> Result<SnapshotChanges, ToolError> {
    let end = Utc::now();
    let start = period.start(end);

    let mut active_filters = filters.to_vec();
    active_filters.push(("snapshot_location", "exists_cloud"));
    let active: Vec<Snapshot> = collect_pages(ctx, "/v1/snapshot", &active_filters, PAGE_SIZE)
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to get snapshots: {}", e.message)))?;

    let mut deleted_filters = filters.to_vec();
    deleted_filters.push(("snapshot_location", "exists_deleted"));
    let deleted: Vec<Snapshot> = collect_pages(ctx, "/v1/snapshot", &deleted_filters, PAGE_SIZE)
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to get snapshots: {}", e.message)))?;

    let (mut new, mut removed, summary) =
        classify_changes(&active, &deleted, start, end, !summary_only);

    let directory = Directory::default();
    for change in new.iter_mut().chain(removed.iter_mut()) {
        resolve_names(ctx, &directory, change).await;
    }

    Ok(SnapshotChanges {
        period,
        start,
        end,
        new,
        deleted: removed,
        summary,
    })
}

fn window_filters(args: &Args) -> Result<Vec<(&'static str, String)>, ToolError> {
    let mut filters = Vec::new();
    for key in ["client_id", "device_id", "agent_id"] {
        if let Some(value) = optional_string(args, key)? {
            filters.push((key, value));
        }
    }
    Ok(filters)
}

async fn snapshot_changes(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let period = Period::parse(&required_string(args, "period")?)?;
    let summary_only = arg_bool(args, "summary_only", false)?;
    let owned = window_filters(args)?;
    let filters: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let changes = collect_changes(ctx, period, &filters, summary_only).await?;
    let label = changes.period.as_str();
    if summary_only {
        return render(&json!({
            "period": label,
            "start_time": rfc3339(changes.start),
            "end_time": rfc3339(changes.end),
            "summary": changes.summary,
            "_metadata": {
                "description": format!("Summary of snapshot changes over the last {label}"),
                "mode": "summary_only",
                "note": "Use summary_only=false to get detailed snapshot lists (limited to 100 each)"
            }
        }));
    }

    let summary = &changes.summary;
    let mut metadata = json!({
        "description": format!("Snapshot changes over the last {label}"),
        "mode": "detailed",
        "limit_notice": "Detailed results are limited to 100 snapshots each to prevent excessive data",
    });
    if summary.total_new > DETAIL_LIMIT || summary.total_deleted > DETAIL_LIMIT {
        metadata["truncated"] = json!(true);
        metadata["truncation_message"] = json!(format!(
            "Showing {} of {} new and {} of {} deleted snapshots",
            changes.new.len(),
            summary.total_new,
            changes.deleted.len(),
            summary.total_deleted
        ));
    }
    render(&json!({
        "period": label,
        "start_time": rfc3339(changes.start),
        "end_time": rfc3339(changes.end),
        "new_snapshots": changes.new,
        "deleted_snapshots": changes.deleted,
        "summary": {
            "total_new": summary.total_new,
            "total_deleted": summary.total_deleted,
            "shown_new": changes.new.len(),
            "shown_deleted": changes.deleted.len(),
            "new_by_agent_count": summary.new_by_agent_count,
            "deleted_by_agent_count": summary.deleted_by_agent_count,
        },
        "_metadata": metadata,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientMetrics {
    pub client_id: String,
    pub client_name: String,
    pub device_count: usize,
    pub agent_count: usize,
    pub active_devices: usize,
    pub online_agents: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetMetrics {
    pub total_clients: usize,
    pub total_devices: usize,
    pub total_agents: usize,
    pub devices_active: usize,
    pub agents_online: usize,
}

/// Counts the hierarchy, treating anything seen within 24 hours of `now` as active.
pub fn fleet_metrics(clients: &[ClientNode], now: DateTime<Utc>) -> (FleetMetrics, Vec<ClientMetrics>) {
    let recent = |seen: &str| parse_time(seen).is_some_and(|t| now - t < Duration::hours(24));
    let mut fleet = FleetMetrics {
        total_clients: clients.len(),
        ..Default::default()
    };
    let mut per_client = Vec::with_capacity(clients.len());
    for client in clients {
        let mut metrics = ClientMetrics {
            client_id: client.client_id.clone(),
            client_name: client.name.clone(),
            device_count: client.devices.len(),
            ..Default::default()
        };
        for device in &client.devices {
            metrics.agent_count += device.agents.len();
            if recent(&device.last_seen_at) {
                metrics.active_devices += 1;
            }
            metrics.online_agents += device
                .agents
                .iter()
                .filter(|agent| recent(&agent.last_seen_at))
                .count();
        }
        fleet.total_devices += metrics.device_count;
        fleet.total_agents += metrics.agent_count;
        fleet.devices_active += metrics.active_devices;
        fleet.agents_online += metrics.online_agents;
        per_client.push(metrics);
    }
    (fleet, per_client)
}

async fn reporting_data(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let report_type = required_string(args, "report_type")?;
    let (period, days_back) = match report_type.as_str() {
        "daily" => (Period::Day, 1),
        "weekly" => (Period::Week, 7),
        "monthly" => (Period::Month, 30),
        other => {
            return Err(ToolError::invalid(
                "report_type",
                format!("invalid report_type: {other}"),
            ));
        }
    };

    let clients = build_hierarchy(ctx)
        .await
        .map_err(|e| ToolError::new(e.code, format!("failed to get hierarchy: {}", e.message)))?;
    let changes = collect_changes(ctx, period, &[], true)
        .await
        .map_err(|e| {
            ToolError::new(e.code, format!("failed to get snapshot changes: {}", e.message))
        })?;
    let now = Utc::now();
    let (fleet, per_client) = fleet_metrics(&clients, now);

    let mut metrics = to_value(&fleet)?;
    metrics["new_snapshots"] = json!(changes.summary.total_new);
    metrics["deleted_snapshots"] = json!(changes.summary.total_deleted);

    render(&json!({
        "report_type": report_type,
        "report_date": now.format("%B %-d, %Y").to_string(),
        "report_period": format!("Last {days_back} days"),
        "metrics": metrics,
        "client_metrics": per_client,
        "snapshot_summary": changes.summary,
        "_metadata": {
            "description": format!("Pre-formatted data for {report_type} report template"),
            "usage": "Use this data to populate report templates. All metrics are pre-calculated and formatted for easy insertion.",
            "note": "Full hierarchy data not included by default to reduce size. Use list_all_clients_devices_and_agents separately if needed.",
            "template_placeholders": {
                "daily": [
                    "REPORT_DATE", "TOTAL_SUCCESSFUL_SNAPSHOTS", "TOTAL_FAILED_SNAPSHOTS",
                    "TOTAL_CLIENTS", "TOTAL_DEVICES", "AGENTS_ONLINE", "TOTAL_AGENTS",
                    "DEVICES_ACTIVE", "SNAPSHOTS_TODAY", "CLIENT_NAME", "DEVICE_NAME"
                ],
                "monthly": [
                    "REPORT_MONTH_YEAR", "TOTAL_MONTHLY_SNAPSHOTS", "TOTAL_FAILED_SNAPSHOTS",
                    "TOTAL_DELETED_SNAPSHOTS", "ACTIVE_DAYS", "TOTAL_DATA_SIZE",
                    "RETENTION_RULES", "SNAPSHOTS_DELETED_COUNT", "SPACE_FREED"
                ]
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot(value: Value) -> Snapshot {
        serde_json::from_value(value).expect("snapshot")
    }

    #[test]
    fn month_window_steps_back_one_calendar_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).single().expect("time");
        assert_eq!(
            Period::Month.start(now),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).single().expect("time")
        );
        assert_eq!(Period::Day.start(now), now - Duration::days(1));
        assert!(Period::parse("year").is_err());
    }

    #[test]
    fn classify_counts_each_deletion_event_in_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).single().expect("time");
        let start = Period::Week.start(now);
        let active = vec![
            snapshot(json!({"snapshot_id": "s1", "agent_id": "a1", "backup_ended_at": "2024-06-09T10:00:00Z"})),
            snapshot(json!({"snapshot_id": "s2", "agent_id": "a1", "backup_ended_at": "2024-05-01T10:00:00Z"})),
            snapshot(json!({"snapshot_id": "s3", "agent_id": "a2", "backup_ended_at": "not-a-time"})),
        ];
        let deleted = vec![snapshot(json!({
            "snapshot_id": "s4",
            "agent_id": "a2",
            "backup_ended_at": "2024-05-20T10:00:00Z",
            "deleted": "2024-06-08T00:00:00Z",
            "deletions": [
                {"type": "retention", "deleted": "2024-06-08T00:00:00Z", "deleted_by": "system"},
                {"type": "manual", "deleted": "2024-06-09T00:00:00Z", "deleted_by": "ops"},
                {"type": "manual", "deleted": "2024-01-01T00:00:00Z", "deleted_by": "ops"}
            ]
        }))];

        let (new, removed, summary) = classify_changes(&active, &deleted, start, now, true);
        assert_eq!(summary.total_new, 1);
        assert_eq!(summary.total_deleted, 2);
        assert_eq!(summary.new_by_agent_count, 1);
        assert_eq!(summary.deleted_by_agent_count, 1);
        assert_eq!(new[0].snapshot_id, "s1");
        assert_eq!(removed[1].deletion_type.as_deref(), Some("manual"));

        let (new, removed, _) = classify_changes(&active, &deleted, start, now, false);
        assert!(new.is_empty() && removed.is_empty());
    }

    #[test]
    fn fleet_metrics_count_recent_activity() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).single().expect("time");
        let agent = |id: &str, seen: &str| AgentNode {
            agent_id: id.into(),
            display_name: id.into(),
            hostname: String::new(),
            last_seen_at: seen.into(),
            platform: String::new(),
            os: String::new(),
            os_version: String::new(),
        };
        let clients = vec![ClientNode {
            client_id: "c1".into(),
            name: "Acme".into(),
            comments: String::new(),
            devices: vec![DeviceNode {
                device_id: "d1".into(),
                hostname: "slide-01".into(),
                display_name: String::new(),
                last_seen_at: "2024-06-10T08:00:00Z".into(),
                service_status: "ok".into(),
                agents: vec![
                    agent("a1", "2024-06-10T11:00:00Z"),
                    agent("a2", "2024-06-01T11:00:00Z"),
                ],
                agents_error: None,
            }],
            devices_error: None,
        }];

        let (fleet, per_client) = fleet_metrics(&clients, now);
        assert_eq!(
            fleet,
            FleetMetrics {
                total_clients: 1,
                total_devices: 1,
                total_agents: 2,
                devices_active: 1,
                agents_online: 1,
            }
        );
        assert_eq!(per_client[0].client_name, "Acme");
        assert_eq!(per_client[0].online_agents, 1);
    }

    #[tokio::test]
    async fn hierarchy_groups_unassigned_devices_and_keeps_partial_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"client_id": "c1", "name": "Acme"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/device"))
            .and(query_param("client_id", "c1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/device"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 2},
                "data": [
                    {"device_id": "d0", "hostname": "orphan"},
                    {"device_id": "d1", "hostname": "owned", "client_id": "c1"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/agent"))
            .and(query_param("device_id", "d0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"agent_id": "a1", "display_name": "DC01"}]
            })))
            .mount(&server)
            .await;

        let out = hierarchy(&context_for(&server), &args(json!({})))
            .await
            .expect("hierarchy");
        let value: Value = serde_json::from_str(&out).expect("json");
        let clients = value["clients"].as_array().expect("clients");
        assert_eq!(clients[0]["name"], UNASSIGNED_CLIENT);
        assert_eq!(clients[0]["devices"][0]["agents"][0]["agent_id"], "a1");
        assert_eq!(clients[1]["name"], "Acme");
        assert!(
            clients[1]["devices_error"]
                .as_str()
                .expect("error")
                .starts_with("Failed to get devices:")
        );
    }
}
