//! Shared helpers for the aggregating tools: whole-collection paging and a
//! per-call cache of agent, device and client lookups.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use slide_core::models::{Agent, Client, Device, Page};
use tokio::sync::RwLock;

use crate::args::ListQuery;
use crate::context::ToolContext;
use crate::error::ToolError;

pub const PAGE_SIZE: i64 = 50;

/// Follows `next_offset` until the collection is exhausted or stops advancing.
pub async fn collect_pages<T: DeserializeOwned>(
    ctx: &ToolContext,
    path: &str,
    filters: &[(&str, &str)],
    page_size: i64,
) -> Result<Vec<T>, ToolError> {
    let mut items = Vec::new();
    let mut offset = 0_i64;
    loop {
        let mut query = ListQuery::default()
            .with("limit", page_size.to_string())
            .with("offset", offset.to_string());
        for (key, value) in filters {
            query.push(*key, *value);
        }
        let page: Page<T> = ctx.api.list(path, &query).await?;
        let fetched = page.data.len();
        items.extend(page.data);
        match page.pagination.next_offset {
            Some(next) if next > offset && fetched > 0 => offset = next,
            _ => break,
        }
    }
    Ok(items)
}

/// Memoized entity lookups. Failed lookups are cached as misses too.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    agents: Arc<RwLock<HashMap<String, Option<Agent>>>>,
    devices: Arc<RwLock<HashMap<String, Option<Device>>>>,
    clients: Arc<RwLock<HashMap<String, Option<String>>>>,
}

impl Directory {
    pub async fn agent(&self, ctx: &ToolContext, agent_id: &str) -> Option<Agent> {
        if agent_id.is_empty() {
            return None;
        }
        if let Some(hit) = self.agents.read().await.get(agent_id) {
            return hit.clone();
        }
        let fetched = ctx
            .api
            .get::<Agent>(&format!("/v1/agent/{agent_id}"))
            .await
            .inspect_err(|e| tracing::debug!(event = "agent_lookup_failed", agent_id, error = %e))
            .ok();
        self.agents
            .write()
            .await
            .insert(agent_id.to_string(), fetched.clone());
        fetched
    }

    pub async fn device(&self, ctx: &ToolContext, device_id: &str) -> Option<Device> {
        if device_id.is_empty() {
            return None;
        }
        if let Some(hit) = self.devices.read().await.get(device_id) {
            return hit.clone();
        }
        let fetched = ctx
            .api
            .get::<Device>(&format!("/v1/device/{device_id}"))
            .await
            .inspect_err(|e| tracing::debug!(event = "device_lookup_failed", device_id, error = %e))
            .ok();
        self.devices
            .write()
            .await
            .insert(device_id.to_string(), fetched.clone());
        fetched
    }

    pub async fn client_name(&self, ctx: &ToolContext, client_id: &str) -> Option<String> {
        if client_id.is_empty() {
            return None;
        }
        if let Some(hit) = self.clients.read().await.get(client_id) {
            return hit.clone();
        }
        let fetched = ctx
            .api
            .get::<Client>(&format!("/v1/client/{client_id}"))
            .await
            .inspect_err(|e| tracing::debug!(event = "client_lookup_failed", client_id, error = %e))
            .ok()
            .map(|client| client.name);
        self.clients
            .write()
            .await
            .insert(client_id.to_string(), fetched.clone());
        fetched
    }
}

/// Human name for a device: display name, else hostname.
pub fn device_label(device: &Device) -> String {
    if device.display_name.is_empty() {
        device.hostname.clone()
    } else {
        device.display_name.clone()
    }
}

/// Human name for an agent: display name, else hostname.
pub fn agent_label(agent: &Agent) -> String {
    if agent.display_name.is_empty() {
        agent.hostname.clone()
    } else {
        agent.display_name.clone()
    }
}
