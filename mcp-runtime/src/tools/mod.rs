//! The Slide tool catalog.

pub mod agents;
pub mod alerts;
pub mod backups;
pub mod devices;
pub mod docs;
pub mod lookup;
pub mod meta;
pub mod networks;
pub mod presentation;
pub mod reports;
pub mod restores;
pub mod snapshots;
pub mod users;
pub mod vms;

use slide_core::policy::tools;

use crate::registry::{Registry, ToolSpec, op};

/// Every tool in `tools/list` order. Visibility is decided per call from the
/// server config, so the catalog itself is static.
pub fn catalog() -> Registry {
    Registry::new(vec![
        agents::spec(),
        backups::spec(),
        snapshots::spec(),
        restores::spec(),
        networks::spec(),
        users::spec(),
        alerts::spec(),
        devices::spec(),
        vms::spec(),
        presentation::spec(),
        reports::spec(),
        meta::spec(),
        docs::spec(),
        ToolSpec::alias(
            tools::HIERARCHY_ALIAS,
            "Get a hierarchical list of all clients, their devices, and the agents on each device. Equivalent to slide_meta with operation 'list_all_clients_devices_and_agents'.",
            op!(meta::HIERARCHY, meta::hierarchy),
        ),
    ])
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_names_are_unique_and_ordered() {
        let registry = catalog();
        let names: Vec<&str> = registry.iter().map(|tool| tool.name).collect();
        assert_eq!(names.first(), Some(&tools::AGENTS));
        assert_eq!(names.last(), Some(&tools::HIERARCHY_ALIAS));
        assert_eq!(names.len(), 14);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), names.len());
    }

    #[test]
    fn every_tool_has_operations_and_a_description() {
        for tool in catalog().iter() {
            assert!(tool.operations().next().is_some(), "{} has no operations", tool.name);
        }
        assert_eq!(
            catalog()
                .get(tools::HIERARCHY_ALIAS)
                .and_then(|tool| tool.fixed_operation()),
            Some(meta::HIERARCHY)
        );
    }
}
