//! Post-delete cleanup of dangling references.

use crate::{graph::PolicyGraph, role::RoleKey};
use log::debug;

/// Scrubs references to a deleted entity out of the surviving graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationCleaner;

impl ConfigurationCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Remove `privilege_id` from every role's privilege list.
    pub fn privilege_removed(&self, graph: &PolicyGraph, privilege_id: &str) -> usize {
        let mut cleaned = 0;
        graph.for_each_role_mut(|role| {
            if role.privilege_ids.remove(privilege_id) {
                cleaned += 1;
            }
        });
        debug!("Removed privilege '{privilege_id}' from {cleaned} role(s)");
        cleaned
    }

    /// Remove `key` from every role's containment list and its id from every mapping of
    /// the same source.
    pub fn role_removed(&self, graph: &PolicyGraph, key: &RoleKey) -> usize {
        let mut cleaned = 0;
        graph.for_each_role_mut(|role| {
            if role.contained_roles.remove(key) {
                cleaned += 1;
            }
        });
        graph.for_each_mapping_mut(|mapping| {
            if mapping.source == key.source && mapping.roles.remove(&key.id) {
                cleaned += 1;
            }
        });
        debug!("Removed role '{key}' from {cleaned} role(s) and mapping(s)");
        cleaned
    }
}
