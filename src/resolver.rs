//! Permission resolution: flattening a role graph into permission strings.

use crate::{
    descriptor::DescriptorRegistry,
    graph::PolicyGraph,
    permission::any_implies,
    role::{RoleKey, DEFAULT_SOURCE},
};
use log::debug;
use std::collections::{HashSet, VecDeque};

/// Resolves roles into the permission strings they grant, directly or through the
/// roles they contain.
///
/// Resolution is total: missing roles, missing privileges and privileges whose
/// descriptor declines to compile are skipped. Each role is visited at most once, so
/// resolution terminates even on a graph with containment cycles.
pub struct RolePermissionResolver<'a> {
    graph: &'a PolicyGraph,
    registry: &'a DescriptorRegistry,
    default_source: &'a str,
}

impl<'a> RolePermissionResolver<'a> {
    pub fn new(graph: &'a PolicyGraph, registry: &'a DescriptorRegistry) -> Self {
        Self {
            graph,
            registry,
            default_source: DEFAULT_SOURCE,
        }
    }

    /// Resolve bare role ids in `source` instead of the default source.
    pub fn with_default_source(mut self, source: &'a str) -> Self {
        self.default_source = source;
        self
    }

    /// Permissions granted by the role `role_id` of the default source.
    pub fn resolve(&self, role_id: &str) -> HashSet<String> {
        self.resolve_key(&RoleKey::new(role_id, self.default_source))
    }

    /// Permissions granted by the role `key`.
    pub fn resolve_key(&self, key: &RoleKey) -> HashSet<String> {
        self.resolve_all(std::iter::once(key.clone()))
    }

    /// Union of the permissions granted by every role in `roots`.
    pub fn resolve_all(&self, roots: impl IntoIterator<Item = RoleKey>) -> HashSet<String> {
        let mut permissions = HashSet::new();
        let mut visited: HashSet<RoleKey> = HashSet::new();
        let mut queue: VecDeque<RoleKey> = roots.into_iter().collect();

        while let Some(key) = queue.pop_front() {
            if !visited.insert(key.clone()) {
                continue;
            }

            let Some(role) = self.graph.role(&key) else {
                debug!("Skipping unknown role '{key}' during resolution");
                continue;
            };

            queue.extend(
                role.contained_roles
                    .iter()
                    .filter(|contained| !visited.contains(*contained))
                    .cloned(),
            );

            for privilege_id in &role.privilege_ids {
                let Some(privilege) = self.graph.privilege(privilege_id) else {
                    debug!("Role '{key}' references unknown privilege '{privilege_id}'");
                    continue;
                };
                match self.registry.compile_permission(&privilege) {
                    Some(permission) => {
                        permissions.insert(permission);
                    }
                    None => debug!(
                        "Privilege '{privilege_id}' of type '{}' compiled to no permission",
                        privilege.privilege_type
                    ),
                }
            }
        }

        permissions
    }

    /// Permissions granted to a user through the roles of its default-source mapping.
    pub fn resolve_user(&self, user_id: &str) -> HashSet<String> {
        let Some(mapping) = self.graph.mapping(user_id, self.default_source) else {
            return HashSet::new();
        };
        self.resolve_all(
            mapping
                .roles
                .iter()
                .map(|id| RoleKey::new(id.clone(), mapping.source.clone())),
        )
    }

    /// Whether the role `role_id` grants `requested` under wildcard implication.
    pub fn is_permitted(&self, role_id: &str, requested: &str) -> bool {
        any_implies(&self.resolve(role_id), requested)
    }
}
