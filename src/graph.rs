//! The in-memory policy graph and its flat snapshot form.

use crate::{
    privilege::Privilege,
    role::{Role, RoleKey},
    user::{User, UserRoleMapping},
};
use dashmap::DashMap;

/// A flat snapshot of the whole graph, as loaded from or stored to a
/// [`ConfigurationSource`](crate::storage::ConfigurationSource).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    pub privileges: Vec<Privilege>,
    pub roles: Vec<Role>,
    pub users: Vec<User>,
    pub user_role_mappings: Vec<UserRoleMapping>,
}

impl Configuration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the configuration holds no entities at all.
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
            && self.roles.is_empty()
            && self.users.is_empty()
            && self.user_role_mappings.is_empty()
    }
}

/// The policy graph, indexed for lookups by key.
///
/// Readers may share the graph across threads; mutation is serialized by the
/// [`ConfigurationManager`](crate::manager::ConfigurationManager) that owns it.
#[derive(Debug, Default)]
pub struct PolicyGraph {
    privileges: DashMap<String, Privilege>,
    roles: DashMap<RoleKey, Role>,
    users: DashMap<String, User>,
    mappings: DashMap<(String, String), UserRoleMapping>,
}

fn sorted_values<K, V>(map: &DashMap<K, V>) -> Vec<V>
where
    K: Ord + Clone + Eq + std::hash::Hash,
    V: Clone,
{
    let mut entries: Vec<(K, V)> = map
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().map(|(_, value)| value).collect()
}

impl PolicyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a snapshot. Later duplicates of a key replace earlier ones.
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let graph = Self::new();
        for privilege in &configuration.privileges {
            graph.insert_privilege(privilege.clone());
        }
        for role in &configuration.roles {
            graph.insert_role(role.clone());
        }
        for user in &configuration.users {
            graph.insert_user(user.clone());
        }
        for mapping in &configuration.user_role_mappings {
            graph.insert_mapping(mapping.clone());
        }
        graph
    }

    /// Flatten into a snapshot with every list sorted by key.
    pub fn to_configuration(&self) -> Configuration {
        Configuration {
            privileges: self.privileges(),
            roles: self.roles(),
            users: self.users(),
            user_role_mappings: self.mappings(),
        }
    }

    pub fn privilege(&self, id: &str) -> Option<Privilege> {
        self.privileges.get(id).map(|p| p.clone())
    }

    pub fn contains_privilege(&self, id: &str) -> bool {
        self.privileges.contains_key(id)
    }

    pub fn insert_privilege(&self, privilege: Privilege) -> Option<Privilege> {
        self.privileges.insert(privilege.id.clone(), privilege)
    }

    pub fn remove_privilege(&self, id: &str) -> Option<Privilege> {
        self.privileges.remove(id).map(|(_, privilege)| privilege)
    }

    /// All privileges sorted by id.
    pub fn privileges(&self) -> Vec<Privilege> {
        sorted_values(&self.privileges)
    }

    pub fn role(&self, key: &RoleKey) -> Option<Role> {
        self.roles.get(key).map(|r| r.clone())
    }

    pub fn contains_role(&self, key: &RoleKey) -> bool {
        self.roles.contains_key(key)
    }

    pub fn insert_role(&self, role: Role) -> Option<Role> {
        self.roles.insert(role.key.clone(), role)
    }

    pub fn remove_role(&self, key: &RoleKey) -> Option<Role> {
        self.roles.remove(key).map(|(_, role)| role)
    }

    /// All roles sorted by key.
    pub fn roles(&self) -> Vec<Role> {
        sorted_values(&self.roles)
    }

    /// Apply `f` to every role in place.
    pub fn for_each_role_mut(&self, mut f: impl FnMut(&mut Role)) {
        for mut entry in self.roles.iter_mut() {
            f(entry.value_mut());
        }
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.users.get(id).map(|u| u.clone())
    }

    pub fn contains_user(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    pub fn insert_user(&self, user: User) -> Option<User> {
        self.users.insert(user.id.clone(), user)
    }

    pub fn remove_user(&self, id: &str) -> Option<User> {
        self.users.remove(id).map(|(_, user)| user)
    }

    /// All users sorted by id.
    pub fn users(&self) -> Vec<User> {
        sorted_values(&self.users)
    }

    pub fn mapping(&self, user_id: &str, source: &str) -> Option<UserRoleMapping> {
        self.mappings
            .get(&(user_id.to_string(), source.to_string()))
            .map(|m| m.clone())
    }

    pub fn contains_mapping(&self, user_id: &str, source: &str) -> bool {
        self.mappings
            .contains_key(&(user_id.to_string(), source.to_string()))
    }

    pub fn insert_mapping(&self, mapping: UserRoleMapping) -> Option<UserRoleMapping> {
        self.mappings.insert(mapping.key(), mapping)
    }

    pub fn remove_mapping(&self, user_id: &str, source: &str) -> Option<UserRoleMapping> {
        self.mappings
            .remove(&(user_id.to_string(), source.to_string()))
            .map(|(_, mapping)| mapping)
    }

    /// All mappings sorted by `(user_id, source)`.
    pub fn mappings(&self) -> Vec<UserRoleMapping> {
        sorted_values(&self.mappings)
    }

    /// Apply `f` to every mapping in place.
    pub fn for_each_mapping_mut(&self, mut f: impl FnMut(&mut UserRoleMapping)) {
        for mut entry in self.mappings.iter_mut() {
            f(entry.value_mut());
        }
    }

    pub fn privilege_count(&self) -> usize {
        self.privileges.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}
