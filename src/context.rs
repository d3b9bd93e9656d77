//! The per-batch working set threaded through validation.
//!
//! A [`ValidationContext`] is built once per edit (or per batch of edits), usually by
//! [`ConfigurationManager::initialize_context`](crate::manager::ConfigurationManager::initialize_context),
//! and then updated by the validator as each entity is accepted, so later checks in the
//! same batch see earlier entities as already existing.
//!
//! The id indices are optional. An absent index means "not known for this batch": the
//! checks that depend on it are skipped. The `ensure_*` methods create an index on
//! demand, which is how a lone entity is validated without loading anything else.

use crate::role::RoleKey;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Indices describing the graph as seen by one validation batch.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    existing_privilege_ids: Option<HashSet<String>>,
    existing_role_ids: Option<HashMap<String, HashSet<String>>>,
    existing_user_ids: Option<HashSet<String>>,
    existing_role_mappings: Option<HashSet<(String, String)>>,
    existing_user_role_map: Option<HashMap<String, BTreeSet<String>>>,
    role_name_map: HashMap<RoleKey, String>,
    role_containment_map: HashMap<RoleKey, Vec<RoleKey>>,
}

impl ValidationContext {
    /// Create an empty context with no indices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with every index present and empty.
    pub fn sealed() -> Self {
        let mut context = Self::new();
        context.ensure_privilege_ids();
        context.ensure_role_ids();
        context.ensure_user_ids();
        context.ensure_role_mappings();
        context.ensure_user_role_map();
        context
    }

    pub fn ensure_privilege_ids(&mut self) -> &mut HashSet<String> {
        self.existing_privilege_ids.get_or_insert_with(HashSet::new)
    }

    pub fn ensure_role_ids(&mut self) -> &mut HashMap<String, HashSet<String>> {
        self.existing_role_ids.get_or_insert_with(HashMap::new)
    }

    pub fn ensure_user_ids(&mut self) -> &mut HashSet<String> {
        self.existing_user_ids.get_or_insert_with(HashSet::new)
    }

    pub fn ensure_role_mappings(&mut self) -> &mut HashSet<(String, String)> {
        self.existing_role_mappings.get_or_insert_with(HashSet::new)
    }

    pub fn ensure_user_role_map(&mut self) -> &mut HashMap<String, BTreeSet<String>> {
        self.existing_user_role_map.get_or_insert_with(HashMap::new)
    }

    /// Known privilege ids, if the privilege set is sealed for this batch.
    pub fn privilege_ids(&self) -> Option<&HashSet<String>> {
        self.existing_privilege_ids.as_ref()
    }

    /// Known role ids per source.
    pub fn role_ids(&self) -> Option<&HashMap<String, HashSet<String>>> {
        self.existing_role_ids.as_ref()
    }

    /// Known user ids.
    pub fn user_ids(&self) -> Option<&HashSet<String>> {
        self.existing_user_ids.as_ref()
    }

    /// Known `(user_id, source)` mapping pairs.
    pub fn role_mappings(&self) -> Option<&HashSet<(String, String)>> {
        self.existing_role_mappings.as_ref()
    }

    /// Granted role ids per user.
    pub fn user_role_map(&self) -> Option<&HashMap<String, BTreeSet<String>>> {
        self.existing_user_role_map.as_ref()
    }

    /// Role names by key.
    pub fn role_name_map(&self) -> &HashMap<RoleKey, String> {
        &self.role_name_map
    }

    pub fn role_name_map_mut(&mut self) -> &mut HashMap<RoleKey, String> {
        &mut self.role_name_map
    }

    /// Direct containment links by role key.
    pub fn role_containment_map(&self) -> &HashMap<RoleKey, Vec<RoleKey>> {
        &self.role_containment_map
    }

    pub fn role_containment_map_mut(&mut self) -> &mut HashMap<RoleKey, Vec<RoleKey>> {
        &mut self.role_containment_map
    }

    /// Whether the context holds role ids for `source`, i.e. it can judge references
    /// into that source.
    pub fn is_authoritative_for(&self, source: &str) -> bool {
        self.existing_role_ids
            .as_ref()
            .is_some_and(|ids| ids.contains_key(source))
    }

    /// Whether `key` is a known role.
    pub fn role_exists(&self, key: &RoleKey) -> bool {
        self.existing_role_ids
            .as_ref()
            .and_then(|ids| ids.get(&key.source))
            .is_some_and(|ids| ids.contains(&key.id))
    }

    /// Whether some role other than `key` in the same source already uses `name`.
    pub fn is_role_name_taken(&self, key: &RoleKey, name: &str) -> bool {
        self.role_name_map
            .iter()
            .any(|(other, other_name)| other != key && other.source == key.source && other_name == name)
    }

    /// A display string for a role: its name if known, else its id.
    pub fn role_display(&self, key: &RoleKey) -> String {
        match self.role_name_map.get(key) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => key.id.clone(),
        }
    }

    /// Record a role id as existing.
    pub fn record_role_id(&mut self, key: &RoleKey) {
        self.ensure_role_ids()
            .entry(key.source.clone())
            .or_default()
            .insert(key.id.clone());
    }

    /// Register `source` as locally authoritative even when it has no roles yet.
    pub fn record_source(&mut self, source: &str) {
        self.ensure_role_ids().entry(source.to_string()).or_default();
    }

    /// Drop a deleted privilege from the indices.
    pub fn forget_privilege(&mut self, id: &str) {
        if let Some(ids) = self.existing_privilege_ids.as_mut() {
            ids.remove(id);
        }
    }

    /// Drop a deleted role, including every containment link pointing at it. The
    /// source stays authoritative.
    pub fn forget_role(&mut self, key: &RoleKey) {
        if let Some(ids) = self
            .existing_role_ids
            .as_mut()
            .and_then(|ids| ids.get_mut(&key.source))
        {
            ids.remove(&key.id);
        }
        self.role_name_map.remove(key);
        self.role_containment_map.remove(key);
        for contained in self.role_containment_map.values_mut() {
            contained.retain(|other| other != key);
        }
    }

    /// Drop a deleted user.
    pub fn forget_user(&mut self, id: &str) {
        if let Some(ids) = self.existing_user_ids.as_mut() {
            ids.remove(id);
        }
        if let Some(map) = self.existing_user_role_map.as_mut() {
            map.remove(id);
        }
    }

    /// Drop a deleted `(user_id, source)` mapping.
    pub fn forget_role_mapping(&mut self, user_id: &str, source: &str) {
        if let Some(mappings) = self.existing_role_mappings.as_mut() {
            mappings.remove(&(user_id.to_string(), source.to_string()));
        }
    }
}
