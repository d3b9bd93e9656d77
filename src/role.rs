//! Role definitions.

use crate::{
    error::{Error, Result},
    validation::{ValidationMessage, ValidationResponse},
};
use std::{collections::BTreeSet, fmt};

/// The realm roles and users belong to when no other source is given.
pub const DEFAULT_SOURCE: &str = "default";

/// Identifies a role: its id is only unique within its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct RoleKey {
    pub id: String,
    pub source: String,
}

impl RoleKey {
    /// Create a key for a role in `source`.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Create a key for a role in the default source.
    pub fn local(id: impl Into<String>) -> Self {
        Self::new(id, DEFAULT_SOURCE)
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.source)
    }
}

/// A role grants privileges directly and everything granted by the roles it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    pub key: RoleKey,
    pub name: String,
    pub description: Option<String>,
    /// Session timeout in minutes; at least 1 when set.
    pub session_timeout: Option<u32>,
    pub privilege_ids: BTreeSet<String>,
    pub contained_roles: BTreeSet<RoleKey>,
}

impl Role {
    /// Create a role in the default source.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_key(RoleKey::local(id), name)
    }

    /// Create a role with an explicit key.
    pub fn with_key(key: RoleKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: None,
            session_timeout: None,
            privilege_ids: BTreeSet::new(),
            contained_roles: BTreeSet::new(),
        }
    }

    /// The role id within its source.
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// The source the role belongs to.
    pub fn source(&self) -> &str {
        &self.key.source
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the session timeout in minutes.
    pub fn with_session_timeout(mut self, minutes: u32) -> Self {
        self.session_timeout = Some(minutes);
        self
    }

    /// Grant a privilege directly.
    pub fn add_privilege(mut self, privilege_id: impl Into<String>) -> Self {
        self.privilege_ids.insert(privilege_id.into());
        self
    }

    /// Contain another role of the default source.
    pub fn contain(self, role_id: impl Into<String>) -> Self {
        self.contain_key(RoleKey::local(role_id))
    }

    /// Contain another role, possibly from a different source.
    pub fn contain_key(mut self, key: RoleKey) -> Self {
        self.contained_roles.insert(key);
        self
    }

    /// Whether the role directly contains `key`.
    pub fn contains_role(&self, key: &RoleKey) -> bool {
        self.contained_roles.contains(key)
    }
}

/// Builder for creating roles with a fluent API.
#[derive(Debug, Default)]
pub struct RoleBuilder {
    id: Option<String>,
    source: Option<String>,
    name: Option<String>,
    description: Option<String>,
    session_timeout: Option<u32>,
    privileges: Vec<String>,
    roles: Vec<RoleKey>,
}

impl RoleBuilder {
    /// Create a new role builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the role id. Leaving it unset lets validation generate one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the source; defaults to [`DEFAULT_SOURCE`].
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the role name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the role description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the session timeout in minutes.
    pub fn session_timeout(mut self, minutes: u32) -> Self {
        self.session_timeout = Some(minutes);
        self
    }

    /// Grant a privilege.
    pub fn privilege(mut self, privilege_id: impl Into<String>) -> Self {
        self.privileges.push(privilege_id.into());
        self
    }

    /// Contain a role of the default source.
    pub fn role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(RoleKey::local(role_id));
        self
    }

    /// Contain a role from any source.
    pub fn role_key(mut self, key: RoleKey) -> Self {
        self.roles.push(key);
        self
    }

    /// Build the role.
    pub fn build(self) -> Result<Role> {
        let name = self.name.ok_or_else(|| {
            let mut response = ValidationResponse::new();
            response.add_error(ValidationMessage::new("name", "Name is required."));
            Error::from(response)
        })?;

        let key = RoleKey::new(
            self.id.unwrap_or_default(),
            self.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        );

        let mut role = Role::with_key(key, name);
        role.description = self.description;
        role.session_timeout = self.session_timeout;
        role.privilege_ids.extend(self.privileges);
        role.contained_roles.extend(self.roles);

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_creation() {
        let role = Role::new("admin", "Administrator")
            .with_description("Administrator role")
            .add_privilege("p1")
            .add_privilege("p2")
            .contain("reader");

        assert_eq!(role.id(), "admin");
        assert_eq!(role.source(), DEFAULT_SOURCE);
        assert_eq!(role.description.as_deref(), Some("Administrator role"));
        assert_eq!(role.privilege_ids.len(), 2);
        assert!(role.contains_role(&RoleKey::local("reader")));
    }

    #[test]
    fn test_duplicate_grants_collapse() {
        let role = Role::new("r", "R").add_privilege("p1").add_privilege("p1");
        assert_eq!(role.privilege_ids.len(), 1);
    }

    #[test]
    fn test_role_builder() {
        let role = RoleBuilder::new()
            .id("editor")
            .name("Editor")
            .description("Content editor")
            .session_timeout(30)
            .privilege("p1")
            .role_key(RoleKey::new("ldap-admins", "ldap"))
            .build()
            .unwrap();

        assert_eq!(role.key, RoleKey::local("editor"));
        assert_eq!(role.session_timeout, Some(30));
        assert!(role.contains_role(&RoleKey::new("ldap-admins", "ldap")));
    }

    #[test]
    fn test_role_builder_requires_name() {
        assert!(RoleBuilder::new().id("x").build().is_err());
    }

    #[test]
    fn test_role_key_display() {
        assert_eq!(RoleKey::new("admins", "ldap").to_string(), "admins@ldap");
    }
}
