//! Async support for the configuration manager (requires 'async' feature).
//!
//! [`AsyncConfigurationManager`] serializes writers behind a tokio `RwLock`: each
//! mutating call holds the write lock across context construction, validation, the
//! mutation itself and cleanup, so two writers can never validate against the same
//! stale context. Reads share the read lock.

use crate::{
    batch::{BatchConfig, BatchEdit, BatchResult},
    error::Result,
    graph::Configuration,
    manager::ConfigurationManager,
    privilege::Privilege,
    role::{Role, RoleKey},
    storage::{ConfigurationSource, MemoryConfigurationSource},
    user::{User, UserRoleMapping},
    validation::{Validated, ValidationResponse},
};
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};
use tokio::sync::RwLock;

/// Async wrapper around the configuration manager.
pub struct AsyncConfigurationManager<S = MemoryConfigurationSource>
where
    S: ConfigurationSource,
{
    inner: Arc<RwLock<ConfigurationManager<S>>>,
}

impl<S> AsyncConfigurationManager<S>
where
    S: ConfigurationSource,
{
    pub fn new(manager: ConfigurationManager<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
        }
    }

    pub async fn create_privilege(&self, privilege: Privilege) -> Result<Validated<Privilege>> {
        self.inner.write().await.create_privilege(privilege)
    }

    pub async fn update_privilege(&self, privilege: Privilege) -> Result<Validated<Privilege>> {
        self.inner.write().await.update_privilege(privilege)
    }

    pub async fn delete_privilege(&self, id: &str) -> Result<()> {
        self.inner.write().await.delete_privilege(id)
    }

    pub async fn create_role(&self, role: Role) -> Result<Validated<Role>> {
        self.inner.write().await.create_role(role)
    }

    pub async fn update_role(&self, role: Role) -> Result<Validated<Role>> {
        self.inner.write().await.update_role(role)
    }

    pub async fn delete_role(&self, id: &str) -> Result<()> {
        self.inner.write().await.delete_role(id)
    }

    pub async fn delete_role_key(&self, key: &RoleKey) -> Result<()> {
        self.inner.write().await.delete_role_key(key)
    }

    pub async fn create_user(&self, user: User, roles: BTreeSet<String>) -> Result<Validated<User>> {
        self.inner.write().await.create_user(user, roles)
    }

    pub async fn update_user(&self, user: User, roles: BTreeSet<String>) -> Result<Validated<User>> {
        self.inner.write().await.update_user(user, roles)
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        self.inner.write().await.delete_user(id)
    }

    pub async fn create_user_role_mapping(
        &self,
        mapping: UserRoleMapping,
    ) -> Result<Validated<UserRoleMapping>> {
        self.inner.write().await.create_user_role_mapping(mapping)
    }

    pub async fn update_user_role_mapping(
        &self,
        mapping: UserRoleMapping,
    ) -> Result<Validated<UserRoleMapping>> {
        self.inner.write().await.update_user_role_mapping(mapping)
    }

    pub async fn delete_user_role_mapping(&self, user_id: &str, source: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .delete_user_role_mapping(user_id, source)
    }

    pub async fn apply_batch(&self, edits: Vec<BatchEdit>, config: &BatchConfig) -> BatchResult<()> {
        self.inner.write().await.apply_batch(edits, config)
    }

    pub async fn load(&self) -> Result<()> {
        self.inner.write().await.load()
    }

    pub async fn save(&self) -> Result<()> {
        self.inner.write().await.save()
    }

    pub async fn resolve(&self, role_id: &str) -> HashSet<String> {
        self.inner.read().await.resolve(role_id)
    }

    pub async fn resolve_user(&self, user_id: &str) -> HashSet<String> {
        self.inner.read().await.resolve_user(user_id)
    }

    pub async fn is_permitted(&self, role_id: &str, requested: &str) -> bool {
        self.inner.read().await.is_permitted(role_id, requested)
    }

    pub async fn read_privilege(&self, id: &str) -> Result<Privilege> {
        self.inner.read().await.read_privilege(id)
    }

    pub async fn read_role(&self, id: &str) -> Result<Role> {
        self.inner.read().await.read_role(id)
    }

    pub async fn read_user(&self, id: &str) -> Result<User> {
        self.inner.read().await.read_user(id)
    }

    pub async fn read_user_role_mapping(&self, user_id: &str, source: &str) -> Result<UserRoleMapping> {
        self.inner.read().await.read_user_role_mapping(user_id, source)
    }

    pub async fn list_privileges(&self) -> Vec<Privilege> {
        self.inner.read().await.list_privileges()
    }

    pub async fn list_roles(&self) -> Vec<Role> {
        self.inner.read().await.list_roles()
    }

    pub async fn list_users(&self) -> Vec<User> {
        self.inner.read().await.list_users()
    }

    pub async fn list_user_role_mappings(&self) -> Vec<UserRoleMapping> {
        self.inner.read().await.list_user_role_mappings()
    }

    pub async fn validate_all(&self) -> ValidationResponse {
        self.inner.read().await.validate_all()
    }

    /// A flat copy of the current graph.
    pub async fn snapshot(&self) -> Configuration {
        self.inner.read().await.graph().to_configuration()
    }

    /// Perform multiple edits atomically under the write lock.
    pub async fn atomic<F, R>(&self, operations: F) -> Result<R>
    where
        F: FnOnce(&mut ConfigurationManager<S>) -> Result<R> + Send,
    {
        let mut manager = self.inner.write().await;
        operations(&mut manager)
    }

    /// Run a read-only closure under the read lock.
    pub async fn with_read_access<F, R>(&self, operation: F) -> R
    where
        F: FnOnce(&ConfigurationManager<S>) -> R + Send,
    {
        let manager = self.inner.read().await;
        operation(&manager)
    }
}

impl<S> Clone for AsyncConfigurationManager<S>
where
    S: ConfigurationSource,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ApplicationPrivilegeDescriptor, METHOD_PROPERTY, PERMISSION_PROPERTY};

    fn app(id: &str, permission: &str) -> Privilege {
        Privilege::new(id, id, ApplicationPrivilegeDescriptor::TYPE)
            .with_property(PERMISSION_PROPERTY, permission)
            .with_property(METHOD_PROPERTY, "read")
    }

    #[tokio::test]
    async fn test_async_manager() {
        let manager = AsyncConfigurationManager::new(ConfigurationManager::new().unwrap());

        manager.create_privilege(app("p1", "app:config")).await.unwrap();
        manager
            .create_role(Role::new("r1", "R1").add_privilege("p1"))
            .await
            .unwrap();
        manager
            .create_role(Role::new("r2", "R2").contain("r1"))
            .await
            .unwrap();

        assert!(manager.resolve("r2").await.contains("app:config:read"));
        assert!(manager.is_permitted("r2", "app:config:read").await);

        manager.delete_privilege("p1").await.unwrap();
        assert!(manager.resolve("r1").await.is_empty());
        assert!(manager.read_role("r1").await.unwrap().privilege_ids.is_empty());
    }

    #[tokio::test]
    async fn test_atomic_edits() {
        let manager = AsyncConfigurationManager::new(ConfigurationManager::new().unwrap());

        let created = manager
            .atomic(|m| {
                m.create_privilege(app("p1", "app"))?;
                m.create_role(Role::new("r1", "R1").add_privilege("p1"))?;
                Ok(m.list_roles().len())
            })
            .await
            .unwrap();
        assert_eq!(created, 1);

        let failed = manager
            .atomic(|m| m.create_role(Role::new("r1", "Again")).map(|_| ()))
            .await;
        assert!(failed.is_err());
        assert_eq!(manager.list_roles().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_names_unique() {
        let manager = AsyncConfigurationManager::new(ConfigurationManager::new().unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .create_role(Role::new(format!("r{i}"), "Shared name"))
                    .await
                    .is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(manager.list_roles().await.len(), 1);
        assert!(manager.validate_all().await.is_valid());
    }
}
