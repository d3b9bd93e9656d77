//! The configuration manager: CRUD over the policy graph.
//!
//! Every create and update validates the candidate against a [`ValidationContext`]
//! before touching the graph; a rejected edit leaves both the graph and the context as
//! they were. Updates replace the stored entity (delete without cleanup, then insert),
//! while deletes run the [`ConfigurationCleaner`] so surviving entities hold no
//! dangling references.
//!
//! # Contexts
//!
//! The plain entry points build a fresh context with [`initialize_context`] for every
//! call. The `*_with_context` variants let several edits share one context; it must come
//! from [`initialize_context`] (or from earlier edits of the same batch), since role
//! containment checks assume the context describes the whole graph.
//!
//! [`initialize_context`]: ConfigurationManager::initialize_context
//!
//! # Example
//!
//! ```rust
//! use rbac_policy::{ConfigurationManager, Privilege, Role};
//!
//! let mut manager = ConfigurationManager::new()?;
//! manager.create_privilege(
//!     Privilege::new("p1", "Read config", "method")
//!         .with_property("permission", "app:config")
//!         .with_property("method", "read"),
//! )?;
//! manager.create_role(Role::new("r1", "Reader").add_privilege("p1"))?;
//! manager.create_role(Role::new("r2", "Auditor").contain("r1"))?;
//!
//! assert!(manager.resolve("r2").contains("app:config:read"));
//! # Ok::<(), rbac_policy::Error>(())
//! ```

use crate::{
    batch::{BatchConfig, BatchEdit, BatchResult},
    cleaner::ConfigurationCleaner,
    context::ValidationContext,
    descriptor::{DescriptorRegistry, PrivilegeDescriptor},
    error::{Error, Result},
    graph::PolicyGraph,
    hierarchy::{HierarchyConfig, RoleHierarchyTree, RoleTreeBuilder},
    privilege::Privilege,
    resolver::RolePermissionResolver,
    role::{Role, RoleKey, DEFAULT_SOURCE},
    storage::{ConfigurationModifier, ConfigurationSource, MemoryConfigurationSource},
    user::{User, UserRoleMapping},
    validation::{Validated, ValidationMessage, ValidationResponse},
    validator::{ConfigurationValidator, ValidatorConfig},
};
use log::{debug, info, warn};
use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    sync::Arc,
};

/// Configuration for the configuration manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Source of locally managed roles and users.
    pub default_source: String,
    /// Reject snapshots with validation errors in [`ConfigurationManager::load`].
    pub validate_on_load: bool,
    /// Log every committed edit.
    pub enable_audit: bool,
    /// Role tree rendering limits.
    pub hierarchy: HierarchyConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            validate_on_load: true,
            enable_audit: true,
            hierarchy: HierarchyConfig::default(),
        }
    }
}

/// Builder for [`ManagerConfig`].
#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    config: ManagerConfig,
}

impl ManagerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_source(mut self, source: impl Into<String>) -> Self {
        self.config.default_source = source.into();
        self
    }

    pub fn validate_on_load(mut self, validate: bool) -> Self {
        self.config.validate_on_load = validate;
        self
    }

    pub fn enable_audit(mut self, enable: bool) -> Self {
        self.config.enable_audit = enable;
        self
    }

    pub fn max_tree_depth(mut self, depth: usize) -> Self {
        self.config.hierarchy.max_depth = depth;
        self
    }

    pub fn build(self) -> ManagerConfig {
        self.config
    }
}

/// Run `validate` against `context`; on failure restore the context and turn the
/// response into an error.
fn checked(
    context: &mut ValidationContext,
    what: impl fmt::Display,
    validate: impl FnOnce(&mut ValidationContext) -> ValidationResponse,
) -> Result<ValidationResponse> {
    let before = context.clone();
    let response = validate(context);
    if response.is_valid() {
        Ok(response)
    } else {
        warn!("Rejected {what}: {response}");
        *context = before;
        Err(response.into())
    }
}

fn accepted<T>(value: T, response: ValidationResponse) -> Validated<T> {
    Validated {
        value,
        warnings: response.into_warnings(),
    }
}

/// CRUD facade over the policy graph.
pub struct ConfigurationManager<S = MemoryConfigurationSource>
where
    S: ConfigurationSource,
{
    source: S,
    config: ManagerConfig,
    graph: PolicyGraph,
    registry: Arc<DescriptorRegistry>,
    validator: ConfigurationValidator,
    cleaner: ConfigurationCleaner,
    modifiers: Vec<Box<dyn ConfigurationModifier>>,
}

impl ConfigurationManager<MemoryConfigurationSource> {
    /// Create an empty manager with the built-in privilege kinds and an in-memory source.
    pub fn new() -> Result<Self> {
        Self::with_config(ManagerConfig::default())
    }

    /// Create an empty manager with a custom configuration and an in-memory source.
    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        Self::with_source(MemoryConfigurationSource::new(), config)
    }
}

impl<S> ConfigurationManager<S>
where
    S: ConfigurationSource,
{
    /// Create an empty manager over `source`. Call [`load`](Self::load) to read it.
    pub fn with_source(source: S, config: ManagerConfig) -> Result<Self> {
        Self::with_registry(source, config, DescriptorRegistry::with_defaults())
    }

    /// Create an empty manager with a custom descriptor registry.
    pub fn with_registry(source: S, config: ManagerConfig, registry: DescriptorRegistry) -> Result<Self> {
        let registry = Arc::new(registry);
        let validator = ConfigurationValidator::with_config(
            Arc::clone(&registry),
            ValidatorConfig {
                default_source: config.default_source.clone(),
                ..ValidatorConfig::default()
            },
        )?;

        Ok(Self {
            source,
            config,
            graph: PolicyGraph::new(),
            registry,
            validator,
            cleaner: ConfigurationCleaner::new(),
            modifiers: Vec::new(),
        })
    }

    /// Replace the validator, e.g. to use a different email pattern.
    pub fn with_validator(mut self, validator: ConfigurationValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Register a modifier run by [`load`](Self::load), in registration order.
    pub fn with_modifier(mut self, modifier: impl ConfigurationModifier + 'static) -> Self {
        self.add_modifier(modifier);
        self
    }

    pub fn add_modifier(&mut self, modifier: impl ConfigurationModifier + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn graph(&self) -> &PolicyGraph {
        &self.graph
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &ConfigurationValidator {
        &self.validator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn audit(&self, event: fmt::Arguments<'_>) {
        if self.config.enable_audit {
            info!("{event}");
        }
    }

    /// Build a validation context describing the whole current graph.
    pub fn initialize_context(&self) -> ValidationContext {
        let mut context = ValidationContext::sealed();
        context.record_source(&self.config.default_source);

        for privilege in self.graph.privileges() {
            context.ensure_privilege_ids().insert(privilege.id);
        }

        for role in self.graph.roles() {
            context.record_role_id(&role.key);
            context
                .role_name_map_mut()
                .insert(role.key.clone(), role.name.clone());
            context
                .role_containment_map_mut()
                .insert(role.key, role.contained_roles.into_iter().collect());
        }

        for user in self.graph.users() {
            context.ensure_user_ids().insert(user.id);
        }

        for mapping in self.graph.mappings() {
            context.ensure_role_mappings().insert(mapping.key());
            if mapping.source == self.config.default_source {
                context
                    .ensure_user_role_map()
                    .insert(mapping.user_id, mapping.roles);
            }
        }

        context
    }

    /// Validate the whole graph from scratch.
    pub fn validate_all(&self) -> ValidationResponse {
        self.validator.validate_model(&mut self.graph.to_configuration())
    }

    /// Replace the graph with the source's snapshot.
    ///
    /// Registered modifiers run first, then whole-graph validation, which replaces
    /// placeholder ids. With `validate_on_load`, a snapshot with validation errors is
    /// rejected and the current graph is kept. A snapshot changed by a modifier or by an
    /// id fix is written back to the source once it is accepted.
    pub fn load(&mut self) -> Result<()> {
        let mut configuration = self.source.load()?;

        let mut modified = false;
        for modifier in &self.modifiers {
            modified |= modifier.apply(&mut configuration);
        }

        let response = self.validator.validate_model(&mut configuration);
        if self.config.validate_on_load && !response.is_valid() {
            warn!("Refusing to load invalid configuration: {response}");
            return Err(response.into());
        }
        modified |= response.is_modified();

        self.graph = PolicyGraph::from_configuration(&configuration);
        if modified {
            self.source.store(&configuration)?;
            self.audit(format_args!("Stored modified configuration"));
        }
        info!(
            "Loaded configuration: {} privileges, {} roles, {} users, {} mappings",
            self.graph.privilege_count(),
            self.graph.role_count(),
            self.graph.user_count(),
            self.graph.mapping_count()
        );
        Ok(())
    }

    /// Store the current graph in the source.
    pub fn save(&mut self) -> Result<()> {
        let configuration = self.graph.to_configuration();
        self.source.store(&configuration)?;
        self.audit(format_args!("Configuration saved"));
        Ok(())
    }

    // Privileges

    pub fn list_privileges(&self) -> Vec<Privilege> {
        self.graph.privileges()
    }

    pub fn read_privilege(&self, id: &str) -> Result<Privilege> {
        self.graph
            .privilege(id)
            .ok_or_else(|| Error::PrivilegeNotFound(id.to_string()))
    }

    /// The value of property `key` on privilege `id`.
    pub fn privilege_property(&self, id: &str, key: &str) -> Result<Option<String>> {
        Ok(self.read_privilege(id)?.property(key).map(str::to_string))
    }

    /// Registered privilege descriptors, sorted by type.
    pub fn list_privilege_descriptors(&self) -> Vec<Arc<dyn PrivilegeDescriptor>> {
        self.registry
            .types()
            .iter()
            .filter_map(|privilege_type| self.registry.get(privilege_type).cloned())
            .collect()
    }

    pub fn create_privilege(&mut self, privilege: Privilege) -> Result<Validated<Privilege>> {
        let mut context = self.initialize_context();
        self.create_privilege_with_context(privilege, &mut context)
    }

    pub fn create_privilege_with_context(
        &mut self,
        mut privilege: Privilege,
        context: &mut ValidationContext,
    ) -> Result<Validated<Privilege>> {
        let label = format!("privilege '{}'", privilege.id);
        let response = checked(context, label, |context| {
            self.validator.validate_privilege(context, &mut privilege, false)
        })?;

        self.graph.insert_privilege(privilege.clone());
        self.audit(format_args!("Privilege '{}' created", privilege.id));
        Ok(accepted(privilege, response))
    }

    pub fn update_privilege(&mut self, privilege: Privilege) -> Result<Validated<Privilege>> {
        let mut context = self.initialize_context();
        self.update_privilege_with_context(privilege, &mut context)
    }

    pub fn update_privilege_with_context(
        &mut self,
        mut privilege: Privilege,
        context: &mut ValidationContext,
    ) -> Result<Validated<Privilege>> {
        if !self.graph.contains_privilege(&privilege.id) {
            return Err(Error::PrivilegeNotFound(privilege.id));
        }

        let label = format!("privilege '{}'", privilege.id);
        let response = checked(context, label, |context| {
            self.validator.validate_privilege(context, &mut privilege, true)
        })?;

        self.graph.remove_privilege(&privilege.id);
        self.graph.insert_privilege(privilege.clone());
        self.audit(format_args!("Privilege '{}' updated", privilege.id));
        Ok(accepted(privilege, response))
    }

    pub fn delete_privilege(&mut self, id: &str) -> Result<()> {
        let mut context = self.initialize_context();
        self.delete_privilege_with_context(id, &mut context)
    }

    pub fn delete_privilege_with_context(&mut self, id: &str, context: &mut ValidationContext) -> Result<()> {
        if self.graph.remove_privilege(id).is_none() {
            return Err(Error::PrivilegeNotFound(id.to_string()));
        }

        self.cleaner.privilege_removed(&self.graph, id);
        context.forget_privilege(id);
        self.audit(format_args!("Privilege '{id}' deleted"));
        Ok(())
    }

    // Roles

    pub fn list_roles(&self) -> Vec<Role> {
        self.graph.roles()
    }

    /// Read a role of the default source.
    pub fn read_role(&self, id: &str) -> Result<Role> {
        self.read_role_key(&self.local_key(id))
    }

    pub fn read_role_key(&self, key: &RoleKey) -> Result<Role> {
        self.graph
            .role(key)
            .ok_or_else(|| Error::RoleNotFound(key.clone()))
    }

    fn local_key(&self, id: &str) -> RoleKey {
        RoleKey::new(id, self.config.default_source.clone())
    }

    pub fn create_role(&mut self, role: Role) -> Result<Validated<Role>> {
        let mut context = self.initialize_context();
        self.create_role_with_context(role, &mut context)
    }

    /// Create a role. Contained roles of the default source must already exist in the
    /// context, so a batch creates contained roles before their containers.
    pub fn create_role_with_context(
        &mut self,
        mut role: Role,
        context: &mut ValidationContext,
    ) -> Result<Validated<Role>> {
        let label = format!("role '{}'", role.key);
        let validator = &self.validator;
        let response = checked(context, label, |context| {
            let mut response = validator.validate_role(context, &mut role, false);
            response.append(validator.check_containment(context, &role.key));
            response
        })?;

        self.graph.insert_role(role.clone());
        self.audit(format_args!("Role '{}' created", role.key));
        Ok(accepted(role, response))
    }

    pub fn update_role(&mut self, role: Role) -> Result<Validated<Role>> {
        let mut context = self.initialize_context();
        self.update_role_with_context(role, &mut context)
    }

    pub fn update_role_with_context(
        &mut self,
        mut role: Role,
        context: &mut ValidationContext,
    ) -> Result<Validated<Role>> {
        if !self.graph.contains_role(&role.key) {
            return Err(Error::RoleNotFound(role.key));
        }

        let label = format!("role '{}'", role.key);
        let response = checked(context, label, |context| {
            self.validator.validate_role(context, &mut role, true)
        })?;

        self.graph.remove_role(&role.key);
        self.graph.insert_role(role.clone());
        self.audit(format_args!("Role '{}' updated", role.key));
        Ok(accepted(role, response))
    }

    /// Delete a role of the default source.
    pub fn delete_role(&mut self, id: &str) -> Result<()> {
        let key = self.local_key(id);
        self.delete_role_key(&key)
    }

    pub fn delete_role_key(&mut self, key: &RoleKey) -> Result<()> {
        let mut context = self.initialize_context();
        self.delete_role_with_context(key, &mut context)
    }

    pub fn delete_role_with_context(&mut self, key: &RoleKey, context: &mut ValidationContext) -> Result<()> {
        if self.graph.remove_role(key).is_none() {
            return Err(Error::RoleNotFound(key.clone()));
        }

        self.cleaner.role_removed(&self.graph, key);
        context.forget_role(key);
        self.audit(format_args!("Role '{key}' deleted"));
        Ok(())
    }

    // Users

    pub fn list_users(&self) -> Vec<User> {
        self.graph.users()
    }

    pub fn read_user(&self, id: &str) -> Result<User> {
        self.graph
            .user(id)
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    /// Create a user and map it to `roles` of the default source.
    pub fn create_user(&mut self, user: User, roles: BTreeSet<String>) -> Result<Validated<User>> {
        let mut context = self.initialize_context();
        self.create_user_with_context(user, roles, &mut context)
    }

    pub fn create_user_with_context(
        &mut self,
        user: User,
        roles: BTreeSet<String>,
        context: &mut ValidationContext,
    ) -> Result<Validated<User>> {
        let keys = self.local_keys(&roles);
        let label = format!("user '{}'", user.id);
        let response = checked(context, label, |context| {
            self.validator.validate_user(context, &user, &keys, false)
        })?;

        self.graph.insert_user(user.clone());
        self.replace_local_mapping(&user.id, roles, context);
        self.audit(format_args!("User '{}' created", user.id));
        Ok(accepted(user, response))
    }

    /// Replace a user and its default-source role mapping.
    pub fn update_user(&mut self, user: User, roles: BTreeSet<String>) -> Result<Validated<User>> {
        let mut context = self.initialize_context();
        self.update_user_with_context(user, roles, &mut context)
    }

    pub fn update_user_with_context(
        &mut self,
        user: User,
        roles: BTreeSet<String>,
        context: &mut ValidationContext,
    ) -> Result<Validated<User>> {
        if !self.graph.contains_user(&user.id) {
            return Err(Error::UserNotFound(user.id));
        }

        let keys = self.local_keys(&roles);
        let label = format!("user '{}'", user.id);
        let response = checked(context, label, |context| {
            self.validator.validate_user(context, &user, &keys, true)
        })?;

        self.graph.remove_user(&user.id);
        self.graph.insert_user(user.clone());
        self.replace_local_mapping(&user.id, roles, context);
        self.audit(format_args!("User '{}' updated", user.id));
        Ok(accepted(user, response))
    }

    fn local_keys(&self, roles: &BTreeSet<String>) -> BTreeSet<RoleKey> {
        roles.iter().map(|id| self.local_key(id)).collect()
    }

    fn replace_local_mapping(&self, user_id: &str, roles: BTreeSet<String>, context: &mut ValidationContext) {
        let source = self.config.default_source.clone();
        if self.graph.remove_mapping(user_id, &source).is_none() {
            debug!("No existing mapping for user '{user_id}' in '{source}'");
        }
        let mapping = UserRoleMapping {
            user_id: user_id.to_string(),
            source,
            roles,
        };
        context.ensure_role_mappings().insert(mapping.key());
        self.graph.insert_mapping(mapping);
    }

    /// Delete a user and, when present, its default-source mapping.
    pub fn delete_user(&mut self, id: &str) -> Result<()> {
        let mut context = self.initialize_context();
        self.delete_user_with_context(id, &mut context)
    }

    pub fn delete_user_with_context(&mut self, id: &str, context: &mut ValidationContext) -> Result<()> {
        if self.graph.remove_user(id).is_none() {
            return Err(Error::UserNotFound(id.to_string()));
        }
        context.forget_user(id);

        let source = self.config.default_source.clone();
        match self.graph.remove_mapping(id, &source) {
            Some(_) => context.forget_role_mapping(id, &source),
            None => debug!("User '{id}' had no role mapping in '{source}'"),
        }

        self.audit(format_args!("User '{id}' deleted"));
        Ok(())
    }

    // User role mappings

    pub fn list_user_role_mappings(&self) -> Vec<UserRoleMapping> {
        self.graph.mappings()
    }

    pub fn read_user_role_mapping(&self, user_id: &str, source: &str) -> Result<UserRoleMapping> {
        self.graph
            .mapping(user_id, source)
            .ok_or_else(|| Error::RoleMappingNotFound {
                user_id: user_id.to_string(),
                realm: source.to_string(),
            })
    }

    pub fn create_user_role_mapping(&mut self, mapping: UserRoleMapping) -> Result<Validated<UserRoleMapping>> {
        let mut context = self.initialize_context();
        self.create_user_role_mapping_with_context(mapping, &mut context)
    }

    pub fn create_user_role_mapping_with_context(
        &mut self,
        mapping: UserRoleMapping,
        context: &mut ValidationContext,
    ) -> Result<Validated<UserRoleMapping>> {
        if self.graph.contains_mapping(&mapping.user_id, &mapping.source) {
            let mut response = ValidationResponse::new();
            response.add_error(ValidationMessage::new(
                "*",
                format!("User Role Mapping for user '{}' already exists.", mapping.user_id),
            ));
            warn!("Rejected mapping for '{}' in '{}': {response}", mapping.user_id, mapping.source);
            return Err(response.into());
        }

        let label = format!("mapping for '{}' in '{}'", mapping.user_id, mapping.source);
        let response = checked(context, label, |context| {
            self.validator
                .validate_user_role_mapping(context, &mapping, false)
        })?;

        self.graph.insert_mapping(mapping.clone());
        self.audit(format_args!(
            "Role mapping for user '{}' in '{}' created",
            mapping.user_id, mapping.source
        ));
        Ok(accepted(mapping, response))
    }

    pub fn update_user_role_mapping(&mut self, mapping: UserRoleMapping) -> Result<Validated<UserRoleMapping>> {
        let mut context = self.initialize_context();
        self.update_user_role_mapping_with_context(mapping, &mut context)
    }

    pub fn update_user_role_mapping_with_context(
        &mut self,
        mapping: UserRoleMapping,
        context: &mut ValidationContext,
    ) -> Result<Validated<UserRoleMapping>> {
        if !self.graph.contains_mapping(&mapping.user_id, &mapping.source) {
            return Err(Error::RoleMappingNotFound {
                user_id: mapping.user_id,
                realm: mapping.source,
            });
        }

        let label = format!("mapping for '{}' in '{}'", mapping.user_id, mapping.source);
        let response = checked(context, label, |context| {
            self.validator
                .validate_user_role_mapping(context, &mapping, true)
        })?;

        self.graph.remove_mapping(&mapping.user_id, &mapping.source);
        self.graph.insert_mapping(mapping.clone());
        self.audit(format_args!(
            "Role mapping for user '{}' in '{}' updated",
            mapping.user_id, mapping.source
        ));
        Ok(accepted(mapping, response))
    }

    pub fn delete_user_role_mapping(&mut self, user_id: &str, source: &str) -> Result<()> {
        let mut context = self.initialize_context();
        self.delete_user_role_mapping_with_context(user_id, source, &mut context)
    }

    pub fn delete_user_role_mapping_with_context(
        &mut self,
        user_id: &str,
        source: &str,
        context: &mut ValidationContext,
    ) -> Result<()> {
        if self.graph.remove_mapping(user_id, source).is_none() {
            return Err(Error::RoleMappingNotFound {
                user_id: user_id.to_string(),
                realm: source.to_string(),
            });
        }

        context.forget_role_mapping(user_id, source);
        self.audit(format_args!("Role mapping for user '{user_id}' in '{source}' deleted"));
        Ok(())
    }

    // Resolution and views

    fn resolver(&self) -> RolePermissionResolver<'_> {
        RolePermissionResolver::new(&self.graph, &self.registry)
            .with_default_source(&self.config.default_source)
    }

    /// Permissions granted by role `role_id` of the default source.
    pub fn resolve(&self, role_id: &str) -> HashSet<String> {
        self.resolver().resolve(role_id)
    }

    pub fn resolve_key(&self, key: &RoleKey) -> HashSet<String> {
        self.resolver().resolve_key(key)
    }

    /// Permissions granted to a user by its default-source mapping.
    pub fn resolve_user(&self, user_id: &str) -> HashSet<String> {
        self.resolver().resolve_user(user_id)
    }

    /// Whether role `role_id` grants `requested`.
    pub fn is_permitted(&self, role_id: &str, requested: &str) -> bool {
        self.resolver().is_permitted(role_id, requested)
    }

    /// Tree view of role `role_id` of the default source.
    pub fn role_tree(&self, role_id: &str) -> Result<RoleHierarchyTree> {
        RoleTreeBuilder::new(&self.graph, self.config.hierarchy.clone())
            .build_for_role(&self.local_key(role_id))
    }

    /// Tree view of the roles granted to `user_id` in the default source.
    pub fn user_role_tree(&self, user_id: &str) -> Result<RoleHierarchyTree> {
        RoleTreeBuilder::new(&self.graph, self.config.hierarchy.clone())
            .build_for_user(user_id, &self.config.default_source)
    }

    // Batches

    /// Apply `edits` in order through one shared context. A rejected edit changes
    /// nothing; later edits still run unless `fail_fast` is set.
    pub fn apply_batch(&mut self, edits: Vec<BatchEdit>, config: &BatchConfig) -> BatchResult<()> {
        let mut context = self.initialize_context();
        let mut result = BatchResult::new();

        for (index, edit) in edits.into_iter().enumerate() {
            let label = edit.describe();
            let outcome = match edit {
                BatchEdit::CreatePrivilege(p) => self.create_privilege_with_context(p, &mut context).map(drop),
                BatchEdit::UpdatePrivilege(p) => self.update_privilege_with_context(p, &mut context).map(drop),
                BatchEdit::CreateRole(r) => self.create_role_with_context(r, &mut context).map(drop),
                BatchEdit::UpdateRole(r) => self.update_role_with_context(r, &mut context).map(drop),
                BatchEdit::CreateUser { user, roles } => {
                    self.create_user_with_context(user, roles, &mut context).map(drop)
                }
                BatchEdit::UpdateUser { user, roles } => {
                    self.update_user_with_context(user, roles, &mut context).map(drop)
                }
                BatchEdit::CreateMapping(m) => {
                    self.create_user_role_mapping_with_context(m, &mut context).map(drop)
                }
                BatchEdit::UpdateMapping(m) => {
                    self.update_user_role_mapping_with_context(m, &mut context).map(drop)
                }
                BatchEdit::DeletePrivilege(id) => self.delete_privilege_with_context(&id, &mut context),
                BatchEdit::DeleteRole(key) => self.delete_role_with_context(&key, &mut context),
                BatchEdit::DeleteUser(id) => self.delete_user_with_context(&id, &mut context),
                BatchEdit::DeleteMapping { user_id, source } => {
                    self.delete_user_role_mapping_with_context(&user_id, &source, &mut context)
                }
            };

            match outcome {
                Ok(()) => result.add_success(index, ()),
                Err(error) => {
                    warn!("Batch edit {index} ({label}) failed: {error}");
                    result.add_failure(index, error);
                    if config.fail_fast {
                        break;
                    }
                }
            }
        }

        self.audit(format_args!(
            "Batch applied: {} succeeded, {} failed",
            result.successes.len(),
            result.failures.len()
        ));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ApplicationPrivilegeDescriptor, METHOD_PROPERTY, PERMISSION_PROPERTY};
    use crate::graph::Configuration;

    fn app(id: &str, permission: &str, method: &str) -> Privilege {
        Privilege::new(id, format!("Privilege {id}"), ApplicationPrivilegeDescriptor::TYPE)
            .with_property(PERMISSION_PROPERTY, permission)
            .with_property(METHOD_PROPERTY, method)
    }

    fn roles(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn manager() -> ConfigurationManager {
        let mut manager = ConfigurationManager::new().unwrap();
        manager.create_privilege(app("p1", "app:config", "read")).unwrap();
        manager.create_role(Role::new("r1", "R1").add_privilege("p1")).unwrap();
        manager.create_role(Role::new("r2", "R2").contain("r1")).unwrap();
        manager
    }

    #[test]
    fn test_initialize_context_is_complete() {
        let mut manager = manager();
        manager.create_user(User::new("u1", "u1@x", "pw"), roles(&["r2"])).unwrap();

        let context = manager.initialize_context();
        assert!(context.privilege_ids().unwrap().contains("p1"));
        assert!(context.role_exists(&RoleKey::local("r2")));
        assert_eq!(context.role_name_map().len(), 2);
        assert_eq!(
            context.role_containment_map().get(&RoleKey::local("r2")),
            Some(&vec![RoleKey::local("r1")])
        );
        assert!(context.user_ids().unwrap().contains("u1"));
        assert!(context
            .role_mappings()
            .unwrap()
            .contains(&("u1".to_string(), DEFAULT_SOURCE.to_string())));
        assert_eq!(context.user_role_map().unwrap().get("u1"), Some(&roles(&["r2"])));
    }

    #[test]
    fn test_rejected_create_changes_nothing() {
        let mut manager = manager();
        let error = manager
            .create_role(Role::new("r1", "Duplicate"))
            .unwrap_err();

        assert!(!error.is_not_found());
        assert!(error.validation().unwrap().mentions("Role ID must be unique."));
        assert_eq!(manager.read_role("r1").unwrap().name, "R1");
    }

    #[test]
    fn test_create_rejects_unknown_contained_role() {
        let mut manager = manager();
        let error = manager
            .create_role(Role::new("r3", "R3").contain("ghost"))
            .unwrap_err();
        assert!(error.validation().unwrap().mentions("invalid role"));
        assert!(manager.read_role("r3").unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_unknown_is_not_found() {
        let mut manager = manager();
        assert!(matches!(
            manager.update_role(Role::new("nope", "Nope")),
            Err(Error::RoleNotFound(_))
        ));
        assert!(matches!(
            manager.update_privilege(app("nope", "a", "b")),
            Err(Error::PrivilegeNotFound(_))
        ));
        assert!(matches!(
            manager.update_user(User::new("nope", "n@x", "pw"), BTreeSet::new()),
            Err(Error::UserNotFound(_))
        ));
        assert!(matches!(
            manager.update_user_role_mapping(UserRoleMapping::new("nope", DEFAULT_SOURCE, ["r1"])),
            Err(Error::RoleMappingNotFound { .. })
        ));
    }

    #[test]
    fn test_update_replaces_containment() {
        let mut manager = manager();
        manager.create_role(Role::new("r3", "R3")).unwrap();
        manager
            .update_role(Role::new("r2", "R2").contain("r3"))
            .unwrap();

        let context = manager.initialize_context();
        assert_eq!(
            context.role_containment_map().get(&RoleKey::local("r2")),
            Some(&vec![RoleKey::local("r3")])
        );
        assert!(manager.resolve("r2").is_empty());
    }

    #[test]
    fn test_update_cycle_is_rejected() {
        let mut manager = manager();
        let error = manager
            .update_role(Role::new("r1", "R1").add_privilege("p1").contain("r2"))
            .unwrap_err();

        assert!(error.validation().unwrap().mentions("contains itself through"));
        assert!(manager.read_role("r1").unwrap().contained_roles.is_empty());
    }

    #[test]
    fn test_user_lifecycle() {
        let mut manager = manager();
        manager
            .create_user(User::new("jdoe", "jdoe@example.com", "pw"), roles(&["r2"]))
            .unwrap();
        assert_eq!(
            manager.read_user_role_mapping("jdoe", DEFAULT_SOURCE).unwrap().roles,
            roles(&["r2"])
        );
        assert!(manager.resolve_user("jdoe").contains("app:config:read"));

        manager
            .update_user(
                User::new("jdoe", "jdoe@example.com", "pw").with_status("disabled"),
                roles(&["r1"]),
            )
            .unwrap();
        assert!(!manager.read_user("jdoe").unwrap().is_active());
        assert_eq!(
            manager.read_user_role_mapping("jdoe", DEFAULT_SOURCE).unwrap().roles,
            roles(&["r1"])
        );

        manager.delete_user("jdoe").unwrap();
        assert!(manager.read_user("jdoe").unwrap_err().is_not_found());
        assert!(manager.list_user_role_mappings().is_empty());
    }

    #[test]
    fn test_delete_user_without_mapping() {
        let mut manager = manager();
        manager
            .create_user(User::new("solo", "solo@x", "pw"), BTreeSet::new())
            .unwrap();
        manager.delete_user_role_mapping("solo", DEFAULT_SOURCE).unwrap();

        manager.delete_user("solo").unwrap();
        assert!(matches!(manager.delete_user("solo"), Err(Error::UserNotFound(_))));
    }

    #[test]
    fn test_duplicate_mapping() {
        let mut manager = manager();
        manager
            .create_user_role_mapping(UserRoleMapping::new("ext", "ldap", ["whatever"]))
            .unwrap();
        let error = manager
            .create_user_role_mapping(UserRoleMapping::new("ext", "ldap", ["other"]))
            .unwrap_err();
        assert!(error.validation().unwrap().mentions("already exists"));
    }

    #[test]
    fn test_privilege_property_and_descriptors() {
        let manager = manager();
        assert_eq!(
            manager.privilege_property("p1", PERMISSION_PROPERTY).unwrap().as_deref(),
            Some("app:config")
        );
        assert_eq!(manager.privilege_property("p1", "missing").unwrap(), None);
        assert!(manager.privilege_property("p9", METHOD_PROPERTY).is_err());

        let types: Vec<String> = manager
            .list_privilege_descriptors()
            .iter()
            .map(|d| d.privilege_type().to_string())
            .collect();
        assert_eq!(types, vec!["method".to_string(), "target".to_string()]);
    }

    #[test]
    fn test_load_rejects_invalid_snapshot() {
        let invalid = Configuration {
            roles: vec![
                Role::new("a", "A").contain("b"),
                Role::new("b", "B").contain("a"),
            ],
            ..Configuration::default()
        };
        let source = MemoryConfigurationSource::with_configuration(invalid);
        let mut manager = ConfigurationManager::with_source(source, ManagerConfig::default()).unwrap();

        assert!(manager.load().is_err());
        assert!(manager.list_roles().is_empty());

        let lenient = ManagerConfigBuilder::new().validate_on_load(false).build();
        let source = manager.source().clone();
        let mut manager = ConfigurationManager::with_source(source, lenient).unwrap();
        manager.load().unwrap();
        assert_eq!(manager.list_roles().len(), 2);
        assert!(!manager.validate_all().is_valid());
    }

    #[test]
    fn test_load_fixes_placeholder_role_id() {
        let snapshot = Configuration {
            roles: vec![Role::new("", "Nameless id"), Role::new("0", "Zero id")],
            ..Configuration::default()
        };
        let source = MemoryConfigurationSource::with_configuration(snapshot);
        let mut manager = ConfigurationManager::with_source(source, ManagerConfig::default()).unwrap();

        manager.load().unwrap();

        let ids: Vec<String> = manager.list_roles().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| !id.is_empty() && id != "0"));
        assert!(manager.validate_all().warnings().is_empty());

        let stored = manager.source().snapshot().unwrap();
        assert!(stored.roles.iter().all(|r| !r.id().is_empty() && r.id() != "0"));
    }

    #[test]
    fn test_load_runs_modifiers() {
        let snapshot = Configuration {
            roles: vec![Role::new("r1", "R1")],
            ..Configuration::default()
        };
        let source = MemoryConfigurationSource::with_configuration(snapshot);
        let mut manager = ConfigurationManager::with_source(source, ManagerConfig::default())
            .unwrap()
            .with_modifier(|configuration: &mut Configuration| {
                if configuration.privileges.iter().any(|p| p.id == "seed") {
                    return false;
                }
                configuration.privileges.push(app("seed", "app:seed", "read"));
                true
            });

        manager.load().unwrap();
        assert!(manager.read_privilege("seed").is_ok());
        assert_eq!(manager.source().snapshot().unwrap().privileges.len(), 1);

        manager.load().unwrap();
        assert_eq!(manager.list_privileges().len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let mut manager = manager();
        manager.save().unwrap();

        let source = manager.source().clone();
        let mut reloaded = ConfigurationManager::with_source(source, ManagerConfig::default()).unwrap();
        reloaded.load().unwrap();
        assert_eq!(reloaded.list_roles(), manager.list_roles());
        assert_eq!(reloaded.resolve("r2"), manager.resolve("r2"));
    }

    #[test]
    fn test_batch_shares_context() {
        let mut manager = ConfigurationManager::new().unwrap();
        let edits = vec![
            BatchEdit::CreatePrivilege(app("p1", "app", "read")),
            BatchEdit::CreateRole(Role::new("leaf", "Leaf").add_privilege("p1")),
            BatchEdit::CreateRole(Role::new("top", "Top").contain("leaf")),
            BatchEdit::CreateRole(Role::new("other", "Leaf")),
            BatchEdit::CreateUser {
                user: User::new("u1", "u1@x", "pw"),
                roles: roles(&["top"]),
            },
        ];

        let result = manager.apply_batch(edits, &BatchConfig::default());
        assert_eq!(result.successes.len(), 4);
        assert!(result.failure(3).unwrap().validation().unwrap().mentions("Name is already in use."));
        assert!(manager.resolve_user("u1").contains("app:read"));
    }

    #[test]
    fn test_batch_fail_fast() {
        let mut manager = ConfigurationManager::new().unwrap();
        let edits = vec![
            BatchEdit::DeleteRole(RoleKey::local("missing")),
            BatchEdit::CreateRole(Role::new("r1", "R1")),
        ];

        let result = manager.apply_batch(edits, &BatchConfig { fail_fast: true });
        assert_eq!(result.total_operations(), 1);
        assert!(manager.list_roles().is_empty());
    }

    #[test]
    fn test_role_tree() {
        let manager = manager();
        let tree = manager.role_tree("r2").unwrap();
        assert_eq!(tree.total_nodes, 3);
        assert!(manager.role_tree("missing").is_err());
    }

    #[test]
    fn test_custom_default_source() {
        let config = ManagerConfigBuilder::new()
            .default_source("internal")
            .enable_audit(false)
            .build();
        let mut manager = ConfigurationManager::with_config(config).unwrap();
        manager.create_privilege(app("p1", "app", "read")).unwrap();
        manager
            .create_role(Role::with_key(RoleKey::new("r1", "internal"), "R1").add_privilege("p1"))
            .unwrap();

        assert!(manager.resolve("r1").contains("app:read"));
        assert!(manager.read_role("r1").is_ok());
    }
}
