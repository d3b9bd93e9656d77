//! Configuration validation.
//!
//! [`ConfigurationValidator`] checks privileges, roles, users and user-role mappings
//! against a [`ValidationContext`], recording every violation rather than stopping at
//! the first, and updating the context so later entities in the same batch see earlier
//! ones. It also owns the role containment cycle detector.
//!
//! # Containment checks
//!
//! The detector walks the containment map depth-first from a base role without a
//! memoized visited set, so a shared sub-role reached through two parents is walked
//! twice and every path that closes a cycle through the base is reported. A role that
//! is already on the current path is not entered again; such a loop does not pass
//! through the base and is reported when its own members are checked as base.
//!
//! References into a source the context holds no role ids for are tolerated: roles of
//! external realms are not ours to judge.

use crate::{
    context::ValidationContext,
    descriptor::DescriptorRegistry,
    error::{Error, Result},
    graph::Configuration,
    privilege::Privilege,
    role::{Role, RoleKey, DEFAULT_SOURCE},
    user::{User, UserRoleMapping, STATUS_ACTIVE, STATUS_DISABLED},
    validation::{ValidationMessage, ValidationResponse},
};
use log::{error, info};
use regex::Regex;
use std::{collections::BTreeSet, sync::Arc};
use uuid::Uuid;

/// Email addresses need a single `@` between two non-empty halves.
pub const DEFAULT_EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+$";

/// Configuration for the validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Source of locally managed roles and users.
    pub default_source: String,
    /// Pattern a user email must match.
    pub email_pattern: String,
    /// Prefix for generated privilege and role ids.
    pub generated_id_prefix: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            email_pattern: DEFAULT_EMAIL_PATTERN.to_string(),
            generated_id_prefix: String::new(),
        }
    }
}

/// Validates policy entities against a validation context.
#[derive(Debug, Clone)]
pub struct ConfigurationValidator {
    registry: Arc<DescriptorRegistry>,
    config: ValidatorConfig,
    email: Regex,
}

fn is_placeholder_id(id: &str) -> bool {
    id.trim().is_empty() || id == "0"
}

fn generate_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = format!("{prefix}{}", Uuid::new_v4().simple());
        if !taken(&id) {
            return id;
        }
    }
}

impl ConfigurationValidator {
    /// Create a validator with the default configuration.
    pub fn new(registry: Arc<DescriptorRegistry>) -> Result<Self> {
        Self::with_config(registry, ValidatorConfig::default())
    }

    /// Create a validator with a custom configuration.
    ///
    /// Fails with [`Error::IntegrityFault`] when the email pattern does not compile.
    pub fn with_config(registry: Arc<DescriptorRegistry>, config: ValidatorConfig) -> Result<Self> {
        let email = Regex::new(&config.email_pattern).map_err(|e| {
            Error::IntegrityFault(format!("Email pattern did not compile: {e}"))
        })?;

        Ok(Self {
            registry,
            config,
            email,
        })
    }

    /// The descriptor registry used for privilege kinds.
    pub fn registry(&self) -> &Arc<DescriptorRegistry> {
        &self.registry
    }

    /// The validator configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a whole configuration from an empty context, then run the global
    /// containment pass.
    ///
    /// Placeholder privilege and role ids are replaced in `configuration` itself; the
    /// response is then marked modified and carries one warning per fix.
    pub fn validate_model(&self, configuration: &mut Configuration) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        let mut context = ValidationContext::sealed();
        context.record_source(&self.config.default_source);

        for privilege in &mut configuration.privileges {
            response.append(self.validate_privilege(&mut context, privilege, false));
        }

        for role in &mut configuration.roles {
            response.append(self.validate_role(&mut context, role, false));
        }

        response.append(self.validate_role_containment(&context));

        for user in &configuration.users {
            let roles: BTreeSet<RoleKey> = configuration
                .user_role_mappings
                .iter()
                .filter(|m| m.user_id == user.id && m.source == self.config.default_source)
                .flat_map(|m| m.roles.iter().map(|id| RoleKey::new(id.clone(), m.source.clone())))
                .collect();
            response.append(self.validate_user(&mut context, user, &roles, false));
        }

        for mapping in &configuration.user_role_mappings {
            response.append(self.validate_user_role_mapping(&mut context, mapping, false));
        }

        if response.errors().is_empty() && response.warnings().is_empty() {
            info!("Security configuration validated successfully");
        } else {
            error!("Security configuration has validation errors/warnings");
            for message in response.errors() {
                error!("ERROR: {message}");
            }
            for message in response.warnings() {
                error!("WARNING: {message}");
            }
        }

        response
    }

    /// Validate a privilege. On create a missing id is generated (with a warning).
    pub fn validate_privilege(
        &self,
        context: &mut ValidationContext,
        privilege: &mut Privilege,
        update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        let existing = context.ensure_privilege_ids();

        if !update && is_placeholder_id(&privilege.id) {
            let new_id = generate_id(&self.config.generated_id_prefix, |id| existing.contains(id));
            response.add_warning(ValidationMessage::new(
                "id",
                format!("Fixed wrong privilege ID from '{}' to '{new_id}'", privilege.id),
            ));
            privilege.id = new_id;
            response.set_modified(true);
        } else if !update && existing.contains(&privilege.id) {
            response.add_error(ValidationMessage::new("id", "Privilege ID must be unique."));
        }

        if update && !existing.contains(&privilege.id) {
            response.add_error(ValidationMessage::new("id", "Privilege ID cannot be changed."));
        }

        if privilege.name.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "name",
                format!("Privilege ID '{}' requires a name.", privilege.id),
                "Name is required.",
            ));
        }

        if privilege.privilege_type.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "type",
                format!("Privilege ID '{}' requires a type.", privilege.id),
                "Type is required.",
            ));
        } else {
            match self.registry.get(&privilege.privilege_type) {
                Some(descriptor) => {
                    response.append(descriptor.validate(privilege, context, update));
                }
                None => response.add_error(ValidationMessage::with_short(
                    "type",
                    format!(
                        "Privilege ID '{}' has unrecognized type '{}'.",
                        privilege.id, privilege.privilege_type
                    ),
                    "Type is not recognized.",
                )),
            }
        }

        if !privilege.id.trim().is_empty() {
            context.ensure_privilege_ids().insert(privilege.id.clone());
        }

        response
    }

    /// Validate a role and record it (name, containment links, id) in the context.
    ///
    /// On update the containment check runs immediately for this role, which requires
    /// `context` to describe the full graph.
    pub fn validate_role(
        &self,
        context: &mut ValidationContext,
        role: &mut Role,
        update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();

        if role.key.source.trim().is_empty() {
            response.add_error(ValidationMessage::new("source", "Role source must be defined."));
        }

        context.ensure_role_ids();

        if !update && is_placeholder_id(&role.key.id) {
            let source = role.key.source.clone();
            let new_id = generate_id(&self.config.generated_id_prefix, |id| {
                context.role_exists(&RoleKey::new(id, source.clone()))
            });
            response.add_warning(ValidationMessage::new(
                "id",
                format!("Fixed wrong role ID from '{}' to '{new_id}'", role.key.id),
            ));
            role.key.id = new_id;
            response.set_modified(true);
        } else if !update && context.role_exists(&role.key) {
            response.add_error(ValidationMessage::new("id", "Role ID must be unique."));
        }

        if update && context.is_authoritative_for(&role.key.source) && !context.role_exists(&role.key) {
            response.add_error(ValidationMessage::new("id", "Role ID cannot be changed."));
        }

        if role.name.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "name",
                format!("Role ID '{}' requires a name.", role.key.id),
                "Name is required.",
            ));
        } else if context.is_role_name_taken(&role.key, &role.name) {
            response.add_error(ValidationMessage::with_short(
                "name",
                format!("Role ID '{}' can't use the name '{}'.", role.key.id, role.name),
                "Name is already in use.",
            ));
        } else {
            context
                .role_name_map_mut()
                .insert(role.key.clone(), role.name.clone());
        }

        if role.session_timeout == Some(0) {
            response.add_error(ValidationMessage::with_short(
                "sessionTimeout",
                format!("Role ID '{}' has a session timeout below one minute.", role.key.id),
                "Session timeout must be at least 1 minute.",
            ));
        }

        if let Some(privilege_ids) = context.privilege_ids() {
            for privilege_id in &role.privilege_ids {
                if !privilege_ids.contains(privilege_id) {
                    response.add_error(ValidationMessage::with_short(
                        "privileges",
                        format!(
                            "Role ID '{}' Invalid privilege id '{privilege_id}' found.",
                            role.key.id
                        ),
                        format!("Role cannot contain invalid privilege ID '{privilege_id}'."),
                    ));
                }
            }
        }

        let mut contained = Vec::with_capacity(role.contained_roles.len());
        for key in &role.contained_roles {
            if *key == role.key {
                response.add_error(ValidationMessage::with_short(
                    "roles",
                    format!("Role ID '{}' cannot contain itself.", role.key.id),
                    "Role cannot contain itself.",
                ));
            } else {
                contained.push(key.clone());
            }
        }
        context
            .role_containment_map_mut()
            .insert(role.key.clone(), contained);

        if update {
            response.append(self.check_containment(context, &role.key));
        }

        context.record_role_id(&role.key);

        response
    }

    /// Run the containment check for every role in the context's containment map.
    pub fn validate_role_containment(&self, context: &ValidationContext) -> ValidationResponse {
        let mut response = ValidationResponse::new();

        let mut roles: Vec<&RoleKey> = context.role_containment_map().keys().collect();
        roles.sort();

        for key in roles {
            response.append(self.check_containment(context, key));
        }

        response
    }

    /// Check the roles reachable from `base` for cycles back to `base` and for
    /// references to unknown roles.
    pub fn check_containment(&self, context: &ValidationContext, base: &RoleKey) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        let mut path = vec![base.clone()];
        self.walk_containment(context, base, base, &mut path, &mut response);
        response
    }

    fn walk_containment(
        &self,
        context: &ValidationContext,
        base: &RoleKey,
        current: &RoleKey,
        path: &mut Vec<RoleKey>,
        response: &mut ValidationResponse,
    ) {
        let Some(contained) = context.role_containment_map().get(current) else {
            return;
        };
        let first_level = current == base;

        for role in contained {
            let judged = context.is_authoritative_for(&role.source);
            let exists = context.role_exists(role);

            if first_level && judged && !exists {
                response.add_error(ValidationMessage::with_short(
                    "roles",
                    format!(
                        "Role '{}' contains an invalid role '{}'.",
                        context.role_display(base),
                        context.role_display(role)
                    ),
                    format!("Role cannot contain invalid role '{}'.", context.role_display(role)),
                ));
            }

            if role == base {
                response.add_error(ValidationMessage::with_short(
                    "roles",
                    format!(
                        "Role '{}' contains itself through Role '{}'.  This is not valid.",
                        context.role_display(base),
                        context.role_display(current)
                    ),
                    format!(
                        "Role cannot contain itself recursively (via role '{}').",
                        context.role_display(current)
                    ),
                ));
                continue;
            }

            if exists {
                if path.contains(role) {
                    continue;
                }
                path.push(role.clone());
                self.walk_containment(context, base, role, path, response);
                path.pop();
            } else if !first_level && judged {
                response.add_error(ValidationMessage::with_short(
                    "roles",
                    format!(
                        "Role '{}' contains an invalid role '{}'.",
                        context.role_display(current),
                        context.role_display(role)
                    ),
                    format!("Role cannot contain invalid role '{}'.", context.role_display(role)),
                ));
            }
        }
    }

    /// Validate a user. `roles` are the role keys the caller resolved as granted to the
    /// user (normally the user's default-source mapping).
    pub fn validate_user(
        &self,
        context: &mut ValidationContext,
        user: &User,
        roles: &BTreeSet<RoleKey>,
        update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        let id_empty = user.id.trim().is_empty();

        if !update && id_empty {
            response.add_error(ValidationMessage::new("userId", "User ID is required."));
        }

        if !update && !id_empty && context.ensure_user_ids().contains(&user.id) {
            let message = format!("User ID '{}' is already in use.", user.id);
            response.add_error(ValidationMessage::with_short("userId", message.clone(), message));
        }

        if user.id.chars().any(char::is_whitespace) {
            let message = format!("User ID '{}' cannot contain spaces.", user.id);
            response.add_error(ValidationMessage::with_short("userId", message.clone(), message));
        }

        if user.password.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "password",
                format!("User ID '{}' has no password.  This is a required field.", user.id),
                "Password is required.",
            ));
        }

        if user.email.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "email",
                format!("User ID '{}' has no email address", user.id),
                "Email address is required.",
            ));
        } else if !self.email.is_match(&user.email) {
            response.add_error(ValidationMessage::with_short(
                "email",
                format!("User ID '{}' has an invalid email address.", user.id),
                "Email address is invalid.",
            ));
        }

        if user.status != STATUS_ACTIVE && user.status != STATUS_DISABLED {
            response.add_error(ValidationMessage::with_short(
                "status",
                format!(
                    "User ID '{}' has invalid status '{}'.  (Allowed values are: {STATUS_ACTIVE} and {STATUS_DISABLED})",
                    user.id, user.status
                ),
                "Invalid Status selected.",
            ));
        }

        self.validate_user_roles(&user.id, roles.iter(), &mut response, context);

        if !id_empty {
            context.ensure_user_ids().insert(user.id.clone());
            let local: BTreeSet<String> = roles
                .iter()
                .filter(|key| key.source == self.config.default_source)
                .map(|key| key.id.clone())
                .collect();
            context.ensure_user_role_map().insert(user.id.clone(), local);
        }

        response
    }

    fn validate_user_roles<'a>(
        &self,
        user_id: &str,
        roles: impl Iterator<Item = &'a RoleKey>,
        response: &mut ValidationResponse,
        context: &ValidationContext,
    ) {
        let Some(role_ids) = context.role_ids() else {
            return;
        };

        for key in roles {
            match role_ids.get(&key.source) {
                None => response.add_error(ValidationMessage::with_short(
                    "source",
                    format!("User ID '{user_id}' Invalid source realm '{}' found.", key.source),
                    format!("User cannot contain invalid source realm '{}'.", key.source),
                )),
                Some(ids) if !ids.contains(&key.id) => response.add_error(ValidationMessage::with_short(
                    "roles",
                    format!("User ID '{user_id}' Invalid role id '{}' found.", key.id),
                    format!("User cannot contain invalid role ID '{}'.", key.id),
                )),
                Some(_) => {}
            }
        }
    }

    /// Validate a user-role mapping. Role ids are checked when the mapping's source is
    /// one the context holds role ids for.
    pub fn validate_user_role_mapping(
        &self,
        context: &mut ValidationContext,
        mapping: &UserRoleMapping,
        update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();

        if mapping.user_id.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "userId",
                "UserRoleMapping has no userId.  This is a required field.",
                "UserId is required.",
            ));
        }

        if mapping.source.trim().is_empty() {
            response.add_error(ValidationMessage::with_short(
                "source",
                format!(
                    "User Role Mapping for user '{}' has no source.  This is a required field.",
                    mapping.user_id
                ),
                "Source is required.",
            ));
        }

        if let Some(existing) = context.role_mappings() {
            let known = existing.contains(&mapping.key());
            if !update && known {
                response.add_error(ValidationMessage::new(
                    "*",
                    format!("User Role Mapping for user '{}' already exists.", mapping.user_id),
                ));
            }
            if update && !known {
                response.add_error(ValidationMessage::new(
                    "*",
                    format!("No User Role Mapping found for user '{}'.", mapping.user_id),
                ));
            }
        }

        if context.is_authoritative_for(&mapping.source) {
            let keys: Vec<RoleKey> = mapping
                .roles
                .iter()
                .map(|id| RoleKey::new(id.clone(), mapping.source.clone()))
                .collect();
            self.validate_user_roles(&mapping.user_id, keys.iter(), &mut response, context);
        }

        context.ensure_role_mappings().insert(mapping.key());
        if mapping.source == self.config.default_source {
            context
                .ensure_user_role_map()
                .insert(mapping.user_id.clone(), mapping.roles.clone());
        }

        response
    }
}
