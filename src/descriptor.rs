//! Privilege descriptors: one per privilege kind, registered by type discriminator.
//!
//! A descriptor validates the kind-specific properties of a privilege and compiles a
//! privilege into a permission string understood by
//! [`WildcardPermission`](crate::permission::WildcardPermission). New kinds register
//! with a [`DescriptorRegistry`] without touching the validator or the resolver.

use crate::{
    context::ValidationContext,
    privilege::Privilege,
    validation::{ValidationMessage, ValidationResponse},
};
use std::{collections::HashMap, fmt, sync::Arc};

/// Behaviour of one privilege kind.
pub trait PrivilegeDescriptor: Send + Sync {
    /// The type discriminator this descriptor handles.
    fn privilege_type(&self) -> &str;

    /// Human-readable kind name.
    fn name(&self) -> &str;

    /// Validate the kind-specific properties of `privilege`.
    fn validate(
        &self,
        privilege: &Privilege,
        context: &ValidationContext,
        update: bool,
    ) -> ValidationResponse;

    /// Compile `privilege` into a permission string, or `None` when its properties do
    /// not describe one.
    fn compile_permission(&self, privilege: &Privilege) -> Option<String>;
}

/// Descriptors keyed by privilege type.
#[derive(Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<String, Arc<dyn PrivilegeDescriptor>>,
}

impl fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl DescriptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `method` and `target` kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ApplicationPrivilegeDescriptor);
        registry.register(TargetPrivilegeDescriptor);
        registry
    }

    /// Register a descriptor, returning the one it replaces for the same type.
    pub fn register<D>(&mut self, descriptor: D) -> Option<Arc<dyn PrivilegeDescriptor>>
    where
        D: PrivilegeDescriptor + 'static,
    {
        let privilege_type = descriptor.privilege_type().to_string();
        self.descriptors.insert(privilege_type, Arc::new(descriptor))
    }

    /// The descriptor for `privilege_type`.
    pub fn get(&self, privilege_type: &str) -> Option<&Arc<dyn PrivilegeDescriptor>> {
        self.descriptors.get(privilege_type)
    }

    /// Whether a descriptor exists for `privilege_type`.
    pub fn contains(&self, privilege_type: &str) -> bool {
        self.descriptors.contains_key(privilege_type)
    }

    /// Registered type discriminators, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.descriptors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Compile a privilege with the descriptor of its type.
    pub fn compile_permission(&self, privilege: &Privilege) -> Option<String> {
        self.get(&privilege.privilege_type)?
            .compile_permission(privilege)
    }
}

fn require_property(
    privilege: &Privilege,
    key: &str,
    label: &str,
    response: &mut ValidationResponse,
) {
    if privilege.property(key).is_none() {
        response.add_error(ValidationMessage::with_short(
            key,
            format!("Privilege ID '{}' requires the '{key}' property.", privilege.id),
            format!("{label} is required."),
        ));
    }
}

fn validate_method_list(privilege: &Privilege, response: &mut ValidationResponse) {
    let Some(methods) = privilege.property(METHOD_PROPERTY) else {
        return;
    };

    let malformed = methods
        .split(',')
        .any(|token| token.trim().is_empty() || token.contains(':'));
    if malformed {
        response.add_error(ValidationMessage::with_short(
            METHOD_PROPERTY,
            format!(
                "Privilege ID '{}' has an invalid method list '{methods}'.",
                privilege.id
            ),
            "Method must be a comma separated list of names.",
        ));
    }
}

/// Property naming the method(s) a privilege allows.
pub const METHOD_PROPERTY: &str = "method";
/// Property naming the permission domain of an application privilege.
pub const PERMISSION_PROPERTY: &str = "permission";
/// Property naming the target of a target privilege.
pub const TARGET_PROPERTY: &str = "target";
/// Optional property naming the resource of a target privilege.
pub const RESOURCE_PROPERTY: &str = "resource";

/// Application privileges: a permission domain plus the allowed methods.
///
/// `permission = "app:config"`, `method = "read"` compiles to `app:config:read`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationPrivilegeDescriptor;

impl ApplicationPrivilegeDescriptor {
    pub const TYPE: &'static str = "method";
}

impl PrivilegeDescriptor for ApplicationPrivilegeDescriptor {
    fn privilege_type(&self) -> &str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        "Application"
    }

    fn validate(
        &self,
        privilege: &Privilege,
        _context: &ValidationContext,
        _update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        require_property(privilege, PERMISSION_PROPERTY, "Permission", &mut response);
        require_property(privilege, METHOD_PROPERTY, "Method", &mut response);
        validate_method_list(privilege, &mut response);
        response
    }

    fn compile_permission(&self, privilege: &Privilege) -> Option<String> {
        let permission = privilege.property(PERMISSION_PROPERTY)?;
        let method = privilege.property(METHOD_PROPERTY)?;
        Some(format!("{permission}:{method}"))
    }
}

/// Target privileges: methods allowed on a named target, optionally narrowed to one
/// resource. Compiles to `target:{target}:{resource or *}:{method}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetPrivilegeDescriptor;

impl TargetPrivilegeDescriptor {
    pub const TYPE: &'static str = "target";
}

impl PrivilegeDescriptor for TargetPrivilegeDescriptor {
    fn privilege_type(&self) -> &str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        "Target"
    }

    fn validate(
        &self,
        privilege: &Privilege,
        _context: &ValidationContext,
        _update: bool,
    ) -> ValidationResponse {
        let mut response = ValidationResponse::new();
        require_property(privilege, TARGET_PROPERTY, "Target", &mut response);
        require_property(privilege, METHOD_PROPERTY, "Method", &mut response);
        validate_method_list(privilege, &mut response);

        if let Some(target) = privilege.property(TARGET_PROPERTY) {
            if target.contains(':') {
                response.add_error(ValidationMessage::with_short(
                    TARGET_PROPERTY,
                    format!(
                        "Privilege ID '{}' has a target '{target}' containing ':'.",
                        privilege.id
                    ),
                    "Target cannot contain ':'.",
                ));
            }
        }
        response
    }

    fn compile_permission(&self, privilege: &Privilege) -> Option<String> {
        let target = privilege.property(TARGET_PROPERTY)?;
        let method = privilege.property(METHOD_PROPERTY)?;
        let resource = privilege.property(RESOURCE_PROPERTY).unwrap_or("*");
        Some(format!("target:{target}:{resource}:{method}"))
    }
}
