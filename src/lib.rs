//! # RBAC Policy
//!
//! This crate provides a role-based access control policy model: it stores privileges,
//! roles, users and user-to-role mappings, keeps that graph internally consistent, and
//! flattens a role into the permission strings it grants.
//!
//! ## Features
//!
//! - Validation of every edit, reporting all violations at once
//! - Role containment with cycle detection
//! - Transitive permission resolution that tolerates dangling references
//! - Pluggable privilege kinds through a descriptor registry
//! - Cascade cleanup of references on delete
//! - Batched edits sharing one validation context
//! - Wildcard permission implication
//! - Optional serde support and a JSON snapshot source (`persistence`)
//! - Optional async facade (`async`)
//!
//! ## Quick Start
//!
//! ```rust
//! use rbac_policy::{ConfigurationManager, Privilege, Role, User};
//! use std::collections::BTreeSet;
//!
//! let mut manager = ConfigurationManager::new()?;
//!
//! // An application privilege compiles to "{permission}:{method}"
//! manager.create_privilege(
//!     Privilege::new("p1", "Read configuration", "method")
//!         .with_property("permission", "app:config")
//!         .with_property("method", "read"),
//! )?;
//!
//! // Roles grant privileges directly and through the roles they contain
//! manager.create_role(Role::new("r1", "Config reader").add_privilege("p1"))?;
//! manager.create_role(Role::new("r2", "Auditor").contain("r1"))?;
//!
//! let roles: BTreeSet<String> = ["r2".to_string()].into_iter().collect();
//! manager.create_user(User::new("jdoe", "jdoe@example.com", "opaque-hash"), roles)?;
//!
//! assert!(manager.resolve("r2").contains("app:config:read"));
//! assert!(manager.resolve_user("jdoe").contains("app:config:read"));
//!
//! // A containment cycle is rejected
//! let cyclic = Role::new("r1", "Config reader").add_privilege("p1").contain("r2");
//! assert!(manager.update_role(cyclic).is_err());
//! # Ok::<(), rbac_policy::Error>(())
//! ```
//!
//! ## Audit Logging
//!
//! The crate logs through the `log` facade. Committed edits are logged at info level,
//! rejected edits at warn level, and skipped dangling references at debug level. With
//! the `audit` feature (on by default) a logger can be installed with:
//!
//! ```rust
//! use rbac_policy::init_audit_logger;
//!
//! // Initialize logging (must be called early in program execution)
//! init_audit_logger();
//!
//! // Configure log level through RUST_LOG environment variable:
//! // RUST_LOG=info,rbac_policy=debug
//! ```

#[cfg(feature = "audit")]
pub fn init_audit_logger() {
    let _ = env_logger::try_init();
}

pub mod batch;
pub mod cleaner;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod manager;
pub mod permission;
pub mod privilege;
pub mod property_tests;
pub mod resolver;
pub mod role;
pub mod storage;
pub mod user;
pub mod validation;
pub mod validator;

#[cfg(feature = "async")]
pub mod async_support;

// Re-export main types for convenience
pub use crate::{
    batch::{BatchConfig, BatchEdit, BatchResult},
    cleaner::ConfigurationCleaner,
    context::ValidationContext,
    descriptor::{
        ApplicationPrivilegeDescriptor, DescriptorRegistry, PrivilegeDescriptor,
        TargetPrivilegeDescriptor,
    },
    error::{Error, Result},
    graph::{Configuration, PolicyGraph},
    hierarchy::{
        HierarchyConfig, HierarchyConfigBuilder, NodeKind, RoleHierarchyTree, RoleTreeBuilder,
        RoleTreeNode,
    },
    manager::{ConfigurationManager, ManagerConfig, ManagerConfigBuilder},
    permission::WildcardPermission,
    privilege::Privilege,
    resolver::RolePermissionResolver,
    role::{Role, RoleBuilder, RoleKey, DEFAULT_SOURCE},
    storage::{ConfigurationModifier, ConfigurationSource, MemoryConfigurationSource},
    user::{User, UserRoleMapping, UserStatus},
    validation::{Validated, ValidationMessage, ValidationResponse},
    validator::{ConfigurationValidator, ValidatorConfig},
};

#[cfg(feature = "persistence")]
pub use crate::storage::FileConfigurationSource;

#[cfg(feature = "async")]
pub use crate::async_support::AsyncConfigurationManager;
