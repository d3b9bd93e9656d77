//! Error types for the policy model.

use crate::{role::RoleKey, validation::ValidationResponse};
use thiserror::Error;

/// The main error type for policy model operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A create or update was rejected; carries every validation message found.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(Box<ValidationResponse>),

    /// Privilege with the given id was not found.
    #[error("Privilege '{0}' not found")]
    PrivilegeNotFound(String),

    /// Role with the given key was not found.
    #[error("Role '{0}' not found")]
    RoleNotFound(RoleKey),

    /// User with the given id was not found.
    #[error("User '{0}' not found")]
    UserNotFound(String),

    /// No role mapping exists for the user in the given source.
    #[error("No user role mapping for user '{user_id}' in source '{realm}'")]
    RoleMappingNotFound { user_id: String, realm: String },

    /// An invariant the engine relies on is broken; not caused by user input.
    #[error("Configuration integrity fault: {0}")]
    IntegrityFault(String),

    /// The snapshot provider failed.
    #[error("Storage operation failed: {0}")]
    Storage(String),
}

impl Error {
    /// Whether this error reports a missing entity rather than a malformed one.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::PrivilegeNotFound(_)
                | Error::RoleNotFound(_)
                | Error::UserNotFound(_)
                | Error::RoleMappingNotFound { .. }
        )
    }

    /// The validation response behind an `InvalidConfiguration` error.
    pub fn validation(&self) -> Option<&ValidationResponse> {
        match self {
            Error::InvalidConfiguration(response) => Some(response),
            _ => None,
        }
    }
}

impl From<ValidationResponse> for Error {
    fn from(response: ValidationResponse) -> Self {
        Error::InvalidConfiguration(Box::new(response))
    }
}

/// Result type alias for policy model operations.
pub type Result<T> = std::result::Result<T, Error>;
