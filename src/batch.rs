//! Batched edits sharing one validation context.

use crate::{
    error::Error,
    privilege::Privilege,
    role::{Role, RoleKey},
    user::{User, UserRoleMapping},
};
use std::collections::BTreeSet;

/// Result of a batch operation
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    /// Successful operations with their results
    pub successes: Vec<(usize, T)>,
    /// Failed operations with their errors
    pub failures: Vec<(usize, Error)>,
}

impl<T> BatchResult<T> {
    pub fn new() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn add_success(&mut self, index: usize, result: T) {
        self.successes.push((index, result));
    }

    pub fn add_failure(&mut self, index: usize, error: Error) {
        self.failures.push((index, error));
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            return 0.0;
        }
        (self.successes.len() as f64 / total as f64) * 100.0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of edits that were attempted.
    pub fn total_operations(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// The error recorded for edit `index`, if it failed.
    pub fn failure(&self, index: usize) -> Option<&Error> {
        self.failures
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, error)| error)
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One edit in a batch.
#[derive(Debug, Clone)]
pub enum BatchEdit {
    CreatePrivilege(Privilege),
    UpdatePrivilege(Privilege),
    CreateRole(Role),
    UpdateRole(Role),
    /// Create a user and its default-source mapping to `roles`.
    CreateUser { user: User, roles: BTreeSet<String> },
    /// Replace a user and its default-source mapping.
    UpdateUser { user: User, roles: BTreeSet<String> },
    CreateMapping(UserRoleMapping),
    UpdateMapping(UserRoleMapping),
    DeletePrivilege(String),
    DeleteRole(RoleKey),
    DeleteUser(String),
    DeleteMapping { user_id: String, source: String },
}

impl BatchEdit {
    /// Short label for logging.
    pub fn describe(&self) -> String {
        match self {
            BatchEdit::CreatePrivilege(p) => format!("create privilege '{}'", p.id),
            BatchEdit::UpdatePrivilege(p) => format!("update privilege '{}'", p.id),
            BatchEdit::CreateRole(r) => format!("create role '{}'", r.key),
            BatchEdit::UpdateRole(r) => format!("update role '{}'", r.key),
            BatchEdit::CreateUser { user, .. } => format!("create user '{}'", user.id),
            BatchEdit::UpdateUser { user, .. } => format!("update user '{}'", user.id),
            BatchEdit::CreateMapping(m) => {
                format!("create mapping '{}' in '{}'", m.user_id, m.source)
            }
            BatchEdit::UpdateMapping(m) => {
                format!("update mapping '{}' in '{}'", m.user_id, m.source)
            }
            BatchEdit::DeletePrivilege(id) => format!("delete privilege '{id}'"),
            BatchEdit::DeleteRole(key) => format!("delete role '{key}'"),
            BatchEdit::DeleteUser(id) => format!("delete user '{id}'"),
            BatchEdit::DeleteMapping { user_id, source } => {
                format!("delete mapping '{user_id}' in '{source}'")
            }
        }
    }
}

/// Batch operations configuration
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Stop at the first rejected edit instead of continuing with the rest
    pub fail_fast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_result_accounting() {
        let mut result: BatchResult<()> = BatchResult::new();
        assert_eq!(result.success_rate(), 0.0);

        result.add_success(0, ());
        result.add_failure(1, Error::PrivilegeNotFound("p".to_string()));
        result.add_success(2, ());

        assert_eq!(result.total_operations(), 3);
        assert!(!result.all_succeeded());
        assert!(result.failure(1).is_some());
        assert!(result.failure(0).is_none());
        assert!((result.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_edit_labels() {
        let edit = BatchEdit::CreateRole(Role::new("r1", "R1"));
        assert_eq!(edit.describe(), "create role 'r1@default'");
    }
}
