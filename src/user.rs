//! Users and their role mappings.

use std::{collections::BTreeSet, fmt, str::FromStr};

/// Status string of an enabled user.
pub const STATUS_ACTIVE: &str = "active";
/// Status string of a disabled user.
pub const STATUS_DISABLED: &str = "disabled";

/// The two statuses a stored user may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => STATUS_ACTIVE,
            UserStatus::Disabled => STATUS_DISABLED,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATUS_ACTIVE => Ok(UserStatus::Active),
            STATUS_DISABLED => Ok(UserStatus::Disabled),
            other => Err(format!("unknown user status '{other}'")),
        }
    }
}

/// A locally managed user.
///
/// `status` is kept as the raw stored string so that a snapshot carrying an unknown
/// status can be loaded and reported by validation instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    /// Opaque password representation; hashing happens outside this crate.
    pub password: String,
    pub status: String,
}

impl User {
    /// Create an active user.
    pub fn new(id: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            email: email.into(),
            password: password.into(),
            status: STATUS_ACTIVE.to_string(),
        }
    }

    /// Set first and last name.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// Set the raw status string.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// The parsed status, if the stored string is a known one.
    pub fn parsed_status(&self) -> Option<UserStatus> {
        self.status.parse().ok()
    }

    /// Whether the user is active.
    pub fn is_active(&self) -> bool {
        self.parsed_status() == Some(UserStatus::Active)
    }
}

/// The roles granted to a user of `source`. Role ids are interpreted within `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct UserRoleMapping {
    pub user_id: String,
    pub source: String,
    pub roles: BTreeSet<String>,
}

impl UserRoleMapping {
    /// Create a mapping.
    pub fn new<I, R>(user_id: impl Into<String>, source: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            source: source.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The `(user_id, source)` pair identifying this mapping.
    pub fn key(&self) -> (String, String) {
        (self.user_id.clone(), self.source.clone())
    }
}
