//! Wildcard permission strings and the implication rule.
//!
//! A permission string is a colon-delimited list of parts; each part is either the
//! wildcard `*` or a comma-separated set of literal tokens, e.g. `app:config:read,update`.
//! Tokens are compared case-insensitively.
//!
//! A granted permission implies a requested one when, position by position, each granted
//! part is the wildcard or a superset of the requested part. Requested parts beyond the
//! granted length are implied (a shorter grant is broader); granted parts beyond the
//! requested length must be wildcards.

use std::{collections::BTreeSet, fmt, str::FromStr};

/// The wildcard token.
pub const WILDCARD: &str = "*";

/// Why a permission string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid permission '{permission}': {reason}")]
pub struct PermissionParseError {
    pub permission: String,
    pub reason: String,
}

/// A parsed permission string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardPermission {
    parts: Vec<BTreeSet<String>>,
}

impl WildcardPermission {
    /// Parse a permission string.
    pub fn parse(permission: &str) -> Result<Self, PermissionParseError> {
        let invalid = |reason: &str| PermissionParseError {
            permission: permission.to_string(),
            reason: reason.to_string(),
        };

        if permission.trim().is_empty() {
            return Err(invalid("permission cannot be empty"));
        }
        if permission.contains('\0') {
            return Err(invalid("permission cannot contain null characters"));
        }

        let mut parts = Vec::new();
        for raw_part in permission.trim().split(':') {
            let tokens: BTreeSet<String> = raw_part
                .split(',')
                .map(|token| token.trim().to_lowercase())
                .collect();

            if tokens.iter().any(|token| token.is_empty()) {
                return Err(invalid("permission parts cannot be empty"));
            }
            parts.push(tokens);
        }

        Ok(Self { parts })
    }

    /// The parsed parts.
    pub fn parts(&self) -> &[BTreeSet<String>] {
        &self.parts
    }

    fn is_wildcard(part: &BTreeSet<String>) -> bool {
        part.contains(WILDCARD)
    }

    /// Whether holding `self` grants `requested`.
    pub fn implies(&self, requested: &WildcardPermission) -> bool {
        for (index, requested_part) in requested.parts.iter().enumerate() {
            let Some(granted_part) = self.parts.get(index) else {
                return true;
            };
            if !Self::is_wildcard(granted_part) && !granted_part.is_superset(requested_part) {
                return false;
            }
        }

        self.parts
            .iter()
            .skip(requested.parts.len())
            .all(Self::is_wildcard)
    }

    /// Parse `requested` and test it; unparseable requests are never implied.
    pub fn implies_str(&self, requested: &str) -> bool {
        Self::parse(requested)
            .map(|requested| self.implies(&requested))
            .unwrap_or(false)
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .parts
            .iter()
            .map(|part| part.iter().cloned().collect::<Vec<_>>().join(","))
            .collect();
        f.write_str(&rendered.join(":"))
    }
}

impl FromStr for WildcardPermission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether any of `granted` implies `requested`.
pub fn any_implies<'a, I>(granted: I, requested: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    let Ok(requested) = WildcardPermission::parse(requested) else {
        return false;
    };
    granted.into_iter().any(|permission| {
        WildcardPermission::parse(permission)
            .map(|granted| granted.implies(&requested))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(s: &str) -> WildcardPermission {
        WildcardPermission::parse(s).unwrap()
    }

    #[test]
    fn test_exact_match() {
        assert!(perm("app:config:read").implies(&perm("app:config:read")));
        assert!(!perm("app:config:read").implies(&perm("app:config:write")));
    }

    #[test]
    fn test_wildcard_part() {
        assert!(perm("app:*:read").implies(&perm("app:users:read")));
        assert!(perm("*").implies(&perm("anything:at:all")));
        assert!(!perm("app:*:read").implies(&perm("app:users:delete")));
    }

    #[test]
    fn test_shorter_grant_is_broader() {
        assert!(perm("app").implies(&perm("app:config:read")));
        assert!(!perm("app:config:read").implies(&perm("app:config")));
        assert!(perm("app:config:*").implies(&perm("app:config")));
    }

    #[test]
    fn test_subparts() {
        assert!(perm("app:config:read,update").implies(&perm("app:config:read")));
        assert!(perm("app:config:read,update").implies(&perm("app:config:update,read")));
        assert!(!perm("app:config:read").implies(&perm("app:config:read,update")));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(perm("App:Config:READ").implies(&perm("app:config:read")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(WildcardPermission::parse("").is_err());
        assert!(WildcardPermission::parse("app::read").is_err());
        assert!(WildcardPermission::parse("app:read,").is_err());
        assert!(WildcardPermission::parse("app\0:read").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let permission = perm("app:config:update,read");
        assert_eq!(permission.to_string(), "app:config:read,update");
    }

    #[test]
    fn test_any_implies() {
        let granted = vec!["app:config:read".to_string(), "target:maven:*:read".to_string()];
        assert!(any_implies(&granted, "target:maven:releases:read"));
        assert!(!any_implies(&granted, "app:users:read"));
        assert!(!any_implies(&granted, ""));
    }
}
