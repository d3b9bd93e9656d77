//! Privilege definitions.

use std::collections::BTreeMap;

/// A privilege is a typed, property-bearing grant that a descriptor compiles into a
/// permission string.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Privilege {
    pub id: String,
    pub name: String,
    /// Discriminator selecting the descriptor that understands `properties`.
    pub privilege_type: String,
    pub description: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl Privilege {
    /// Create a privilege of the given type with no properties.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        privilege_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            privilege_type: privilege_type.into(),
            description: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Get a property value, treating blank values as absent.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(|value| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }
}
