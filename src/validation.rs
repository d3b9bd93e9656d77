//! Validation messages and the aggregated response returned by every validate call.

use std::fmt;

/// A single validation finding.
///
/// `key` names the offending field (`"id"`, `"name"`, `"roles"`, ...). `message` is the
/// technical description, `short_message` the one meant for an end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    key: String,
    message: String,
    short_message: String,
}

impl ValidationMessage {
    /// Create a message whose user-facing text equals the technical text.
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            key: key.into(),
            short_message: message.clone(),
            message,
        }
    }

    /// Create a message with separate technical and user-facing texts.
    pub fn with_short(
        key: impl Into<String>,
        message: impl Into<String>,
        short_message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
            short_message: short_message.into(),
        }
    }

    /// The offending field.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The technical message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The user-facing message.
    pub fn short_message(&self) -> &str {
        &self.short_message
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.key, self.message)
    }
}

/// Errors and warnings collected by one validate call.
///
/// A response with no errors is valid; warnings report corrections that were applied
/// to the candidate (for instance a generated id) and never block the edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResponse {
    errors: Vec<ValidationMessage>,
    warnings: Vec<ValidationMessage>,
    modified: bool,
}

impl ValidationResponse {
    /// Create an empty (valid) response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the candidate was corrected during validation.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Mark the candidate as corrected.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Record an error.
    pub fn add_error(&mut self, message: ValidationMessage) {
        self.errors.push(message);
    }

    /// Record a warning.
    pub fn add_warning(&mut self, message: ValidationMessage) {
        self.warnings.push(message);
    }

    /// All recorded errors.
    pub fn errors(&self) -> &[ValidationMessage] {
        &self.errors
    }

    /// All recorded warnings.
    pub fn warnings(&self) -> &[ValidationMessage] {
        &self.warnings
    }

    /// Consume the response, keeping only the warnings.
    pub fn into_warnings(self) -> Vec<ValidationMessage> {
        self.warnings
    }

    /// Merge another response into this one.
    pub fn append(&mut self, other: ValidationResponse) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.modified |= other.modified;
    }

    /// Whether any error mentions `needle` in its technical or user-facing text.
    pub fn mentions(&self, needle: &str) -> bool {
        self.errors
            .iter()
            .any(|m| m.message.contains(needle) || m.short_message.contains(needle))
    }
}

impl fmt::Display for ValidationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// An entity accepted by the configuration manager together with the warnings raised
/// while validating it. `value` is the entity as stored, corrections included.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub value: T,
    pub warnings: Vec<ValidationMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_is_valid() {
        let response = ValidationResponse::new();
        assert!(response.is_valid());
        assert!(!response.is_modified());
    }

    #[test]
    fn test_append_merges_everything() {
        let mut first = ValidationResponse::new();
        first.add_warning(ValidationMessage::new("id", "fixed"));

        let mut second = ValidationResponse::new();
        second.add_error(ValidationMessage::with_short("name", "Role 'x' requires a name.", "Name is required."));
        second.set_modified(true);

        first.append(second);
        assert!(!first.is_valid());
        assert!(first.is_modified());
        assert_eq!(first.errors().len(), 1);
        assert_eq!(first.warnings().len(), 1);
        assert_eq!(first.errors()[0].short_message(), "Name is required.");
        assert!(first.mentions("requires a name"));
    }

    #[test]
    fn test_display_joins_errors() {
        let mut response = ValidationResponse::new();
        response.add_error(ValidationMessage::new("a", "first"));
        response.add_error(ValidationMessage::new("b", "second"));
        assert_eq!(response.to_string(), "a - first; b - second");
    }
}
