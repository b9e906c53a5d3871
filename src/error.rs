//! Query Error Types
//!
//! Every failure detected while parsing `$filter` or `$orderby` text is
//! converted, at the point of detection, into a single [`ParseError`]. The
//! message is user-safe: it only echoes the offending field or token.
//!
//! Mistakes made while *building* a registry are reported separately as
//! [`ConfigError`], since they are programming errors rather than bad input.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The query option an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryProperty {
    #[serde(rename = "$filter")]
    Filter,
    #[serde(rename = "$orderby")]
    OrderBy,
}

impl QueryProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryProperty::Filter => "$filter",
            QueryProperty::OrderBy => "$orderby",
        }
    }
}

impl fmt::Display for QueryProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unterminated literal or invalid character
    Lexical,
    /// Field name not present in the registry
    UnknownField,
    /// Operator not recognized, or not permitted for the field
    UnsupportedOperator,
    /// Constant incompatible with the field's declared type
    TypeMismatch,
    /// Null constant where null is forbidden
    NullHandling,
    /// Structural problem: parentheses, connectives, lists
    Syntax,
    /// Rejection raised by a registry or field hook
    Semantic,
    /// Input exceeds a configured length or depth limit
    Limit,
    /// Invalid or forbidden order-by direction
    Direction,
    /// Order-by field repeated
    Duplicate,
}

/// A failed `$filter` or `$orderby` parse.
///
/// Parsing stops at the first error; no partial result is ever returned
/// alongside one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    /// `$filter` or `$orderby`
    pub property: QueryProperty,

    pub kind: ErrorKind,

    /// Human-readable message with a stable prefix
    pub message: String,

    /// Byte offset of the offending token, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(
        property: QueryProperty,
        kind: ErrorKind,
        message: impl Into<String>,
        position: Option<usize>,
    ) -> Self {
        Self {
            property,
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn filter(kind: ErrorKind, message: impl Into<String>, position: Option<usize>) -> Self {
        Self::new(QueryProperty::Filter, kind, message, position)
    }

    pub fn order_by(kind: ErrorKind, message: impl Into<String>, position: Option<usize>) -> Self {
        Self::new(QueryProperty::OrderBy, kind, message, position)
    }

    /// Rejection raised by user code (hooks); carries no position.
    pub fn semantic(property: QueryProperty, message: impl Into<String>) -> Self {
        Self::new(property, ErrorKind::Semantic, message, None)
    }

    /// Re-tag an error produced by shared machinery (e.g. the lexer).
    pub(crate) fn with_property(mut self, property: QueryProperty) -> Self {
        self.property = property;
        self
    }
}

/// Registry construction and schema loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Field '{0}' is already registered")]
    DuplicateField(String),

    #[error("Default order-by '{text}' is invalid: {source}")]
    InvalidDefaultOrderBy {
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("Statement '{0}' is invalid: {1}")]
    InvalidStatement(String, String),

    #[error("Failed to read schema file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Schema validation error: {0}")]
    Validation(String),
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_display() {
        assert_eq!(QueryProperty::Filter.to_string(), "$filter");
        assert_eq!(QueryProperty::OrderBy.to_string(), "$orderby");
    }

    #[test]
    fn test_parse_error_display_is_message() {
        let err = ParseError::filter(
            ErrorKind::UnknownField,
            "Field 'foo' is not supported.",
            Some(0),
        );
        assert_eq!(err.to_string(), "Field 'foo' is not supported.");
        assert_eq!(err.property, QueryProperty::Filter);
    }

    #[test]
    fn test_parse_error_json() {
        let err = ParseError::order_by(ErrorKind::Duplicate, "dup", None);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"property\":\"$orderby\""));
        assert!(json.contains("\"kind\":\"duplicate\""));
        assert!(!json.contains("position"));
    }

    #[test]
    fn test_semantic_has_no_position() {
        let err = ParseError::semantic(QueryProperty::Filter, "only one field");
        assert_eq!(err.kind, ErrorKind::Semantic);
        assert_eq!(err.position, None);
    }

    #[test]
    fn test_with_property_retags() {
        let err = ParseError::filter(ErrorKind::Lexical, "x", Some(3))
            .with_property(QueryProperty::OrderBy);
        assert_eq!(err.property, QueryProperty::OrderBy);
        assert_eq!(err.position, Some(3));
    }
}
