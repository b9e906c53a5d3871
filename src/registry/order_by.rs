use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{config::ParserLimits, error::ConfigError, order_by::OrderByParser};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    pub(crate) fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if word.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether callers may choose a field's direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirectionMode {
    #[default]
    Bidirectional,
    /// Always sorted this way; an explicit direction is rejected
    Fixed(Direction),
}

/// A sortable field.
#[derive(Debug, Clone)]
pub struct OrderField {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) target: String,
    pub(crate) mode: DirectionMode,
    pub(crate) help_text: Option<String>,
}

impl OrderField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> DirectionMode {
        self.mode
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.aliases.is_empty() {
            write!(f, " [{}]", self.aliases.join(", "))?;
        }
        match self.mode {
            DirectionMode::Bidirectional => write!(f, ": asc, desc")?,
            DirectionMode::Fixed(direction) => write!(f, ": {} only", direction)?,
        }
        if let Some(help) = &self.help_text {
            write!(f, " - {}", help)?;
        }
        Ok(())
    }
}

pub struct OrderFieldBuilder {
    field: OrderField,
}

impl OrderFieldBuilder {
    fn new(name: &str) -> Self {
        Self {
            field: OrderField {
                name: name.to_string(),
                aliases: Vec::new(),
                target: name.to_string(),
                mode: DirectionMode::Bidirectional,
                help_text: None,
            },
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.field.target = target.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.field.aliases.push(alias.into());
        self
    }

    pub fn fixed(mut self, direction: Direction) -> Self {
        self.field.mode = DirectionMode::Fixed(direction);
        self
    }

    pub fn help_text(mut self, help: impl Into<String>) -> Self {
        self.field.help_text = Some(help.into());
        self
    }
}

/// Immutable `$orderby` schema.
#[derive(Debug, Clone)]
pub struct OrderByRegistry {
    fields: Vec<OrderField>,
    default_text: Option<String>,
    help_text: Option<String>,
    limits: ParserLimits,
}

impl OrderByRegistry {
    pub fn builder() -> OrderByRegistryBuilder {
        OrderByRegistryBuilder::default()
    }

    pub fn fields(&self) -> &[OrderField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&OrderField> {
        self.fields.iter().find(|f| f.matches(name))
    }

    /// Order-by text used for null or empty input.
    pub fn default_text(&self) -> Option<&str> {
        self.default_text.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }
}

impl fmt::Display for OrderByRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        if let Some(help) = &self.help_text {
            lines.push(help.clone());
        }
        lines.extend(self.fields.iter().map(|field| field.to_string()));
        if let Some(default) = &self.default_text {
            lines.push(format!("Default: {}", default));
        }
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Debug, Default)]
pub struct OrderByRegistryBuilder {
    fields: Vec<OrderField>,
    default_text: Option<String>,
    help_text: Option<String>,
    limits: ParserLimits,
}

impl OrderByRegistryBuilder {
    /// Register a sortable field.
    pub fn add_field<F>(mut self, name: &str, configure: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(OrderFieldBuilder) -> OrderFieldBuilder,
    {
        let field = configure(OrderFieldBuilder::new(name)).field;

        let names = std::iter::once(&field.name).chain(field.aliases.iter());
        for candidate in names {
            if self.fields.iter().any(|existing| existing.matches(candidate)) {
                return Err(ConfigError::DuplicateField(candidate.clone()));
            }
        }

        self.fields.push(field);
        Ok(self)
    }

    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default_text = Some(text.into());
        self
    }

    pub fn with_help_text(mut self, help: impl Into<String>) -> Self {
        self.help_text = Some(help.into());
        self
    }

    pub fn with_limits(mut self, limits: ParserLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Freeze the registry, checking that the default text parses.
    pub fn build(self) -> Result<OrderByRegistry, ConfigError> {
        let registry = OrderByRegistry {
            fields: self.fields,
            default_text: self.default_text,
            help_text: self.help_text,
            limits: self.limits,
        };

        if let Some(text) = registry.default_text() {
            OrderByParser::new(&registry)
                .parse(Some(text))
                .map_err(|source| ConfigError::InvalidDefaultOrderBy {
                    text: text.to_string(),
                    source,
                })?;
        }

        Ok(registry)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_rejected() {
        let result = OrderByRegistry::builder()
            .add_field("LastName", |f| f)
            .unwrap()
            .with_default("FirstName")
            .build();
        match result {
            Err(ConfigError::InvalidDefaultOrderBy { text, source }) => {
                assert_eq!(text, "FirstName");
                assert_eq!(source.message, "Field 'FirstName' is not supported.");
            }
            other => panic!("Expected InvalidDefaultOrderBy, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = OrderByRegistry::builder()
            .add_field("Age", |f| f)
            .unwrap()
            .add_field("Years", |f| f.alias("AGE"));
        assert!(matches!(result, Err(ConfigError::DuplicateField(name)) if name == "AGE"));
    }

    #[test]
    fn test_help_listing() {
        let registry = OrderByRegistry::builder()
            .add_field("LastName", |f| f.help_text("Family name"))
            .unwrap()
            .add_field("Created", |f| f.target("CreatedAt").fixed(Direction::Desc))
            .unwrap()
            .with_default("LastName")
            .build()
            .unwrap();

        assert_eq!(
            registry.to_string(),
            "LastName: asc, desc - Family name\nCreated: desc only\nDefault: LastName"
        );
    }

    #[test]
    fn test_direction_from_word() {
        assert_eq!(Direction::from_word("ASC"), Some(Direction::Asc));
        assert_eq!(Direction::from_word("Desc"), Some(Direction::Desc));
        assert_eq!(Direction::from_word("up"), None);
    }
}
