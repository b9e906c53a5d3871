use std::{fmt, sync::Arc};

use super::field::{FieldBuilder, FieldDefinition, ValueType};
use crate::{
    config::ParserLimits,
    error::ConfigError,
    expression::{ParserResult, Statement},
};

/// Hook run once per parse, after defaults are applied.
///
/// May append statements to the result or reject the query with a message.
pub type OnQuery = Arc<dyn Fn(&mut ParserResult) -> Result<(), String> + Send + Sync>;

/// Immutable `$filter` schema.
///
/// Built once and shared read-only across any number of parse calls and
/// threads.
#[derive(Clone)]
pub struct FilterRegistry {
    fields: Vec<FieldDefinition>,
    default_statement: Option<Statement>,
    on_query: Option<OnQuery>,
    help_text: Option<String>,
    limits: ParserLimits,
}

impl FilterRegistry {
    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    /// Fields in registration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Look up a field by name or alias, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.matches(name))
    }

    pub fn default_statement(&self) -> Option<&Statement> {
        self.default_statement.as_ref()
    }

    pub fn on_query(&self) -> Option<&OnQuery> {
        self.on_query.as_ref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("fields", &self.fields)
            .field("default_statement", &self.default_statement)
            .field("on_query", &self.on_query.is_some())
            .field("help_text", &self.help_text)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Help listing: optional registry help text, then one line per field.
impl fmt::Display for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::with_capacity(self.fields.len() + 1);
        if let Some(help) = &self.help_text {
            lines.push(help.clone());
        }
        lines.extend(self.fields.iter().map(|field| field.to_string()));
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Default)]
pub struct FilterRegistryBuilder {
    fields: Vec<FieldDefinition>,
    default_statement: Option<Statement>,
    on_query: Option<OnQuery>,
    help_text: Option<String>,
    limits: ParserLimits,
}

impl FilterRegistryBuilder {
    /// Register a field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateField`] if the name, or one of the
    /// aliases set by `configure`, collides with an existing field.
    pub fn add_field<F>(
        mut self,
        name: &str,
        value_type: ValueType,
        configure: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnOnce(FieldBuilder) -> FieldBuilder,
    {
        let field = configure(FieldBuilder::new(name, value_type)).build();

        for candidate in field.names() {
            if self.fields.iter().any(|existing| existing.matches(candidate)) {
                return Err(ConfigError::DuplicateField(candidate.to_string()));
            }
        }
        if let Some(alias) = field.aliases.iter().find(|a| a.eq_ignore_ascii_case(&field.name)) {
            return Err(ConfigError::DuplicateField(alias.clone()));
        }

        self.fields.push(field);
        Ok(self)
    }

    /// Fallback statement for null or empty input.
    pub fn with_default(mut self, statement: Statement) -> Self {
        self.default_statement = Some(statement);
        self
    }

    pub fn on_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ParserResult) -> Result<(), String> + Send + Sync + 'static,
    {
        self.on_query = Some(Arc::new(hook));
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

    /// Validate default statements and freeze the registry.
    pub fn build(self) -> Result<FilterRegistry, ConfigError> {
        let statements = self
            .fields
            .iter()
            .filter_map(|f| f.default_statement.as_ref())
            .chain(self.default_statement.as_ref());
        for statement in statements {
            statement
                .validate()
                .map_err(|e| ConfigError::InvalidStatement(statement.text().to_string(), e))?;
        }

        Ok(FilterRegistry {
            fields: self.fields,
            default_statement: self.default_statement,
            on_query: self.on_query,
            help_text: self.help_text,
            limits: self.limits,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Operator;

    #[test]
    fn test_duplicate_field_rejected() {
        let result = FilterRegistry::builder()
            .add_field("Age", ValueType::Integer, |f| f)
            .unwrap()
            .add_field("age", ValueType::Integer, |f| f);
        assert!(matches!(result, Err(ConfigError::DuplicateField(name)) if name == "age"));
    }

    #[test]
    fn test_alias_collision_rejected() {
        let result = FilterRegistry::builder()
            .add_field("Surname", ValueType::String, |f| f)
            .unwrap()
            .add_field("LastName", ValueType::String, |f| f.alias("SURNAME"));
        assert!(matches!(result, Err(ConfigError::DuplicateField(name)) if name == "SURNAME"));
    }

    #[test]
    fn test_target_collision_allowed() {
        let registry = FilterRegistry::builder()
            .add_field("Name", ValueType::String, |f| f.target("FullName"))
            .unwrap()
            .add_field("FullName", ValueType::String, |f| f)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(registry.fields().len(), 2);
    }

    #[test]
    fn test_lookup_by_alias() {
        let registry = FilterRegistry::builder()
            .add_field("LastName", ValueType::String, |f| f.alias("surname"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(registry.field("SURNAME").map(|f| f.name()), Some("LastName"));
        assert!(registry.field("first").is_none());
    }

    #[test]
    fn test_invalid_default_statement() {
        let result = FilterRegistry::builder()
            .with_default(Statement::new("Status == @0", vec![]))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidStatement(text, _)) if text == "Status == @0"));
    }

    #[test]
    fn test_help_listing() {
        let registry = FilterRegistry::builder()
            .with_help_text("Filterable person fields")
            .add_field("LastName", ValueType::String, |f| f.alias("surname").nullable(false))
            .unwrap()
            .add_field("IsOld", ValueType::Boolean, |f| {
                f.nullable(true).help_text("Older than 65")
            })
            .unwrap()
            .add_field("Deleted", ValueType::Null, |f| f.operators([Operator::Eq]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            registry.to_string(),
            "Filterable person fields\n\
             LastName [surname] (String): eq, ne, in, startswith, contains, endswith\n\
             IsOld (Boolean, nullable): eq, ne - Older than 65\n\
             Deleted (Null, nullable): eq"
        );
    }
}
