//! Schema configuration.
//!
//! Registries can be described in a TOML file instead of code, with support
//! for environment variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [filter]
//! help = "Filterable person fields"
//!
//! [[filter.fields]]
//! name = "LastName"
//! type = "string"
//! aliases = ["surname"]
//! check_not_null = true
//!
//! [[filter.fields]]
//! name = "TenantId"
//! type = "integer"
//! default = { text = "TenantId == @0", args = [${TENANT_ID}] }
//!
//! [order_by]
//! default = "LastName"
//!
//! [[order_by.fields]]
//! name = "LastName"
//!
//! [limits]
//! max_depth = 16
//! ```

mod limits;
mod observability;
mod schema;

use std::{path::Path, sync::LazyLock};

pub use limits::*;
pub use observability::*;
use regex::{Captures, Regex};
pub use schema::*;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, query::QueryConfig};

static ENV_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Root of a schema file.
///
/// All sections are optional; an empty file yields registries with no
/// fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    #[serde(default)]
    pub filter: FilterSchema,

    #[serde(default)]
    pub order_by: OrderBySchema,

    /// Applied to both parsers.
    #[serde(default)]
    pub limits: ParserLimits,

    /// Used by the command-line front end.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SchemaConfig {
    /// Load a schema from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse a schema from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: SchemaConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_length == 0 {
            return Err(ConfigError::Validation(
                "limits.max_length must be greater than zero".to_string(),
            ));
        }
        if self.limits.max_depth == 0 {
            return Err(ConfigError::Validation(
                "limits.max_depth must be greater than zero".to_string(),
            ));
        }

        let names = self
            .filter
            .fields
            .iter()
            .map(|f| ("filter", &f.name))
            .chain(self.order_by.fields.iter().map(|f| ("order_by", &f.name)));
        for (section, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{} field names must not be empty",
                    section
                )));
            }
        }

        Ok(())
    }

    pub fn filter_registry(&self) -> Result<crate::registry::FilterRegistry, ConfigError> {
        self.filter.build(self.limits)
    }

    pub fn order_by_registry(&self) -> Result<crate::registry::OrderByRegistry, ConfigError> {
        self.order_by.build(self.limits)
    }

    /// Build both registries.
    pub fn query_config(&self) -> Result<QueryConfig, ConfigError> {
        let config = QueryConfig::new(self.filter_registry()?, self.order_by_registry()?);
        tracing::debug!(
            filter_fields = self.filter.fields.len(),
            order_by_fields = self.order_by.fields.len(),
            "Built query registries"
        );
        Ok(config)
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Text after a `#` on the same line is left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    input.split_inclusive('\n').map(expand_line).collect()
}

fn expand_line(line: &str) -> Result<String, ConfigError> {
    let (body, comment) = line.split_at(line.find('#').unwrap_or(line.len()));

    let mut missing = None;
    let expanded = ENV_VAR_REGEX.replace_all(body, |caps: &Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(ConfigError::EnvVarNotFound(name)),
        None => Ok(format!("{}{}", expanded, comment)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::registry::Direction;

    const PEOPLE: &str = r#"
        [filter]
        help = "People"

        [[filter.fields]]
        name = "LastName"
        type = "string"
        aliases = ["surname"]
        check_not_null = true
        help = "Family name"

        [[filter.fields]]
        name = "FirstName"
        type = "string"
        case_fold = "upper"

        [[filter.fields]]
        name = "Age"
        type = "integer"
        deny = ["in"]

        [[filter.fields]]
        name = "IsOld"
        type = "boolean"
        nullable = true

        [order_by]
        default = "LastName, Created"

        [[order_by.fields]]
        name = "LastName"

        [[order_by.fields]]
        name = "Created"
        target = "CreatedAt"
        direction = "desc"

        [limits]
        max_depth = 8

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_people_schema() {
        let schema = SchemaConfig::from_str(PEOPLE).unwrap();
        assert_eq!(schema.limits.max_depth, 8);
        assert_eq!(schema.limits.max_length, 4096);
        assert_eq!(schema.logging.level, LogLevel::Debug);
        assert_eq!(schema.logging.format, LogFormat::Json);

        let config = schema.query_config().unwrap();
        let result = config
            .parse(Some("surname eq 'Smith' and firstname eq 'ann'"), None)
            .unwrap();
        assert_eq!(
            result.filter.text(),
            "(LastName != null && LastName == @0) && FirstName.ToUpper() == @1"
        );
        assert_eq!(result.order_by.text(), "LastName, CreatedAt desc");
        assert_eq!(
            config.order_by_registry().field("created").map(|f| f.mode()),
            Some(crate::registry::DirectionMode::Fixed(Direction::Desc))
        );
        assert_eq!(config.filter_registry().limits().max_depth, 8);
    }

    #[test]
    fn test_denied_operator_from_schema() {
        let config = SchemaConfig::from_str(PEOPLE).unwrap().query_config().unwrap();
        let error = config.parse(Some("age in (1, 2)"), None).unwrap_err();
        assert_eq!(error.message, "Field 'Age' does not support the 'in' operator.");
    }

    #[test]
    fn test_empty_schema() {
        let config = SchemaConfig::from_str("").unwrap().query_config().unwrap();
        assert!(config.filter_registry().fields().is_empty());
        assert!(config.parse(None, None).unwrap().filter.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PEOPLE.as_bytes()).unwrap();

        let schema = SchemaConfig::from_file(file.path()).unwrap();
        assert_eq!(schema.filter.fields.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let result = SchemaConfig::from_file("/nonexistent/schema.toml");
        assert!(matches!(result, Err(ConfigError::Io(_, path)) if path.ends_with("schema.toml")));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = SchemaConfig::from_str("[server]\nport = 8080");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let result = SchemaConfig::from_str("[limits]\nmax_depth = 0");
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("max_depth")));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let schema = SchemaConfig::from_str(
            r#"
            [[filter.fields]]
            name = "Age"
            type = "integer"

            [[filter.fields]]
            name = "Years"
            type = "integer"
            aliases = ["age"]
            "#,
        )
        .unwrap();
        assert!(matches!(schema.query_config(), Err(ConfigError::DuplicateField(name)) if name == "age"));
    }

    #[test]
    fn test_invalid_default_order_by_rejected() {
        let schema = SchemaConfig::from_str(
            r#"
            [order_by]
            default = "Age sideways"

            [[order_by.fields]]
            name = "Age"
            "#,
        )
        .unwrap();
        assert!(matches!(
            schema.query_config(),
            Err(ConfigError::InvalidDefaultOrderBy { .. })
        ));
    }

    #[test]
    fn test_tenant_default_from_env() {
        temp_env::with_var("QUERYFRONT_TEST_TENANT", Some("42"), || {
            let schema = SchemaConfig::from_str(
                r#"
                [[filter.fields]]
                name = "TenantId"
                type = "integer"
                default = { text = "TenantId == @0", args = [${QUERYFRONT_TEST_TENANT}] }
                "#,
            )
            .unwrap();

            let config = schema.query_config().unwrap();
            let result = config.filter_parser().parse(None).unwrap();
            assert_eq!(result.text(), "TenantId == @0");
            assert_eq!(result.args(), &[crate::expression::Value::Integer(42)]);
        });
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("QUERYFRONT_TEST_VALUE", Some("expanded"), || {
            let result = expand_env_vars("help = \"${QUERYFRONT_TEST_VALUE}\"").unwrap();
            assert_eq!(result, "help = \"expanded\"");
        });
    }

    #[test]
    fn test_env_var_multiple_per_line() {
        temp_env::with_vars(
            [
                ("QUERYFRONT_TEST_A", Some("1")),
                ("QUERYFRONT_TEST_B", Some("2")),
            ],
            || {
                let result = expand_env_vars("args = [${QUERYFRONT_TEST_A}, ${QUERYFRONT_TEST_B}]\n");
                assert_eq!(result.unwrap(), "args = [1, 2]\n");
            },
        );
    }

    #[test]
    fn test_env_var_missing() {
        let result = expand_env_vars("help = \"${QUERYFRONT_NONEXISTENT_VAR}\"");
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "QUERYFRONT_NONEXISTENT_VAR"));
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# help = \"${QUERYFRONT_NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# help = \"${QUERYFRONT_NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("help = \"x\" # ${QUERYFRONT_NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "help = \"x\" # ${QUERYFRONT_NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_keeps_trailing_newline() {
        let input = "a = 1\nb = 2\n";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }
}
