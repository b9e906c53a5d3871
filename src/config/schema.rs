use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    expression::{Statement, Value},
    lexer::tokenize,
    registry::{
        CaseFold, Direction, FilterRegistry, FilterRegistryBuilder, Operator, OrderByRegistry,
        OrderByRegistryBuilder, ValueType,
    },
};

use super::ParserLimits;

/// `[filter]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSchema {
    /// Registry help line shown above the field listing.
    #[serde(default)]
    pub help: Option<String>,

    /// Fallback statement for empty input when no field default applies.
    #[serde(default)]
    pub default: Option<StatementConfig>,

    #[serde(default)]
    pub fields: Vec<FilterFieldConfig>,
}

impl FilterSchema {
    pub fn build(&self, limits: ParserLimits) -> Result<FilterRegistry, ConfigError> {
        let mut builder = FilterRegistryBuilder::default().with_limits(limits);
        if let Some(help) = &self.help {
            builder = builder.with_help_text(help);
        }
        if let Some(default) = &self.default {
            builder = builder.with_default(default.to_statement()?);
        }

        for field in &self.fields {
            let default = field
                .default
                .as_ref()
                .map(StatementConfig::to_statement)
                .transpose()?;

            builder = builder.add_field(&field.name, field.value_type, |mut f| {
                if let Some(target) = &field.target {
                    f = f.target(target);
                }
                for alias in &field.aliases {
                    f = f.alias(alias);
                }
                if let Some(operators) = &field.operators {
                    f = f.operators(operators.iter().copied());
                }
                for operator in &field.allow {
                    f = f.allow(*operator);
                }
                for operator in &field.deny {
                    f = f.deny(*operator);
                }
                if let Some(nullable) = field.nullable {
                    f = f.nullable(nullable);
                }
                if field.check_not_null {
                    f = f.check_not_null();
                }
                if let Some(statement) = default {
                    f = f.default_statement(statement);
                }
                if let Some(help) = &field.help {
                    f = f.help_text(help);
                }
                f.case_fold(field.case_fold)
            })?;
        }

        builder.build()
    }
}

/// One `[[filter.fields]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterFieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Emitted identifier. Defaults to `name`.
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// Replaces the type's default operator set.
    #[serde(default)]
    pub operators: Option<Vec<Operator>>,

    /// Added to the operator set.
    #[serde(default)]
    pub allow: Vec<Operator>,

    /// Removed from the operator set.
    #[serde(default)]
    pub deny: Vec<Operator>,

    /// Defaults to true for `string` and `null` fields.
    #[serde(default)]
    pub nullable: Option<bool>,

    #[serde(default)]
    pub case_fold: CaseFold,

    #[serde(default)]
    pub check_not_null: bool,

    /// Appended when the field does not appear in the input.
    #[serde(default)]
    pub default: Option<StatementConfig>,

    #[serde(default)]
    pub help: Option<String>,
}

/// A statement with its own `@0..` arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatementConfig {
    pub text: String,

    #[serde(default)]
    pub args: Vec<ArgValue>,
}

impl StatementConfig {
    pub fn to_statement(&self) -> Result<Statement, ConfigError> {
        let args = self
            .args
            .iter()
            .map(ArgValue::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Statement::new(self.text.clone(), args))
    }
}

/// A statement argument.
///
/// Plain TOML booleans, integers, floats and strings map directly; other
/// types use the tagged form `{ type = "guid", value = "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Typed {
        #[serde(rename = "type")]
        value_type: ValueType,
        #[serde(default)]
        value: Option<String>,
    },
}

impl ArgValue {
    pub fn to_value(&self) -> Result<Value, ConfigError> {
        match self {
            ArgValue::Boolean(b) => Ok(Value::Boolean(*b)),
            ArgValue::Integer(n) => Ok(Value::Integer(*n)),
            ArgValue::Float(f) => Decimal::try_from(*f)
                .map(Value::Decimal)
                .map_err(|e| ConfigError::Validation(format!("argument {} is not a decimal: {}", f, e))),
            ArgValue::String(s) => Ok(Value::String(s.clone())),
            ArgValue::Typed { value_type, value } => typed_value(*value_type, value.as_deref()),
        }
    }
}

fn typed_value(value_type: ValueType, text: Option<&str>) -> Result<Value, ConfigError> {
    let invalid = |text: &str| {
        ConfigError::Validation(format!("argument '{}' is not a valid {}", text, value_type))
    };

    match (value_type, text) {
        (ValueType::Null, None) => Ok(Value::Null),
        (ValueType::Null, Some(text)) => Err(invalid(text)),
        (_, None) => Err(ConfigError::Validation(format!(
            "argument of type {} requires a value",
            value_type
        ))),
        (ValueType::String, Some(text)) => Ok(Value::String(text.to_string())),
        (_, Some(text)) => {
            let tokens = tokenize(text).map_err(|_| invalid(text))?;
            match tokens.as_slice() {
                [token] => value_type.parse_bare(token).ok_or_else(|| invalid(text)),
                _ => Err(invalid(text)),
            }
        }
    }
}

/// `[order_by]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderBySchema {
    #[serde(default)]
    pub help: Option<String>,

    /// Order-by text used for empty input, e.g. `"LastName, Created desc"`.
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub fields: Vec<OrderFieldConfig>,
}

impl OrderBySchema {
    pub fn build(&self, limits: ParserLimits) -> Result<OrderByRegistry, ConfigError> {
        let mut builder = OrderByRegistryBuilder::default().with_limits(limits);
        if let Some(help) = &self.help {
            builder = builder.with_help_text(help);
        }
        if let Some(default) = &self.default {
            builder = builder.with_default(default);
        }

        for field in &self.fields {
            builder = builder.add_field(&field.name, |mut f| {
                if let Some(target) = &field.target {
                    f = f.target(target);
                }
                for alias in &field.aliases {
                    f = f.alias(alias);
                }
                if let Some(direction) = field.direction {
                    f = f.fixed(direction);
                }
                if let Some(help) = &field.help {
                    f = f.help_text(help);
                }
                f
            })?;
        }

        builder.build()
    }
}

/// One `[[order_by.fields]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderFieldConfig {
    pub name: String,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// Fixes the sort direction; callers may then not specify one.
    #[serde(default)]
    pub direction: Option<Direction>,

    #[serde(default)]
    pub help: Option<String>,
}
