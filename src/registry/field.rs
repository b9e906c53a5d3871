//! Field definitions for the `$filter` registry.

use std::{collections::BTreeSet, fmt, str::FromStr, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    expression::{ExpressionBuilder, Statement, Value},
    filter::Comparison,
    lexer::{Keyword, Token, TokenKind},
};

/// Underlying type of a filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Decimal,
    Boolean,
    #[serde(alias = "date")]
    DateTime,
    Guid,
    /// Only comparable against `null`
    Null,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Decimal => "Decimal",
            ValueType::Boolean => "Boolean",
            ValueType::DateTime => "DateTime",
            ValueType::Guid => "Guid",
            ValueType::Null => "Null",
        }
    }

    pub fn default_operators(&self) -> BTreeSet<Operator> {
        let ops: &[Operator] = match self {
            ValueType::String => &[
                Operator::Eq,
                Operator::Ne,
                Operator::In,
                Operator::StartsWith,
                Operator::Contains,
                Operator::EndsWith,
            ],
            ValueType::Integer | ValueType::Decimal | ValueType::DateTime => &[
                Operator::Eq,
                Operator::Ne,
                Operator::Lt,
                Operator::Le,
                Operator::Gt,
                Operator::Ge,
                Operator::In,
            ],
            ValueType::Guid => &[Operator::Eq, Operator::Ne, Operator::In],
            ValueType::Boolean | ValueType::Null => &[Operator::Eq, Operator::Ne],
        };
        ops.iter().copied().collect()
    }

    pub fn default_nullable(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Null)
    }

    /// Convert an unquoted constant to this type.
    ///
    /// Returns `None` when the token text is not a valid value of the type.
    pub(crate) fn parse_bare(&self, token: &Token) -> Option<Value> {
        let text = token.text.as_str();
        match self {
            ValueType::Integer => text.parse::<i64>().ok().map(Value::Integer),
            ValueType::Decimal => Decimal::from_str(text.trim_start_matches('+'))
                .ok()
                .map(Value::Decimal),
            ValueType::Boolean => match token.kind {
                TokenKind::Bool(b) => Some(Value::Boolean(b)),
                _ => None,
            },
            ValueType::DateTime => parse_date_time(text).map(Value::DateTime),
            ValueType::Guid => Uuid::parse_str(text).ok().map(Value::Guid),
            ValueType::String | ValueType::Null => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// The fixed operator set. Ordering drives help-text listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    StartsWith,
    Contains,
    EndsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::In => "in",
            Operator::StartsWith => "startswith",
            Operator::Contains => "contains",
            Operator::EndsWith => "endswith",
        }
    }

    /// Operators usable in `field <op> constant` position.
    pub(crate) fn from_infix(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::Eq => Some(Operator::Eq),
            Keyword::Ne => Some(Operator::Ne),
            Keyword::Lt => Some(Operator::Lt),
            Keyword::Le => Some(Operator::Le),
            Keyword::Gt => Some(Operator::Gt),
            Keyword::Ge => Some(Operator::Ge),
            Keyword::In => Some(Operator::In),
            _ => None,
        }
    }

    /// Operators usable as `fn(field, constant)`.
    pub(crate) fn from_function(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::StartsWith => Some(Operator::StartsWith),
            Keyword::EndsWith => Some(Operator::EndsWith),
            Keyword::Contains => Some(Operator::Contains),
            _ => None,
        }
    }

    /// Infix symbol for binary comparisons.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("=="),
            Operator::Ne => Some("!="),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Ge => Some(">="),
            _ => None,
        }
    }

    /// Method name for string functions.
    pub fn method(&self) -> Option<&'static str> {
        match self {
            Operator::StartsWith => Some("StartsWith"),
            Operator::Contains => Some("Contains"),
            Operator::EndsWith => Some("EndsWith"),
            _ => None,
        }
    }

    pub fn allows_null(&self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case folding applied to a field access and its string constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFold {
    #[default]
    None,
    Upper,
}

/// Custom renderer for a field's comparisons.
///
/// Returns `Ok(true)` when it wrote the comparison, `Ok(false)` to fall
/// back to the default rendering (in which case it must not have written
/// anything), or `Err(message)` to reject the query.
pub type ResultWriter =
    Arc<dyn Fn(&Comparison, &mut ExpressionBuilder) -> Result<bool, String> + Send + Sync>;

/// Field-specific check run after the static operator/type rules pass.
pub type ExtendedMatch = Arc<dyn Fn(&Comparison) -> Result<(), String> + Send + Sync>;

/// A filterable field.
#[derive(Clone)]
pub struct FieldDefinition {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) target: String,
    pub(crate) value_type: ValueType,
    pub(crate) operators: BTreeSet<Operator>,
    pub(crate) nullable: bool,
    pub(crate) case_fold: CaseFold,
    pub(crate) check_not_null: bool,
    pub(crate) default_statement: Option<Statement>,
    pub(crate) result_writer: Option<ResultWriter>,
    pub(crate) extended_match: Option<ExtendedMatch>,
    pub(crate) help_text: Option<String>,
}

impl FieldDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn operators(&self) -> &BTreeSet<Operator> {
        &self.operators
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn case_fold(&self) -> CaseFold {
        self.case_fold
    }

    pub fn checks_not_null(&self) -> bool {
        self.check_not_null
    }

    pub fn default_statement(&self) -> Option<&Statement> {
        self.default_statement.as_ref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }

    /// Name or alias match, ignoring ASCII case.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Emitted field access, including case folding.
    pub fn accessor(&self) -> String {
        match self.case_fold {
            CaseFold::None => self.target.clone(),
            CaseFold::Upper => format!("{}.ToUpper()", self.target),
        }
    }

    /// Apply case folding to a constant.
    pub(crate) fn fold(&self, value: Value) -> Value {
        match (self.case_fold, value) {
            (CaseFold::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
            (_, value) => value,
        }
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("target", &self.target)
            .field("value_type", &self.value_type)
            .field("operators", &self.operators)
            .field("nullable", &self.nullable)
            .field("case_fold", &self.case_fold)
            .field("check_not_null", &self.check_not_null)
            .field("default_statement", &self.default_statement)
            .field("result_writer", &self.result_writer.is_some())
            .field("extended_match", &self.extended_match.is_some())
            .field("help_text", &self.help_text)
            .finish()
    }
}

impl fmt::Display for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.aliases.is_empty() {
            write!(f, " [{}]", self.aliases.join(", "))?;
        }
        write!(f, " ({}", self.value_type)?;
        if self.nullable {
            write!(f, ", nullable")?;
        }
        let ops = self
            .operators
            .iter()
            .map(Operator::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "): {}", ops)?;
        if let Some(help) = &self.help_text {
            write!(f, " - {}", help)?;
        }
        Ok(())
    }
}

/// Fluent configuration for a single field, passed to
/// [`FilterRegistryBuilder::add_field`](super::FilterRegistryBuilder::add_field).
pub struct FieldBuilder {
    def: FieldDefinition,
}

impl FieldBuilder {
    pub(crate) fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            def: FieldDefinition {
                name: name.to_string(),
                aliases: Vec::new(),
                target: name.to_string(),
                value_type,
                operators: value_type.default_operators(),
                nullable: value_type.default_nullable(),
                case_fold: CaseFold::None,
                check_not_null: false,
                default_statement: None,
                result_writer: None,
                extended_match: None,
                help_text: None,
            },
        }
    }

    /// Emitted identifier (defaults to the field name).
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.def.target = target.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.def.aliases.push(alias.into());
        self
    }

    /// Replace the operator set.
    pub fn operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.def.operators = operators.into_iter().collect();
        self
    }

    pub fn allow(mut self, operator: Operator) -> Self {
        self.def.operators.insert(operator);
        self
    }

    pub fn deny(mut self, operator: Operator) -> Self {
        self.def.operators.remove(&operator);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.def.nullable = nullable;
        self
    }

    pub fn case_fold(mut self, case_fold: CaseFold) -> Self {
        self.def.case_fold = case_fold;
        self
    }

    pub fn uppercase(self) -> Self {
        self.case_fold(CaseFold::Upper)
    }

    /// Guard eq/ne and string functions with `Target != null`.
    pub fn check_not_null(mut self) -> Self {
        self.def.check_not_null = true;
        self
    }

    /// Statement emitted when the field is absent from the input.
    pub fn default_statement(mut self, statement: Statement) -> Self {
        self.def.default_statement = Some(statement);
        self
    }

    pub fn result_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&Comparison, &mut ExpressionBuilder) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.def.result_writer = Some(Arc::new(writer));
        self
    }

    pub fn extended_match<F>(mut self, check: F) -> Self
    where
        F: Fn(&Comparison) -> Result<(), String> + Send + Sync + 'static,
    {
        self.def.extended_match = Some(Arc::new(check));
        self
    }

    pub fn help_text(mut self, help: impl Into<String>) -> Self {
        self.def.help_text = Some(help.into());
        self
    }

    pub(crate) fn build(self) -> FieldDefinition {
        self.def
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn token(text: &str) -> Token {
        tokenize(text).unwrap().remove(0)
    }

    #[test]
    fn test_default_operators() {
        let ops = ValueType::Boolean.default_operators();
        assert_eq!(ops.into_iter().collect::<Vec<_>>(), vec![Operator::Eq, Operator::Ne]);
        assert!(ValueType::String.default_operators().contains(&Operator::Contains));
        assert!(!ValueType::Integer.default_operators().contains(&Operator::Contains));
    }

    #[test]
    fn test_parse_bare_values() {
        assert_eq!(ValueType::Integer.parse_bare(&token("-42")), Some(Value::Integer(-42)));
        assert_eq!(ValueType::Integer.parse_bare(&token("4.2")), None);
        assert_eq!(ValueType::Integer.parse_bare(&token("12abc")), None);
        assert_eq!(
            ValueType::Decimal.parse_bare(&token("+4.25")),
            Some(Value::Decimal(Decimal::new(425, 2)))
        );
        assert_eq!(ValueType::Boolean.parse_bare(&token("TRUE")), Some(Value::Boolean(true)));
        assert_eq!(ValueType::Boolean.parse_bare(&token("1")), None);
    }

    #[test]
    fn test_parse_bare_date_time() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            ValueType::DateTime.parse_bare(&token("2024-01-31")),
            Some(Value::DateTime(midnight))
        );

        let with_time = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(
            ValueType::DateTime.parse_bare(&token("2024-01-31T10:15")),
            Some(Value::DateTime(with_time))
        );
        assert_eq!(ValueType::DateTime.parse_bare(&token("2024-02-30")), None);
    }

    #[test]
    fn test_parse_bare_guid() {
        let text = "6f9619ff-8b86-d011-b42d-00cf4fc964ff";
        assert_eq!(
            ValueType::Guid.parse_bare(&token(text)),
            Some(Value::Guid(Uuid::parse_str(text).unwrap()))
        );
        assert_eq!(ValueType::Guid.parse_bare(&token("not-a-guid")), None);
    }

    #[test]
    fn test_builder_defaults_and_overrides() {
        let field = FieldBuilder::new("FirstName", ValueType::String)
            .target("first_name")
            .alias("given")
            .uppercase()
            .deny(Operator::In)
            .build();

        assert_eq!(field.target(), "first_name");
        assert!(field.matches("FIRSTNAME"));
        assert!(field.matches("Given"));
        assert!(!field.supports(Operator::In));
        assert!(field.is_nullable());
        assert_eq!(field.accessor(), "first_name.ToUpper()");
        assert_eq!(field.fold(Value::from("Angela")), Value::from("ANGELA"));
    }

    #[test]
    fn test_display() {
        let field = FieldBuilder::new("Age", ValueType::Integer)
            .help_text("Age in years")
            .build();
        assert_eq!(
            field.to_string(),
            "Age (Integer): eq, ne, lt, le, gt, ge, in - Age in years"
        );
    }
}
