//! Expression building and parse results.
//!
//! Rendered expressions reference their literals through positional
//! placeholders (`@0`, `@1`, ...). The builder hands out placeholders in the
//! order literals are consumed, so `args[n]` always binds `@n`. Binding the
//! placeholders to an evaluator is the consumer's job.

use std::{collections::BTreeSet, fmt, sync::LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\d+)").unwrap());

/// A literal value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::Guid(g) => write!(f, "{}", g),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

/// An expression fragment paired with its own positional arguments.
///
/// Placeholders are local to the statement (`@0` is the statement's first
/// arg); they are renumbered when the statement is appended to a builder
/// that already holds arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    text: String,
    args: Vec<Value>,
}

impl Statement {
    pub fn new(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            args,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Every placeholder must reference an argument.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("statement text must not be empty".to_string());
        }
        for cap in PLACEHOLDER_REGEX.captures_iter(&self.text) {
            let index: usize = cap[1]
                .parse()
                .map_err(|_| format!("placeholder '{}' is out of range", &cap[0]))?;
            if index >= self.args.len() {
                return Err(format!(
                    "placeholder '{}' has no matching argument ({} supplied)",
                    &cap[0],
                    self.args.len()
                ));
            }
        }
        Ok(())
    }

    /// Text with every `@n` shifted to `@(n + offset)`.
    fn rebased_text(&self, offset: usize) -> String {
        if offset == 0 {
            return self.text.clone();
        }
        PLACEHOLDER_REGEX
            .replace_all(&self.text, |cap: &regex::Captures<'_>| {
                match cap[1].parse::<usize>() {
                    Ok(index) => format!("@{}", index + offset),
                    Err(_) => cap[0].to_string(),
                }
            })
            .into_owned()
    }

    fn needs_group(&self) -> bool {
        self.text.contains("||")
    }
}

/// Accumulates rendered text and the positional argument list.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    text: String,
    args: Vec<Value>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Add an argument and return its placeholder (e.g. `@3`).
    pub fn add_arg(&mut self, value: Value) -> String {
        self.args.push(value);
        format!("@{}", self.args.len() - 1)
    }

    /// Append a statement, renumbering its placeholders.
    pub fn push_statement(&mut self, statement: &Statement) {
        let text = statement.rebased_text(self.args.len());
        self.text.push_str(&text);
        self.args.extend(statement.args.iter().cloned());
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn finish(self) -> (String, Vec<Value>) {
        (self.text, self.args)
    }
}

/// Successful `$filter` parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParserResult {
    text: String,
    args: Vec<Value>,
    fields: BTreeSet<String>,

    /// Top-level chain contains `||`; group before AND-appending
    #[serde(skip)]
    top_level_or: bool,
}

impl ParserResult {
    pub(crate) fn new(
        builder: ExpressionBuilder,
        fields: BTreeSet<String>,
        top_level_or: bool,
    ) -> Self {
        let (text, args) = builder.finish();
        Self {
            text,
            args,
            fields,
            top_level_or,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_text(&self) -> String {
        self.text.clone()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Canonical names of the fields referenced by the input.
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// AND a statement onto the end of the expression.
    pub fn and_statement(&mut self, statement: &Statement) {
        let mut builder = ExpressionBuilder {
            text: String::new(),
            args: std::mem::take(&mut self.args),
        };

        // An empty result takes the statement verbatim, grouped only once
        // something is joined to it.
        if self.text.is_empty() {
            builder.push_statement(statement);
            let (text, args) = builder.finish();
            self.text = text;
            self.args = args;
            self.top_level_or = statement.needs_group();
            return;
        }

        if self.top_level_or {
            builder.push_str(&format!("({})", self.text));
        } else {
            builder.push_str(&self.text);
        }
        builder.push_str(" && ");

        if statement.needs_group() {
            builder.push_str("(");
            builder.push_statement(statement);
            builder.push_str(")");
        } else {
            builder.push_statement(statement);
        }

        let (text, args) = builder.finish();
        self.text = text;
        self.args = args;
        self.top_level_or = false;
    }
}

impl fmt::Display for ParserResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// Tests
// =============================================================================
