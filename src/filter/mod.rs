//! `$filter` parsing.
//!
//! Text is tokenized, parsed into a validated [`Expr`] against a
//! [`FilterRegistry`], then rendered into a C#-like boolean expression with
//! positional placeholders. Field and registry defaults are applied last,
//! followed by the registry's `on_query` hook.
//!
//! ```
//! use queryfront::{filter::FilterParser, registry::{FilterRegistry, ValueType}};
//!
//! let registry = FilterRegistry::builder()
//!     .add_field("Age", ValueType::Integer, |f| f)?
//!     .build()?;
//!
//! let result = FilterParser::new(&registry).parse(Some("age in (20, 30)"))?;
//! assert_eq!(result.text(), "Age in (@0, @1)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod ast;
mod parser;
mod render;

use std::fmt;

pub use ast::{Comparison, ComparisonForm, Connective, Expr, Term};
pub use render::render_comparison;

use crate::{
    error::{ErrorKind, ParseError, ParseResult, QueryProperty},
    expression::{ExpressionBuilder, ParserResult},
    lexer::tokenize,
    registry::FilterRegistry,
};

/// Parses `$filter` text against a registry.
///
/// Cheap to construct; holds only a borrow of the registry.
#[derive(Debug, Clone, Copy)]
pub struct FilterParser<'r> {
    registry: &'r FilterRegistry,
}

impl<'r> FilterParser<'r> {
    pub fn new(registry: &'r FilterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r FilterRegistry {
        self.registry
    }

    /// Parse and render `text`.
    ///
    /// `None`, empty and whitespace-only input produce the configured
    /// defaults (possibly an empty result).
    pub fn parse(&self, text: Option<&str>) -> ParseResult<ParserResult> {
        let outcome = self.parse_inner(text);
        match &outcome {
            Ok(result) => tracing::debug!(
                property = %QueryProperty::Filter,
                expression = %result.text(),
                args = result.args().len(),
                "Parsed query option"
            ),
            Err(error) => tracing::debug!(
                property = %QueryProperty::Filter,
                kind = ?error.kind,
                position = ?error.position,
                error = %error,
                "Rejected query option"
            ),
        }
        outcome
    }

    /// Parse to the validated tree without rendering or applying defaults.
    pub fn parse_tree(&self, text: &str) -> ParseResult<Expr> {
        let text = self.check_length(text.trim())?;
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ParseError::filter(
                ErrorKind::Syntax,
                "The statement is incomplete.",
                Some(0),
            ));
        }
        Ok(parser::parse_tokens(&tokens, self.registry)?.expr)
    }

    fn parse_inner(&self, text: Option<&str>) -> ParseResult<ParserResult> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());

        let mut result = match text {
            Some(text) => self.parse_text(text)?,
            None => self.defaults_only(),
        };

        if let Some(hook) = self.registry.on_query() {
            hook(&mut result)
                .map_err(|message| ParseError::semantic(QueryProperty::Filter, message))?;
        }

        Ok(result)
    }

    fn check_length<'t>(&self, text: &'t str) -> ParseResult<&'t str> {
        let limits = self.registry.limits();
        if let Some(offset) = limits.length_overflow(text) {
            return Err(ParseError::filter(
                ErrorKind::Limit,
                format!(
                    "The statement exceeds the maximum length of {} characters.",
                    limits.max_length
                ),
                Some(offset),
            ));
        }
        Ok(text)
    }

    fn parse_text(&self, text: &str) -> ParseResult<ParserResult> {
        let text = self.check_length(text)?;
        let tokens = tokenize(text)?;
        let parsed = parser::parse_tokens(&tokens, self.registry)?;

        let mut builder = ExpressionBuilder::new();
        render::render(&parsed.expr, self.registry, &mut builder)?;

        let mut result = ParserResult::new(builder, parsed.fields, parsed.expr.has_top_level_or());
        for field in self.registry.fields() {
            if let Some(default) = field.default_statement()
                && !result.fields().contains(field.name())
            {
                result.and_statement(default);
            }
        }

        Ok(result)
    }

    fn defaults_only(&self) -> ParserResult {
        let mut result = ParserResult::default();

        let mut applied = false;
        for default in self.registry.fields().iter().filter_map(|f| f.default_statement()) {
            result.and_statement(default);
            applied = true;
        }

        if !applied && let Some(default) = self.registry.default_statement() {
            result.and_statement(default);
        }

        result
    }
}

/// Renders the registry's help listing.
impl fmt::Display for FilterParser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.registry, f)
    }
}

// =============================================================================
// Tests
// =============================================================================
