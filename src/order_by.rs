//! `$orderby` parsing.
//!
//! Grammar: `field [asc|desc] { "," field [asc|desc] }`. Each clause is
//! validated against an [`OrderByRegistry`] and rendered as `Target` or
//! `Target desc`, joined by `", "`.

use std::fmt;

use serde::Serialize;

use crate::{
    error::{ErrorKind, ParseError, ParseResult, QueryProperty},
    lexer::{Token, TokenKind, tokenize},
    registry::{Direction, DirectionMode, OrderByRegistry, OrderField},
};

const SYNTAX_ERROR: &str = "Statement is syntactically incorrect.";

/// One validated sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderClause {
    /// Canonical field name
    pub field: String,
    pub target: String,
    pub direction: Direction,
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => f.write_str(&self.target),
            Direction::Desc => write!(f, "{} desc", self.target),
        }
    }
}

/// Successful `$orderby` parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderByResult {
    clauses: Vec<OrderClause>,
    text: String,
}

impl OrderByResult {
    fn new(clauses: Vec<OrderClause>) -> Self {
        let text = clauses
            .iter()
            .map(OrderClause::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self { clauses, text }
    }

    pub fn clauses(&self) -> &[OrderClause] {
        &self.clauses
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_text(&self) -> String {
        self.text.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for OrderByResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parses `$orderby` text against a registry.
#[derive(Debug, Clone, Copy)]
pub struct OrderByParser<'r> {
    registry: &'r OrderByRegistry,
}

impl<'r> OrderByParser<'r> {
    pub fn new(registry: &'r OrderByRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r OrderByRegistry {
        self.registry
    }

    /// Parse `text`, falling back to the registry default for `None`,
    /// empty or whitespace-only input.
    pub fn parse(&self, text: Option<&str>) -> ParseResult<OrderByResult> {
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.registry.default_text());

        let outcome = match text {
            Some(text) => self.parse_text(text),
            None => Ok(OrderByResult::default()),
        };

        match &outcome {
            Ok(result) => tracing::debug!(
                property = %QueryProperty::OrderBy,
                expression = %result.text(),
                clauses = result.clauses().len(),
                "Parsed query option"
            ),
            Err(error) => tracing::debug!(
                property = %QueryProperty::OrderBy,
                kind = ?error.kind,
                position = ?error.position,
                error = %error,
                "Rejected query option"
            ),
        }
        outcome
    }

    fn parse_text(&self, text: &str) -> ParseResult<OrderByResult> {
        let limits = self.registry.limits();
        if let Some(offset) = limits.length_overflow(text) {
            return Err(ParseError::order_by(
                ErrorKind::Limit,
                format!(
                    "The statement exceeds the maximum length of {} characters.",
                    limits.max_length
                ),
                Some(offset),
            ));
        }

        let tokens =
            tokenize(text).map_err(|error| error.with_property(QueryProperty::OrderBy))?;
        let mut tokens = tokens.iter();
        let mut clauses: Vec<OrderClause> = Vec::new();

        loop {
            let field_token = match tokens.next() {
                Some(token) if token.kind == TokenKind::Identifier => token,
                other => return Err(syntax(other)),
            };
            let field = self.lookup(field_token)?;

            if clauses.iter().any(|c| c.field == field.name()) {
                return Err(ParseError::order_by(
                    ErrorKind::Duplicate,
                    format!("Field '{}' must not be specified more than once.", field.name()),
                    Some(field_token.position),
                ));
            }

            let mut next = tokens.next();
            let direction = match next {
                Some(token) if is_direction_word(token) => {
                    next = tokens.next();
                    explicit_direction(field, token)?
                }
                _ => match field.mode() {
                    DirectionMode::Fixed(direction) => direction,
                    DirectionMode::Bidirectional => Direction::Asc,
                },
            };

            clauses.push(OrderClause {
                field: field.name().to_string(),
                target: field.target().to_string(),
                direction,
            });

            match next {
                None => break,
                Some(token) if token.kind == TokenKind::Comma => continue,
                Some(token) => return Err(syntax(Some(token))),
            }
        }

        Ok(OrderByResult::new(clauses))
    }

    fn lookup(&self, token: &Token) -> ParseResult<&'r OrderField> {
        let registry = self.registry;
        registry.field(&token.text).ok_or_else(|| {
            ParseError::order_by(
                ErrorKind::UnknownField,
                format!("Field '{}' is not supported.", token.text),
                Some(token.position),
            )
        })
    }
}

/// Renders the registry's help listing.
impl fmt::Display for OrderByParser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.registry, f)
    }
}

fn syntax(token: Option<&Token>) -> ParseError {
    ParseError::order_by(ErrorKind::Syntax, SYNTAX_ERROR, token.map(|t| t.position))
}

/// Bare words after a field are direction candidates; anything else
/// (literals, parentheses) is a syntax error.
fn is_direction_word(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::Number | TokenKind::Bool(_)
    )
}

fn explicit_direction(field: &OrderField, token: &Token) -> ParseResult<Direction> {
    if let DirectionMode::Fixed(_) = field.mode() {
        return Err(ParseError::order_by(
            ErrorKind::Direction,
            format!(
                "Field '{}' direction '{}' is invalid; not supported.",
                field.name(),
                token.text
            ),
            Some(token.position),
        ));
    }

    Direction::from_word(&token.text).ok_or_else(|| {
        ParseError::order_by(
            ErrorKind::Direction,
            format!(
                "Field '{}' direction '{}' must be either 'asc' (ascending) or 'desc' (descending).",
                field.name(),
                token.text
            ),
            Some(token.position),
        )
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::config::ParserLimits;

    fn registry() -> OrderByRegistry {
        OrderByRegistry::builder()
            .add_field("LastName", |f| f.alias("surname"))
            .unwrap()
            .add_field("Age", |f| f)
            .unwrap()
            .add_field("Created", |f| f.target("CreatedAt").fixed(Direction::Desc))
            .unwrap()
            .build()
            .unwrap()
    }

    fn parse(text: &str) -> ParseResult<OrderByResult> {
        let registry = registry();
        OrderByParser::new(&registry).parse(Some(text))
    }

    #[rstest]
    #[case::single("lastname", "LastName")]
    #[case::explicit_asc("lastname asc", "LastName")]
    #[case::descending("age DESC", "Age desc")]
    #[case::multiple("surname desc, age", "LastName desc, Age")]
    #[case::fixed_default("created", "CreatedAt desc")]
    #[case::no_space_after_comma("age,lastname desc", "Age, LastName desc")]
    fn test_renders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse(input).unwrap().text(), expected);
    }

    #[rstest]
    #[case::unknown("firstname", ErrorKind::UnknownField, "Field 'firstname' is not supported.")]
    #[case::fixed_direction(
        "created asc",
        ErrorKind::Direction,
        "Field 'Created' direction 'asc' is invalid; not supported."
    )]
    #[case::fixed_same_direction(
        "created desc",
        ErrorKind::Direction,
        "Field 'Created' direction 'desc' is invalid; not supported."
    )]
    #[case::bad_direction(
        "age up",
        ErrorKind::Direction,
        "Field 'Age' direction 'up' must be either 'asc' (ascending) or 'desc' (descending)."
    )]
    #[case::duplicate("age, lastname, AGE desc", ErrorKind::Duplicate, "Field 'Age' must not be specified more than once.")]
    #[case::duplicate_alias("lastname, surname", ErrorKind::Duplicate, "Field 'LastName' must not be specified more than once.")]
    #[case::trailing_comma("age,", ErrorKind::Syntax, "Statement is syntactically incorrect.")]
    #[case::leading_comma(", age", ErrorKind::Syntax, "Statement is syntactically incorrect.")]
    #[case::missing_separator("age desc lastname", ErrorKind::Syntax, "Statement is syntactically incorrect.")]
    #[case::literal("'age'", ErrorKind::Syntax, "Statement is syntactically incorrect.")]
    #[case::literal_direction("age 'desc'", ErrorKind::Syntax, "Statement is syntactically incorrect.")]
    #[case::lexical("age desc; drop", ErrorKind::Lexical, "The character ';' at position 8 is not valid.")]
    fn test_rejects(#[case] input: &str, #[case] kind: ErrorKind, #[case] expected: &str) {
        let error = parse(input).unwrap_err();
        assert_eq!(error.kind, kind);
        assert_eq!(error.message, expected);
        assert_eq!(error.property, QueryProperty::OrderBy);
    }

    #[test]
    fn test_clauses() {
        let result = parse("created, surname").unwrap();
        assert_eq!(
            result.clauses(),
            &[
                OrderClause {
                    field: "Created".to_string(),
                    target: "CreatedAt".to_string(),
                    direction: Direction::Desc,
                },
                OrderClause {
                    field: "LastName".to_string(),
                    target: "LastName".to_string(),
                    direction: Direction::Asc,
                },
            ]
        );
    }

    #[test]
    fn test_empty_input_without_default() {
        let registry = registry();
        let parser = OrderByParser::new(&registry);
        assert!(parser.parse(None).unwrap().is_empty());
        assert_eq!(parser.parse(Some("  ")).unwrap().text(), "");
    }

    #[test]
    fn test_empty_input_uses_default() {
        let registry = OrderByRegistry::builder()
            .add_field("LastName", |f| f)
            .unwrap()
            .add_field("Age", |f| f)
            .unwrap()
            .with_default("lastname, age desc")
            .build()
            .unwrap();
        let parser = OrderByParser::new(&registry);

        assert_eq!(parser.parse(None).unwrap().text(), "LastName, Age desc");
        assert_eq!(parser.parse(Some("age")).unwrap().text(), "Age");
    }

    #[test]
    fn test_max_length() {
        let registry = OrderByRegistry::builder()
            .add_field("Age", |f| f)
            .unwrap()
            .with_limits(ParserLimits {
                max_length: 5,
                ..Default::default()
            })
            .build()
            .unwrap();
        let error = OrderByParser::new(&registry).parse(Some("age desc")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Limit);
        assert_eq!(error.position, Some(5));
    }

    #[test]
    fn test_display_is_help_listing() {
        let registry = registry();
        assert_eq!(
            OrderByParser::new(&registry).to_string(),
            "LastName [surname]: asc, desc\nAge: asc, desc\nCreated: desc only"
        );
    }
}
