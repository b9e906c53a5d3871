//! Recursive-descent `$filter` parser.
//!
//! ## Grammar
//!
//! ```text
//! expr        = term { ( "and" | "or" ) term }
//! term        = "(" expr ")"
//!             | "not" "(" expr ")"
//!             | function
//!             | field [ comparison ]          ; bare boolean when omitted
//! comparison  = operator constant
//!             | "in" "(" constant { "," constant } ")"
//! function    = ( "startswith" | "endswith" | "contains" ) "(" field "," constant ")"
//! ```
//!
//! The parser walks a pre-lexed token vector with a cursor and validates
//! every field, operator and constant against the registry as it goes, so
//! the tree it returns is ready to render.

use std::collections::BTreeSet;

use super::ast::{Comparison, ComparisonForm, Connective, Expr, Term};
use crate::{
    error::{ErrorKind, ParseError, ParseResult, QueryProperty},
    expression::Value,
    lexer::{Keyword, Token, TokenKind},
    registry::{FieldDefinition, FilterRegistry, Operator, ValueType},
};

const OPENING_UNMATCHED: &str = "There is an opening '(' that has no matching closing ')'.";
const CLOSING_UNMATCHED: &str = "There is a closing ')' that has no matching opening '('.";

pub(crate) struct Parsed {
    pub expr: Expr,
    pub fields: BTreeSet<String>,
}

/// Parse a non-empty token stream into a validated tree.
pub(crate) fn parse_tokens(tokens: &[Token], registry: &FilterRegistry) -> ParseResult<Parsed> {
    let mut parser = Parser::new(tokens, registry);
    let expr = parser.parse_expr()?;

    // parse_expr only stops early at a ')' it cannot match
    if let Some(token) = parser.peek() {
        return Err(syntax(CLOSING_UNMATCHED, token.position));
    }

    Ok(Parsed {
        expr,
        fields: parser.fields,
    })
}

fn error(kind: ErrorKind, message: impl Into<String>, position: usize) -> ParseError {
    ParseError::filter(kind, message, Some(position))
}

fn syntax(message: impl Into<String>, position: usize) -> ParseError {
    error(ErrorKind::Syntax, message, position)
}

fn connective(token: &Token) -> Option<Connective> {
    match token.kind {
        TokenKind::Keyword(Keyword::And) => Some(Connective::And),
        TokenKind::Keyword(Keyword::Or) => Some(Connective::Or),
        _ => None,
    }
}

fn ends_term(token: &Token) -> bool {
    connective(token).is_some() || token.kind == TokenKind::CloseParen
}

fn is_constant(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::String(_)
            | TokenKind::Number
            | TokenKind::Date
            | TokenKind::Bool(_)
            | TokenKind::Null
            | TokenKind::Identifier
    )
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
    registry: &'a FilterRegistry,
    fields: BTreeSet<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], registry: &'a FilterRegistry) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            registry,
            fields: BTreeSet::new(),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Offset just past the last token, for errors at end of input.
    fn end_position(&self) -> usize {
        self.tokens
            .last()
            .map(|t| t.position + t.text.len())
            .unwrap_or(0)
    }

    fn enter_scope(&mut self, open: &Token) -> ParseResult<()> {
        self.depth += 1;
        let max_depth = self.registry.limits().max_depth;
        if self.depth > max_depth {
            return Err(error(
                ErrorKind::Limit,
                format!(
                    "The statement exceeds the maximum nesting depth of {}.",
                    max_depth
                ),
                open.position,
            ));
        }
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // expr = term { ( "and" | "or" ) term }
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        if let Some(token) = self.peek()
            && let Some(connective) = connective(token)
        {
            let message = if self.position == 0 {
                format!("The statement must not begin with '{}'.", connective)
            } else {
                format!("The '{}' operator is in an invalid position.", connective)
            };
            return Err(syntax(message, token.position));
        }

        let first = self.parse_term()?;
        let mut rest = Vec::new();

        while let Some(token) = self.peek() {
            if token.kind == TokenKind::CloseParen {
                break;
            }

            let Some(connective) = connective(token) else {
                return Err(syntax(
                    format!("Expected 'and' or 'or' but found '{}'.", token),
                    token.position,
                ));
            };
            self.advance();

            match self.peek() {
                None => {
                    return Err(syntax(
                        format!("The statement must not end with '{}'.", connective),
                        token.position,
                    ));
                }
                Some(next) if ends_term(next) => {
                    return Err(syntax(
                        format!("The '{}' operator is in an invalid position.", connective),
                        token.position,
                    ));
                }
                Some(_) => {}
            }

            rest.push((connective, self.parse_term()?));
        }

        Ok(Expr {
            first: Box::new(first),
            rest,
        })
    }

    // term = "(" expr ")" | "not" "(" expr ")" | function | field [ comparison ]
    fn parse_term(&mut self) -> ParseResult<Term> {
        let Some(token) = self.advance() else {
            return Err(syntax("The statement is incomplete.", self.end_position()));
        };

        match &token.kind {
            TokenKind::OpenParen => Ok(Term::Group(self.parse_group(token)?)),
            TokenKind::Keyword(Keyword::Not) => match self.advance() {
                None => Err(syntax(
                    "The statement must not end with 'not'.",
                    token.position,
                )),
                Some(open) if open.kind == TokenKind::OpenParen => {
                    Ok(Term::Not(self.parse_group(open)?))
                }
                Some(other) => Err(syntax(
                    format!(
                        "The 'not' operator must be followed by an opening '(' but found '{}'.",
                        other
                    ),
                    other.position,
                )),
            },
            TokenKind::Keyword(keyword) => match Operator::from_function(*keyword) {
                Some(operator) => Ok(Term::Comparison(self.parse_function(token, operator)?)),
                None => match connective(token) {
                    Some(connective) => Err(syntax(
                        format!("The '{}' operator is in an invalid position.", connective),
                        token.position,
                    )),
                    None => Err(syntax(
                        format!("The token '{}' is not valid at this position.", token),
                        token.position,
                    )),
                },
            },
            TokenKind::Identifier => Ok(Term::Comparison(self.parse_field_term(token)?)),
            TokenKind::CloseParen => Err(syntax(CLOSING_UNMATCHED, token.position)),
            _ => Err(syntax(
                format!("The token '{}' is not valid at this position.", token),
                token.position,
            )),
        }
    }

    /// Parse the body of a group whose '(' has already been consumed.
    fn parse_group(&mut self, open: &Token) -> ParseResult<Expr> {
        self.enter_scope(open)?;

        match self.peek() {
            None => return Err(syntax(OPENING_UNMATCHED, open.position)),
            Some(next) if next.kind == TokenKind::CloseParen => {
                return Err(syntax("There is an empty group '()'.", open.position));
            }
            Some(_) => {}
        }

        let inner = self.parse_expr()?;

        match self.advance() {
            Some(close) if close.kind == TokenKind::CloseParen => {
                self.exit_scope();
                Ok(inner)
            }
            _ => Err(syntax(OPENING_UNMATCHED, open.position)),
        }
    }

    fn lookup(&mut self, token: &Token) -> ParseResult<&'a FieldDefinition> {
        let registry = self.registry;
        let field = registry.field(&token.text).ok_or_else(|| {
            error(
                ErrorKind::UnknownField,
                format!("Field '{}' is not supported.", token.text),
                token.position,
            )
        })?;
        self.fields.insert(field.name.clone());
        Ok(field)
    }

    fn check_operator(
        &self,
        field: &FieldDefinition,
        operator: Operator,
        token: &Token,
    ) -> ParseResult<()> {
        if field.supports(operator) {
            return Ok(());
        }
        Err(error(
            ErrorKind::UnsupportedOperator,
            format!(
                "Field '{}' does not support the '{}' operator.",
                field.name, operator
            ),
            token.position,
        ))
    }

    fn missing_constant(
        &self,
        field: &FieldDefinition,
        operator: Operator,
        token: Option<&Token>,
    ) -> ParseError {
        syntax(
            format!(
                "The statement is incomplete; field '{}' is missing a constant for the '{}' operator.",
                field.name, operator
            ),
            token.map_or_else(|| self.end_position(), |t| t.position),
        )
    }

    // field [ operator constant | "in" "(" list ")" ]
    fn parse_field_term(&mut self, token: &'a Token) -> ParseResult<Comparison> {
        let field = self.lookup(token)?;

        let Some(op_token) = self.peek().filter(|t| !ends_term(t)) else {
            return self.bare_boolean(field, token);
        };
        self.advance();

        let operator = match op_token.kind {
            TokenKind::Keyword(keyword) => Operator::from_infix(keyword),
            _ => None,
        }
        .ok_or_else(|| {
            error(
                ErrorKind::UnsupportedOperator,
                format!(
                    "Field '{}' does not support '{}' as an operator.",
                    field.name, op_token
                ),
                op_token.position,
            )
        })?;
        self.check_operator(field, operator, op_token)?;

        let values = if operator == Operator::In {
            self.parse_in_list(field)?
        } else {
            let constant = self.advance();
            match constant {
                Some(constant) if is_constant(constant) => {
                    vec![self.convert(field, operator, constant)?]
                }
                other => return Err(self.missing_constant(field, operator, other)),
            }
        };

        self.finish(field, operator, ComparisonForm::Infix, values, token)
    }

    fn bare_boolean(&self, field: &FieldDefinition, token: &Token) -> ParseResult<Comparison> {
        if field.value_type != ValueType::Boolean {
            return Err(syntax(
                format!(
                    "The statement is incomplete; field '{}' must be followed by an operator.",
                    field.name
                ),
                token.position,
            ));
        }
        self.check_operator(field, Operator::Eq, token)?;
        self.finish(
            field,
            Operator::Eq,
            ComparisonForm::Bare,
            vec![Value::Boolean(true)],
            token,
        )
    }

    // "(" constant { "," constant } ")"
    fn parse_in_list(&mut self, field: &FieldDefinition) -> ParseResult<Vec<Value>> {
        let prefix = format!("The 'in' operator for field '{}'", field.name);

        match self.advance() {
            Some(open) if open.kind == TokenKind::OpenParen => {}
            other => {
                return Err(syntax(
                    format!("{} must be followed by an opening '('.", prefix),
                    other.map_or_else(|| self.end_position(), |t| t.position),
                ));
            }
        }

        if let Some(close) = self.peek()
            && close.kind == TokenKind::CloseParen
        {
            return Err(syntax(
                format!("{} must contain at least one constant.", prefix),
                close.position,
            ));
        }

        let mut values = Vec::new();
        loop {
            let constant = match self.advance() {
                None => {
                    return Err(syntax(
                        format!("{} is missing a closing ')'.", prefix),
                        self.end_position(),
                    ));
                }
                Some(token) if token.kind == TokenKind::Null => {
                    return Err(error(
                        ErrorKind::NullHandling,
                        format!("{} must not contain a null constant.", prefix),
                        token.position,
                    ));
                }
                Some(token) if is_constant(token) => token,
                Some(token) => return Err(self.missing_constant(field, Operator::In, Some(token))),
            };
            values.push(self.convert(field, Operator::In, constant)?);

            match self.advance() {
                Some(token) if token.kind == TokenKind::Comma => continue,
                Some(token) if token.kind == TokenKind::CloseParen => break,
                None => {
                    return Err(syntax(
                        format!("{} is missing a closing ')'.", prefix),
                        self.end_position(),
                    ));
                }
                Some(token) => {
                    return Err(syntax(
                        format!("{} requires constants to be separated by ','.", prefix),
                        token.position,
                    ));
                }
            }
        }

        Ok(values)
    }

    // ( "startswith" | "endswith" | "contains" ) "(" field "," constant ")"
    fn parse_function(&mut self, keyword: &Token, operator: Operator) -> ParseResult<Comparison> {
        let missing_close = |position: usize| {
            syntax(
                format!("The '{}' function is missing a closing ')'.", operator),
                position,
            )
        };

        match self.advance() {
            Some(open) if open.kind == TokenKind::OpenParen => {}
            other => {
                return Err(syntax(
                    format!("The '{}' function must be followed by an opening '('.", operator),
                    other.map_or(keyword.position, |t| t.position),
                ));
            }
        }

        let field_token = match self.advance() {
            Some(token) if token.kind == TokenKind::Identifier => token,
            Some(token) => {
                return Err(syntax(
                    format!("The token '{}' is not valid at this position.", token),
                    token.position,
                ));
            }
            None => return Err(missing_close(self.end_position())),
        };
        let field = self.lookup(field_token)?;
        self.check_operator(field, operator, keyword)?;

        match self.advance() {
            Some(comma) if comma.kind == TokenKind::Comma => {}
            None => return Err(missing_close(self.end_position())),
            Some(token) => {
                return Err(syntax(
                    format!(
                        "The '{}' function requires the field and constant to be separated by ','.",
                        operator
                    ),
                    token.position,
                ));
            }
        }

        let value = match self.advance() {
            Some(constant) if is_constant(constant) => self.convert(field, operator, constant)?,
            other => return Err(self.missing_constant(field, operator, other)),
        };

        match self.advance() {
            Some(close) if close.kind == TokenKind::CloseParen => {}
            Some(token) => return Err(missing_close(token.position)),
            None => return Err(missing_close(self.end_position())),
        }

        self.finish(
            field,
            operator,
            ComparisonForm::Function,
            vec![value],
            field_token,
        )
    }

    /// Convert a constant token to the field's type, applying case folding.
    fn convert(
        &self,
        field: &FieldDefinition,
        operator: Operator,
        token: &Token,
    ) -> ParseResult<Value> {
        let type_error = |message: String| error(ErrorKind::TypeMismatch, message, token.position);

        match &token.kind {
            TokenKind::Null => {
                if !operator.allows_null() {
                    return Err(error(
                        ErrorKind::NullHandling,
                        format!(
                            "Field '{}' constant must not be null for an '{}' operator.",
                            field.name, operator
                        ),
                        token.position,
                    ));
                }
                if !field.nullable {
                    return Err(error(
                        ErrorKind::NullHandling,
                        format!(
                            "Field '{}' does not support null as it is not nullable.",
                            field.name
                        ),
                        token.position,
                    ));
                }
                Ok(Value::Null)
            }
            _ if field.value_type == ValueType::Null => Err(type_error(format!(
                "Field '{}' only supports comparison with null.",
                field.name
            ))),
            TokenKind::String(s) if field.value_type == ValueType::String => {
                Ok(field.fold(Value::String(s.clone())))
            }
            TokenKind::String(_) => Err(type_error(format!(
                "Field '{}' must not be specified as a Literal where the underlying type is not a string.",
                field.name
            ))),
            _ if field.value_type == ValueType::String => Err(type_error(format!(
                "Field '{}' must be specified as a Literal where the underlying type is a string.",
                field.name
            ))),
            _ => field.value_type.parse_bare(token).ok_or_else(|| {
                type_error(format!(
                    "Field '{}' has a value '{}' that is not a valid {}.",
                    field.name, token.text, field.value_type
                ))
            }),
        }
    }

    fn finish(
        &self,
        field: &FieldDefinition,
        operator: Operator,
        form: ComparisonForm,
        values: Vec<Value>,
        token: &Token,
    ) -> ParseResult<Comparison> {
        let comparison = Comparison {
            field: field.name.clone(),
            target: field.target.clone(),
            operator,
            form,
            values,
            position: token.position,
        };

        if let Some(check) = &field.extended_match {
            check(&comparison).map_err(|message| ParseError::semantic(QueryProperty::Filter, message))?;
        }

        Ok(comparison)
    }
}
