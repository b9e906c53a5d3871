//! Tokenizer shared by the `$filter` and `$orderby` parsers.
//!
//! ## Lexical rules
//!
//! ```text
//! string   = "'" { CHAR | "''" } "'"
//! word     = 1*( ALNUM | "_" | "-" | "." | ":" | "+" )
//! number   = [ "+" | "-" ] DIGITS [ "." DIGITS ]
//! date     = YYYY "-" MM "-" DD [ "T" HH ":" MM [ ":" SS [ "." FFF ] ] ]
//! punct    = "(" | ")" | ","
//! ```
//!
//! Words are classified after they are read: keywords first (matched
//! case-insensitively), then numbers and dates, and everything else is an
//! identifier. Bare words that are not valid numbers are converted to the
//! target field's type later by the parser, which is where a bad value
//! like `12abc` is reported.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::error::{ErrorKind, ParseError, ParseResult};

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").unwrap());

static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?$").unwrap()
});

/// Reserved words of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
    Not,
    StartsWith,
    EndsWith,
    Contains,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        const KEYWORDS: [(&str, Keyword); 13] = [
            ("eq", Keyword::Eq),
            ("ne", Keyword::Ne),
            ("lt", Keyword::Lt),
            ("le", Keyword::Le),
            ("gt", Keyword::Gt),
            ("ge", Keyword::Ge),
            ("in", Keyword::In),
            ("and", Keyword::And),
            ("or", Keyword::Or),
            ("not", Keyword::Not),
            ("startswith", Keyword::StartsWith),
            ("endswith", Keyword::EndsWith),
            ("contains", Keyword::Contains),
        ];

        KEYWORDS
            .iter()
            .find(|(text, _)| word.eq_ignore_ascii_case(text))
            .map(|(_, kw)| *kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Eq => "eq",
            Keyword::Ne => "ne",
            Keyword::Lt => "lt",
            Keyword::Le => "le",
            Keyword::Gt => "gt",
            Keyword::Ge => "ge",
            Keyword::In => "in",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::StartsWith => "startswith",
            Keyword::EndsWith => "endswith",
            Keyword::Contains => "contains",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// Bare word that is neither a keyword nor a number/date literal
    Identifier,
    Keyword(Keyword),
    /// Quoted literal, with `''` escapes already decoded
    String(String),
    Number,
    Date,
    Bool(bool),
    Null,
    OpenParen,
    CloseParen,
    Comma,
}

/// A lexeme with its original text and byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Original text span, quotes included for string literals
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Bare word text compared case-insensitively (e.g. `asc`/`desc`).
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Lazily yields tokens left to right. Stops after the first error.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            failed: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn punct(&mut self, kind: TokenKind) -> Token {
        let start = self.position;
        self.advance();
        Token::new(kind, &self.input[start..self.position], start)
    }

    fn read_string(&mut self) -> ParseResult<Token> {
        let start = self.position;
        self.advance();

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::filter(
                        ErrorKind::Lexical,
                        format!(
                            "The literal starting at position {} is not terminated by a closing quote.",
                            start
                        ),
                        Some(start),
                    ));
                }
                Some('\'') => {
                    self.advance();
                    if self.peek() == Some('\'') {
                        value.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(Token::new(
            TokenKind::String(value),
            &self.input[start..self.position],
            start,
        ))
    }

    fn read_word(&mut self) -> Token {
        let start = self.position;
        while self.peek().is_some_and(is_word_char) {
            self.advance();
        }

        let word = &self.input[start..self.position];
        Token::new(classify_word(word), word, start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = ParseResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        self.skip_whitespace();
        let c = self.peek()?;

        let result = match c {
            '(' => Ok(self.punct(TokenKind::OpenParen)),
            ')' => Ok(self.punct(TokenKind::CloseParen)),
            ',' => Ok(self.punct(TokenKind::Comma)),
            '\'' => self.read_string(),
            c if is_word_char(c) => Ok(self.read_word()),
            other => Err(ParseError::filter(
                ErrorKind::Lexical,
                format!(
                    "The character '{}' at position {} is not valid.",
                    other, self.position
                ),
                Some(self.position),
            )),
        };

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '+')
}

fn classify_word(word: &str) -> TokenKind {
    if word.eq_ignore_ascii_case("null") {
        return TokenKind::Null;
    }
    if word.eq_ignore_ascii_case("true") {
        return TokenKind::Bool(true);
    }
    if word.eq_ignore_ascii_case("false") {
        return TokenKind::Bool(false);
    }
    if let Some(keyword) = Keyword::from_word(word) {
        return TokenKind::Keyword(keyword);
    }
    if NUMBER_REGEX.is_match(word) {
        return TokenKind::Number;
    }
    if DATE_REGEX.is_match(word) {
        return TokenKind::Date;
    }
    TokenKind::Identifier
}

/// Tokenize the whole input; empty or whitespace-only input yields no tokens.
pub fn tokenize(input: &str) -> ParseResult<Vec<Token>> {
    let tokens = Lexer::new(input).collect::<ParseResult<Vec<_>>>()?;
    tracing::trace!(count = tokens.len(), "Tokenized query text");
    Ok(tokens)
}

// =============================================================================
// Tests
// =============================================================================
