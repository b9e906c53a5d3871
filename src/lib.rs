//! Schema-driven parsing of OData-style `$filter` and `$orderby` text.
//!
//! Callers describe which fields are queryable in a [`FilterRegistry`] and
//! an [`OrderByRegistry`] (in code or from a TOML [`SchemaConfig`]). The
//! parsers validate untrusted query text against them and produce a
//! C#-like boolean expression with positional placeholders (`@0`, `@1`,
//! ...) plus an ordered argument list, or a single [`ParseError`] whose
//! message is safe to return to the caller.
//!
//! ```
//! use queryfront::{QueryConfig, registry::{FilterRegistry, OrderByRegistry, ValueType}};
//!
//! let filter = FilterRegistry::builder()
//!     .add_field("LastName", ValueType::String, |f| f.check_not_null())?
//!     .add_field("Age", ValueType::Integer, |f| f)?
//!     .build()?;
//! let order_by = OrderByRegistry::builder()
//!     .add_field("LastName", |f| f)?
//!     .build()?;
//! let config = QueryConfig::new(filter, order_by);
//!
//! let result = config.parse(Some("lastname eq 'Smith' and age gt 30"), Some("lastname desc"))?;
//! assert_eq!(result.filter.text(), "(LastName != null && LastName == @0) && Age > @1");
//! assert_eq!(result.order_by.text(), "LastName desc");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`FilterRegistry`]: registry::FilterRegistry
//! [`OrderByRegistry`]: registry::OrderByRegistry

pub mod config;
pub mod error;
pub mod expression;
pub mod filter;
pub mod lexer;
#[cfg(feature = "cli")]
pub mod observability;
pub mod order_by;
pub mod query;
pub mod registry;

pub use config::{ParserLimits, SchemaConfig};
pub use error::{ConfigError, ErrorKind, ParseError, ParseResult, QueryProperty};
pub use expression::{ExpressionBuilder, ParserResult, Statement, Value};
pub use filter::FilterParser;
pub use order_by::{OrderByParser, OrderByResult, OrderClause};
pub use query::{QueryConfig, QueryOutcome, QueryResult};
