//! Field registries for `$filter` and `$orderby`.
//!
//! A registry is the schema a parser validates against: which fields exist,
//! their types and operators, what they render to, and what to emit when
//! the caller supplies no input. Registries are built once through the
//! fluent builders here and are immutable afterwards.
//!
//! ```
//! use queryfront::registry::{FilterRegistry, ValueType};
//!
//! let registry = FilterRegistry::builder()
//!     .add_field("LastName", ValueType::String, |f| f.check_not_null())?
//!     .add_field("FirstName", ValueType::String, |f| f.uppercase())?
//!     .add_field("Age", ValueType::Integer, |f| f)?
//!     .build()?;
//! # Ok::<(), queryfront::ConfigError>(())
//! ```

mod field;
mod filter;
mod order_by;

pub use field::{
    CaseFold, ExtendedMatch, FieldBuilder, FieldDefinition, Operator, ResultWriter, ValueType,
};
pub use filter::{FilterRegistry, FilterRegistryBuilder, OnQuery};
pub use order_by::{
    Direction, DirectionMode, OrderByRegistry, OrderByRegistryBuilder, OrderField,
    OrderFieldBuilder,
};
