//! Validated `$filter` syntax tree.

use std::fmt;

use crate::{expression::Value, registry::Operator};

/// Boolean connective between terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn symbol(&self) -> &'static str {
        match self {
            Connective::And => "&&",
            Connective::Or => "||",
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => f.write_str("and"),
            Connective::Or => f.write_str("or"),
        }
    }
}

/// How the comparison was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonForm {
    /// `field op constant` or `field in (...)`
    Infix,
    /// `startswith(field, constant)`
    Function,
    /// Bare boolean field, equivalent to `field eq true`
    Bare,
}

/// A single validated comparison against a registered field.
///
/// Values are already converted to the field's type and case-folded.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Canonical field name
    pub field: String,
    /// Emitted identifier
    pub target: String,
    pub operator: Operator,
    pub form: ComparisonForm,
    pub values: Vec<Value>,
    /// Byte offset of the field token
    pub position: usize,
}

impl Comparison {
    /// First (for non-`in` operators, only) constant.
    pub fn value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.values.as_slice(), [Value::Null])
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match self.form {
            ComparisonForm::Bare => write!(f, "{}", self.field),
            ComparisonForm::Function => write!(f, "{}({}, {})", self.operator, self.field, values),
            ComparisonForm::Infix if self.operator == Operator::In => {
                write!(f, "{} in ({})", self.field, values)
            }
            ComparisonForm::Infix => write!(f, "{} {} {}", self.field, self.operator, values),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Comparison(Comparison),
    Group(Expr),
    Not(Expr),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Comparison(c) => write!(f, "{}", c),
            Term::Group(e) => write!(f, "({})", e),
            Term::Not(e) => write!(f, "not ({})", e),
        }
    }
}

/// A flat, left-to-right chain of terms. No precedence is applied between
/// `and` and `or`; connectives are kept in textual order.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub first: Box<Term>,
    pub rest: Vec<(Connective, Term)>,
}

impl Expr {
    pub fn has_top_level_or(&self) -> bool {
        self.rest.iter().any(|(c, _)| *c == Connective::Or)
    }

    /// Every comparison in textual order, including nested ones.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        collect(&self.first, &mut out);
        for (_, term) in &self.rest {
            collect(term, &mut out);
        }
        out
    }
}

fn collect<'a>(term: &'a Term, out: &mut Vec<&'a Comparison>) {
    match term {
        Term::Comparison(c) => out.push(c),
        Term::Group(e) | Term::Not(e) => out.extend(e.comparisons()),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (connective, term) in &self.rest {
            write!(f, " {} {}", connective, term)?;
        }
        Ok(())
    }
}
