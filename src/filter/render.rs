//! Render a validated tree into expression text plus positional args.

use super::ast::{Comparison, ComparisonForm, Expr, Term};
use crate::{
    error::{ErrorKind, ParseError, ParseResult, QueryProperty},
    expression::{ExpressionBuilder, Value},
    registry::{FieldDefinition, FilterRegistry, Operator},
};

pub(crate) fn render(
    expr: &Expr,
    registry: &FilterRegistry,
    builder: &mut ExpressionBuilder,
) -> ParseResult<()> {
    render_term(&expr.first, registry, builder)?;
    for (connective, term) in &expr.rest {
        builder.push_str(&format!(" {} ", connective.symbol()));
        render_term(term, registry, builder)?;
    }
    Ok(())
}

fn render_term(
    term: &Term,
    registry: &FilterRegistry,
    builder: &mut ExpressionBuilder,
) -> ParseResult<()> {
    match term {
        Term::Group(inner) => {
            builder.push_str("(");
            render(inner, registry, builder)?;
            builder.push_str(")");
        }
        Term::Not(inner) => {
            builder.push_str("!(");
            render(inner, registry, builder)?;
            builder.push_str(")");
        }
        Term::Comparison(comparison) => {
            let field = registry.field(&comparison.field).ok_or_else(|| {
                ParseError::filter(
                    ErrorKind::UnknownField,
                    format!("Field '{}' is not supported.", comparison.field),
                    Some(comparison.position),
                )
            })?;

            if let Some(writer) = &field.result_writer {
                let handled = writer(comparison, builder)
                    .map_err(|message| ParseError::semantic(QueryProperty::Filter, message))?;
                if handled {
                    return Ok(());
                }
            }

            render_comparison(field, comparison, builder);
        }
    }
    Ok(())
}

/// Default rendering for one comparison.
///
/// Exposed so custom result writers can wrap or delegate to it.
pub fn render_comparison(
    field: &FieldDefinition,
    comparison: &Comparison,
    builder: &mut ExpressionBuilder,
) {
    let target = field.target();

    let body = match (comparison.form, comparison.operator) {
        (ComparisonForm::Bare, _) => target.to_string(),
        (_, Operator::In) => {
            let placeholders = comparison
                .values
                .iter()
                .map(|value| builder.add_arg(value.clone()))
                .collect::<Vec<_>>();
            format!("{} in ({})", field.accessor(), placeholders.join(", "))
        }
        (_, operator) => match (comparison.value(), operator.method(), operator.symbol()) {
            (Some(Value::Null), _, Some(symbol)) => format!("{} {} null", target, symbol),
            (Some(value), Some(method), _) => {
                let placeholder = builder.add_arg(value.clone());
                format!("{}.{}({})", field.accessor(), method, placeholder)
            }
            (Some(value), None, Some(symbol)) => {
                let placeholder = builder.add_arg(value.clone());
                format!("{} {} {}", field.accessor(), symbol, placeholder)
            }
            _ => target.to_string(),
        },
    };

    let guarded = field.checks_not_null()
        && comparison.form != ComparisonForm::Bare
        && !comparison.is_null()
        && matches!(
            comparison.operator,
            Operator::Eq
                | Operator::Ne
                | Operator::StartsWith
                | Operator::Contains
                | Operator::EndsWith
        );

    if guarded {
        builder.push_str(&format!("({} != null && {})", target, body));
    } else {
        builder.push_str(&body);
    }
}
