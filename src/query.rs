//! Combined `$filter` + `$orderby` front end.

use serde::Serialize;

use crate::{
    error::{ParseError, ParseResult},
    expression::ParserResult,
    filter::FilterParser,
    order_by::{OrderByParser, OrderByResult},
    registry::{FilterRegistry, OrderByRegistry},
};

/// Both registries for one queryable resource.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    filter: FilterRegistry,
    order_by: OrderByRegistry,
}

/// Both parses succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub filter: ParserResult,
    #[serde(rename = "orderby")]
    pub order_by: OrderByResult,
}

/// Independent outcome of each parse.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub filter: ParseResult<ParserResult>,
    pub order_by: ParseResult<OrderByResult>,
}

impl QueryOutcome {
    pub fn is_ok(&self) -> bool {
        self.filter.is_ok() && self.order_by.is_ok()
    }

    /// Every failure, `$filter` first.
    pub fn errors(&self) -> Vec<&ParseError> {
        [self.filter.as_ref().err(), self.order_by.as_ref().err()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Collapse to the first failure, `$filter` first.
    pub fn into_result(self) -> ParseResult<QueryResult> {
        Ok(QueryResult {
            filter: self.filter?,
            order_by: self.order_by?,
        })
    }
}

impl QueryConfig {
    pub fn new(filter: FilterRegistry, order_by: OrderByRegistry) -> Self {
        Self { filter, order_by }
    }

    pub fn filter_registry(&self) -> &FilterRegistry {
        &self.filter
    }

    pub fn order_by_registry(&self) -> &OrderByRegistry {
        &self.order_by
    }

    pub fn filter_parser(&self) -> FilterParser<'_> {
        FilterParser::new(&self.filter)
    }

    pub fn order_by_parser(&self) -> OrderByParser<'_> {
        OrderByParser::new(&self.order_by)
    }

    /// Parse both options and return the first failure.
    ///
    /// Both parsers always run; the `$filter` error wins when both are
    /// invalid.
    pub fn parse(&self, filter: Option<&str>, order_by: Option<&str>) -> ParseResult<QueryResult> {
        self.evaluate(filter, order_by).into_result()
    }

    /// Parse both options and report each result independently.
    pub fn evaluate(&self, filter: Option<&str>, order_by: Option<&str>) -> QueryOutcome {
        QueryOutcome {
            filter: self.filter_parser().parse(filter),
            order_by: self.order_by_parser().parse(order_by),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        error::{ErrorKind, QueryProperty},
        registry::ValueType,
    };

    fn config() -> QueryConfig {
        let filter = FilterRegistry::builder()
            .add_field("LastName", ValueType::String, |f| f)
            .unwrap()
            .add_field("Age", ValueType::Integer, |f| f)
            .unwrap()
            .build()
            .unwrap();
        let order_by = OrderByRegistry::builder()
            .add_field("LastName", |f| f)
            .unwrap()
            .with_default("LastName")
            .build()
            .unwrap();
        QueryConfig::new(filter, order_by)
    }

    #[test]
    fn test_parse_both() {
        let result = config()
            .parse(Some("age gt 30"), Some("lastname desc"))
            .unwrap();
        assert_eq!(result.filter.text(), "Age > @0");
        assert_eq!(result.order_by.text(), "LastName desc");
    }

    #[test]
    fn test_parse_defaults() {
        let result = config().parse(None, None).unwrap();
        assert!(result.filter.is_empty());
        assert_eq!(result.order_by.text(), "LastName");
    }

    #[test]
    fn test_filter_error_wins() {
        let error = config()
            .parse(Some("age eq"), Some("nope"))
            .unwrap_err();
        assert_eq!(error.property, QueryProperty::Filter);
        assert_eq!(error.kind, ErrorKind::Syntax);
    }

    #[rstest]
    #[case::both_valid(Some("age eq 1"), Some("lastname"))]
    #[case::filter_invalid(Some("age eq"), Some("lastname"))]
    #[case::order_by_invalid(Some("age eq 1"), Some("nope"))]
    #[case::both_invalid(Some("age eq"), Some("nope"))]
    fn test_parse_matches_evaluate(#[case] filter: Option<&str>, #[case] order_by: Option<&str>) {
        let config = config();
        let outcome = config.evaluate(filter, order_by);
        assert_eq!(outcome.order_by.is_ok(), order_by == Some("lastname"));
        assert_eq!(config.parse(filter, order_by), outcome.into_result());
    }

    #[test]
    fn test_order_by_error_when_filter_valid() {
        let error = config().parse(Some("age eq 1"), Some("nope")).unwrap_err();
        assert_eq!(error.property, QueryProperty::OrderBy);
        assert_eq!(error.message, "Field 'nope' is not supported.");
    }

    #[test]
    fn test_evaluate_reports_both() {
        let outcome = config().evaluate(Some("foo eq 1"), Some("age"));
        assert!(!outcome.is_ok());

        let errors = outcome.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].property, QueryProperty::Filter);
        assert_eq!(errors[1].property, QueryProperty::OrderBy);

        let first = outcome.into_result().unwrap_err();
        assert_eq!(first.message, "Field 'foo' is not supported.");
    }

    #[test]
    fn test_evaluate_partial_success() {
        let outcome = config().evaluate(Some("age eq 1"), Some("age"));
        assert!(outcome.filter.is_ok());
        assert!(outcome.order_by.is_err());
    }

    #[test]
    fn test_result_json() {
        let result = config()
            .parse(Some("lastname eq 'Ng'"), Some("lastname"))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["filter"]["text"], "LastName == @0");
        assert_eq!(json["filter"]["args"][0], "Ng");
        assert_eq!(json["filter"]["fields"][0], "LastName");
        assert_eq!(json["orderby"]["text"], "LastName");
        assert_eq!(json["orderby"]["clauses"][0]["direction"], "asc");
    }
}
