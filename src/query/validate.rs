#![forbid(unsafe_code)]

//! Structural validation of filters and requests.
//!
//! Validation walks the tree depth-first and stops at the first offending
//! node. It only checks shape; whether a property exists or a literal fits its
//! type is decided later by the resolver and the coercer.

use crate::config::SearchOptions;

use super::ast::Expression;
use super::errors::ValidationError;
use super::request::SearchRequest;

/// Convenience alias for validation results.
pub type ValidateResult<T> = std::result::Result<T, ValidationError>;

/// Checks the per-node rules without any size limits.
pub fn validate(expr: &Expression) -> ValidateResult<()> {
    check_node(expr, None)
}

/// Checks size limits from `options`, then the per-node rules.
pub fn validate_with(expr: &Expression, options: &SearchOptions) -> ValidateResult<()> {
    let stats = filter_stats(expr);
    if stats.nodes > options.max_nodes {
        return Err(ValidationError::TooManyNodes {
            count: stats.nodes,
            max: options.max_nodes,
        });
    }
    if stats.depth > options.max_depth {
        return Err(ValidationError::TooDeep {
            depth: stats.depth,
            max: options.max_depth,
        });
    }
    check_node(expr, Some(options.max_in_values))
}

/// Checks the paging and sort envelope, then the filter if present.
pub fn validate_request(request: &SearchRequest, options: &SearchOptions) -> ValidateResult<()> {
    if request.start_index < 0 {
        return Err(ValidationError::NegativeStartIndex {
            start_index: request.start_index,
        });
    }
    if request.count < 1 {
        return Err(ValidationError::CountRequired {
            count: request.count,
        });
    }
    if request.count > i64::from(options.max_page_size) {
        return Err(ValidationError::PageTooLarge {
            count: request.count,
            max: options.max_page_size,
        });
    }
    if let Some(index) = request.sorts.iter().position(|sort| is_blank(&sort.property)) {
        return Err(ValidationError::SortPropertyRequired { index });
    }
    match &request.filter {
        Some(filter) => validate_with(filter, options),
        None => Ok(()),
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn check_node(expr: &Expression, max_in_values: Option<usize>) -> ValidateResult<()> {
    if let Some(property) = expr.property() {
        if is_blank(property) {
            return Err(ValidationError::PropertyRequired {
                node: expr.to_string(),
            });
        }
    }
    match expr {
        Expression::LogicalMulti(node) => {
            if node.operands.len() < 2 {
                return Err(ValidationError::TooFewOperands {
                    found: node.operands.len(),
                    node: expr.to_string(),
                });
            }
            node.operands
                .iter()
                .try_for_each(|operand| check_node(operand, max_in_values))
        }
        Expression::LogicalSingle(node) => check_node(&node.operand, max_in_values),
        Expression::ComparisonSingle(node) => {
            if is_blank(&node.value) {
                return Err(ValidationError::ValueRequired {
                    node: expr.to_string(),
                });
            }
            Ok(())
        }
        Expression::ComparisonMulti(node) => {
            if node.values.is_empty() {
                return Err(ValidationError::ValuesRequired {
                    node: expr.to_string(),
                });
            }
            if let Some(index) = node.values.iter().position(Option::is_none) {
                return Err(ValidationError::NullValue {
                    index,
                    node: expr.to_string(),
                });
            }
            match max_in_values {
                Some(max) if node.values.len() > max => Err(ValidationError::TooManyValues {
                    count: node.values.len(),
                    max,
                    node: expr.to_string(),
                }),
                _ => Ok(()),
            }
        }
        Expression::ComparisonRange(_) | Expression::ComparisonNone(_) => Ok(()),
    }
}

struct FilterStats {
    nodes: usize,
    depth: usize,
}

fn filter_stats(expr: &Expression) -> FilterStats {
    match expr {
        Expression::LogicalMulti(node) => {
            let mut nodes = 1;
            let mut max_depth = 0;
            for child in &node.operands {
                let stats = filter_stats(child);
                nodes += stats.nodes;
                max_depth = max_depth.max(stats.depth);
            }
            FilterStats {
                nodes,
                depth: max_depth + 1,
            }
        }
        Expression::LogicalSingle(node) => {
            let stats = filter_stats(&node.operand);
            FilterStats {
                nodes: stats.nodes + 1,
                depth: stats.depth + 1,
            }
        }
        _ => FilterStats { nodes: 1, depth: 1 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{MembershipOperator, MultiValueComparison, PresenceOperator};
    use crate::query::request::SortExpression;

    #[test]
    fn accepts_well_formed_tree() {
        let expr = Expression::and(vec![
            Expression::equal("title", "x"),
            Expression::not(Expression::presence(PresenceOperator::Empty, "content")),
            Expression::between("votes", "10", "1"),
        ]);
        assert_eq!(validate(&expr), Ok(()));
    }

    #[test]
    fn single_operand_and_is_rejected() {
        let expr = Expression::and(vec![Expression::equal("title", "x")]);
        let err = validate(&expr).expect_err("one operand");
        assert_eq!(
            err,
            ValidationError::TooFewOperands {
                found: 1,
                node: r#"And[Equal(title, "x")]"#.into(),
            }
        );
    }

    #[test]
    fn blank_property_and_value_are_rejected() {
        let err = validate(&Expression::equal("", "x")).expect_err("empty property");
        assert_eq!(err.code(), "PropertyRequired");
        let err = validate(&Expression::between("  ", "1", "2")).expect_err("blank property");
        assert_eq!(err.code(), "PropertyRequired");
        let err = validate(&Expression::equal("title", "   ")).expect_err("blank value");
        assert_eq!(err.code(), "ValueRequired");
    }

    #[test]
    fn value_lists_must_be_non_empty_and_null_free() {
        let empty = Expression::membership(MembershipOperator::In, "id", Vec::<String>::new());
        assert_eq!(validate(&empty).expect_err("empty").code(), "ValuesRequired");
        let with_null = Expression::ComparisonMulti(MultiValueComparison {
            operator: MembershipOperator::NotIn,
            property: "id".into(),
            values: vec![Some("1".into()), None],
        });
        assert!(matches!(
            validate(&with_null),
            Err(ValidationError::NullValue { index: 1, .. })
        ));
    }

    #[test]
    fn reports_first_invalid_node_depth_first() {
        let expr = Expression::or(vec![
            Expression::and(vec![Expression::equal("a", "1"), Expression::equal("", "2")]),
            Expression::equal("b", ""),
        ]);
        let err = validate(&expr).expect_err("invalid");
        assert_eq!(
            err,
            ValidationError::PropertyRequired {
                node: r#"Equal(, "2")"#.into()
            }
        );
    }

    #[test]
    fn enforces_size_limits() {
        let options = SearchOptions {
            max_depth: 3,
            max_nodes: 4,
            max_in_values: 2,
            ..SearchOptions::default()
        };
        let deep = Expression::not(Expression::not(Expression::not(Expression::equal("a", "1"))));
        assert_eq!(
            validate_with(&deep, &options),
            Err(ValidationError::TooDeep { depth: 4, max: 3 })
        );
        let wide = Expression::or((0..4).map(|i| Expression::equal("a", i.to_string())).collect());
        assert_eq!(
            validate_with(&wide, &options),
            Err(ValidationError::TooManyNodes { count: 5, max: 4 })
        );
        let long = Expression::membership(MembershipOperator::In, "id", ["1", "2", "3"]);
        assert_eq!(validate_with(&long, &options).expect_err("long").code(), "TooManyValues");
    }

    #[test]
    fn request_envelope_rules() {
        let options = SearchOptions::default();
        let request = SearchRequest::page(0, 0);
        assert_eq!(
            validate_request(&request, &options),
            Err(ValidationError::CountRequired { count: 0 })
        );
        let request = SearchRequest::page(0, -3);
        assert_eq!(
            validate_request(&request, &options),
            Err(ValidationError::CountRequired { count: -3 })
        );
        let request = SearchRequest::page(-1, 5);
        assert_eq!(
            validate_request(&request, &options),
            Err(ValidationError::NegativeStartIndex { start_index: -1 })
        );
        let request = SearchRequest::page(0, i64::from(options.max_page_size) + 1);
        assert_eq!(validate_request(&request, &options).expect_err("too big").code(), "PageTooLarge");
        let request = SearchRequest::page(0, 5)
            .sorted_by(SortExpression::asc("title"))
            .sorted_by(SortExpression::desc(" "));
        assert_eq!(
            validate_request(&request, &options),
            Err(ValidationError::SortPropertyRequired { index: 1 })
        );
        let request = SearchRequest::page(3, 5).with_filter(Expression::equal("title", "x"));
        assert_eq!(validate_request(&request, &options), Ok(()));
    }
}
