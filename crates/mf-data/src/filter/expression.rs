//! Legacy array filter expressions
//!
//! Older saved filters use the nested array form
//! `["all", ["in", field, v1, v2], [">=", field, min], ["<=", field, max]]`.
//! Every sub-expression becomes one clause; shapes that cannot be read
//! become clauses of unknown type so the whole filter fails closed.

use serde_json::Value;

use mf_core::FieldValue;

use super::{ClauseKind, FilterClause, FilterSpec};

pub(super) fn parse(expression: &Value) -> FilterSpec {
    let clauses = match expression {
        Value::Null => Vec::new(),
        Value::Array(items) if items.first().and_then(Value::as_str) == Some("all") => {
            items[1..].iter().map(parse_clause).collect()
        }
        other => vec![parse_clause(other)],
    };
    FilterSpec::new(clauses)
}

fn parse_clause(expression: &Value) -> FilterClause {
    let Some(items) = expression.as_array() else {
        return unreadable("", expression.to_string());
    };
    let (Some(op), Some(field)) = (
        items.first().and_then(Value::as_str),
        items.get(1).and_then(Value::as_str),
    ) else {
        return unreadable("", expression.to_string());
    };

    let bounds: Vec<FieldValue> = items[2..].iter().cloned().map(FieldValue::from).collect();
    let kind = match op {
        "in" | "==" => ClauseKind::Discrete,
        ">=" | "<=" => ClauseKind::Continuous,
        _ => return unreadable(field, op.to_string()),
    };

    FilterClause {
        field: field.to_string(),
        kind,
        operator: Some(op.to_string()),
        bounds,
    }
}

pub(super) fn unreadable(field: &str, operator: String) -> FilterClause {
    FilterClause {
        field: field.to_string(),
        kind: ClauseKind::Unknown,
        operator: Some(operator),
        bounds: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::apply_filter;
    use mf_core::Feature;
    use serde_json::json;

    fn features() -> Vec<Feature> {
        vec![
            Feature::new("1").with_property("happening", "flood").with_property("today", 5.0),
            Feature::new("2").with_property("happening", "fire").with_property("today", 7.0),
            Feature::new("3").with_property("happening", "flood").with_property("today", 10.0),
        ]
    }

    #[test]
    fn test_all_expression() {
        let spec = FilterSpec::from_expression(&json!([
            "all",
            ["in", "happening", "flood", "fire"],
            [">=", "today", 6],
            ["<=", "today", 10]
        ]));

        assert_eq!(spec.len(), 3);
        let ids: Vec<_> = apply_filter(&features(), &spec).into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_null_expression_matches_everything() {
        let spec = FilterSpec::from_expression(&Value::Null);
        assert!(spec.is_empty());
        assert_eq!(apply_filter(&features(), &spec).len(), 3);
    }

    #[test]
    fn test_unreadable_expressions_fail_closed() {
        for expression in [
            json!(["all", ["has", "happening"]]),
            json!([">", "today", 1]),
            json!(["all", "happening"]),
            json!(42),
        ] {
            let spec = FilterSpec::from_expression(&expression);
            assert!(apply_filter(&features(), &spec).is_empty(), "{expression}");
        }
    }
}
