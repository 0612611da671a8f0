use serde_json::Value;
use std::cmp::Ordering;

use crate::engine::resolver::{get_attr, resolve};
use crate::parser::filter_ast::{AttrPath, CompareOp, FilterNode};

/// Evaluate a filter AST against a SCIM resource.
///
/// Comparisons are typed on the literal; a type mismatch is simply false,
/// never an error. Multi-valued attributes match existentially, including
/// `ne`. String matching is case-insensitive via `str::to_lowercase`.
pub fn evaluate(node: &FilterNode, resource: &Value) -> bool {
    match node {
        FilterNode::Compare { path, op, value } => evaluate_compare(resource, path, *op, value),
        FilterNode::Present { path } => resolve(resource, path).into_iter().any(is_present),
        FilterNode::And(left, right) => evaluate(left, resource) && evaluate(right, resource),
        FilterNode::Or(left, right) => evaluate(left, resource) || evaluate(right, resource),
        FilterNode::Not(inner) => !evaluate(inner, resource),
        FilterNode::Complex {
            path,
            predicate,
            sub_attr,
        } => evaluate_complex(resource, path, predicate, sub_attr.as_deref()),
    }
}

/// Presence per RFC 7644: a value is present when it is not absent, not JSON
/// null, not an empty string and not an empty array.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn evaluate_compare(resource: &Value, path: &AttrPath, op: CompareOp, literal: &Value) -> bool {
    let values = resolve(resource, path);

    // A null literal compares against absence, not element values
    if literal.is_null() {
        let absent = values.is_empty() || values.iter().all(|v| v.is_null());
        return match op {
            CompareOp::Equal => absent,
            CompareOp::NotEqual => !absent,
            _ => false,
        };
    }

    // Terminal multi-valued attributes match existentially over elements
    values.into_iter().any(|value| match value {
        Value::Array(items) => items.iter().any(|item| compare_values(item, op, literal)),
        single => compare_values(single, op, literal),
    })
}

fn compare_values(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match expected {
        Value::String(expected) => {
            let Value::String(actual) = actual else {
                return false;
            };
            let a = actual.to_lowercase();
            let e = expected.to_lowercase();
            match op {
                CompareOp::Equal => a == e,
                CompareOp::NotEqual => a != e,
                CompareOp::Contains => a.contains(&e),
                CompareOp::StartsWith => a.starts_with(&e),
                CompareOp::EndsWith => a.ends_with(&e),
                CompareOp::GreaterThan => a > e,
                CompareOp::GreaterThanOrEqual => a >= e,
                CompareOp::LessThan => a < e,
                CompareOp::LessThanOrEqual => a <= e,
            }
        }
        Value::Number(expected) => {
            let (Some(a), Some(e)) = (actual.as_f64(), expected.as_f64()) else {
                return false;
            };
            let ordering = a.partial_cmp(&e).unwrap_or(Ordering::Equal);
            match op {
                CompareOp::Equal => ordering == Ordering::Equal,
                CompareOp::NotEqual => ordering != Ordering::Equal,
                CompareOp::GreaterThan => ordering == Ordering::Greater,
                CompareOp::GreaterThanOrEqual => ordering != Ordering::Less,
                CompareOp::LessThan => ordering == Ordering::Less,
                CompareOp::LessThanOrEqual => ordering != Ordering::Greater,
                _ => false,
            }
        }
        Value::Bool(expected) => {
            let Value::Bool(actual) = actual else {
                return false;
            };
            match op {
                CompareOp::Equal => actual == expected,
                CompareOp::NotEqual => actual != expected,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Value path: true iff any element of the attribute satisfies the predicate
/// (and carries the sub-attribute, when one is given). A singular complex
/// attribute is treated as a one-element array.
fn evaluate_complex(
    resource: &Value,
    path: &AttrPath,
    predicate: &FilterNode,
    sub_attr: Option<&str>,
) -> bool {
    for value in resolve(resource, path) {
        let matched = match value {
            Value::Array(items) => items.iter().any(|e| element_matches(e, predicate, sub_attr)),
            Value::Object(_) => element_matches(value, predicate, sub_attr),
            _ => false,
        };
        if matched {
            return true;
        }
    }
    false
}

fn element_matches(element: &Value, predicate: &FilterNode, sub_attr: Option<&str>) -> bool {
    if !evaluate(predicate, element) {
        return false;
    }
    match sub_attr {
        Some(sub) => get_attr(element, sub).is_some_and(is_present),
        None => true,
    }
}
