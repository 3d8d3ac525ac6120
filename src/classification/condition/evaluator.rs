// SPDX-License-Identifier: MIT

//! Local condition evaluator
//!
//! Combinator semantics:
//! - `AND` / `IF`: every child holds, vacuously true when empty
//! - `OR`: some child holds, false when empty
//! - `NOT`: no child holds, so `NOT(a, b)` reads as `NOT(a OR b)`
//!
//! Every node is visited, even when the outcome is already decided, so the
//! trace always covers the full tree.

use super::node::{Comparison, ConditionNode, Field, Operator};

/// Anything a comparison can read demand attributes from
pub trait FieldSource {
    fn field(&self, field: Field) -> Option<&str>;
}

/// Outcome of evaluating one tree
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub matched: bool,
    /// One line per visited node, in pre-order, indented by depth
    pub log: Vec<String>,
}

/// Evaluate a condition tree against `input`
pub fn evaluate(node: &ConditionNode, input: &dyn FieldSource) -> Evaluation {
    let mut log = Vec::new();
    let matched = visit(node, input, 0, &mut log);
    Evaluation { matched, log }
}

/// Evaluate without collecting a trace
pub fn matches(node: &ConditionNode, input: &dyn FieldSource) -> bool {
    match node {
        ConditionNode::Comparison(cmp) => evaluate_compare(cmp, input),
        ConditionNode::And { children } | ConditionNode::If { children } => {
            children.iter().all(|c| matches(c, input))
        }
        ConditionNode::Or { children } => children.iter().any(|c| matches(c, input)),
        ConditionNode::Not { children } => !children.iter().any(|c| matches(c, input)),
    }
}

fn visit(
    node: &ConditionNode,
    input: &dyn FieldSource,
    depth: usize,
    log: &mut Vec<String>,
) -> bool {
    let indent = "  ".repeat(depth);
    match node {
        ConditionNode::Comparison(cmp) => {
            let result = evaluate_compare(cmp, input);
            let actual = input.field(cmp.field).unwrap_or("<null>");
            log.push(format!("{}{} [actual '{}'] -> {}", indent, cmp, actual, result));
            result
        }
        combinator => {
            let slot = log.len();
            log.push(String::new());
            let children = combinator.children().unwrap_or_default();
            let outcomes: Vec<bool> = children
                .iter()
                .map(|c| visit(c, input, depth + 1, log))
                .collect();
            let result = match combinator {
                ConditionNode::Or { .. } => outcomes.iter().any(|&b| b),
                ConditionNode::Not { .. } => !outcomes.iter().any(|&b| b),
                _ => outcomes.iter().all(|&b| b),
            };
            log[slot] = format!(
                "{}{} ({} children) -> {}",
                indent,
                combinator.kind(),
                children.len(),
                result
            );
            result
        }
    }
}

fn evaluate_compare(cmp: &Comparison, input: &dyn FieldSource) -> bool {
    let actual = input
        .field(cmp.field)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match cmp.operator {
        Operator::IsNull => return actual.is_none(),
        Operator::IsNotNull => return actual.is_some(),
        _ => {}
    }

    let expected = cmp.value.as_deref().unwrap_or("").trim();
    let Some(actual) = actual else {
        return matches!(cmp.operator, Operator::NotEquals | Operator::NotContains);
    };

    let a = actual.to_lowercase();
    let e = expected.to_lowercase();
    match cmp.operator {
        Operator::Equals => a == e,
        Operator::NotEquals => a != e,
        Operator::Contains => a.contains(&e),
        Operator::NotContains => !a.contains(&e),
        Operator::StartsWith => a.starts_with(&e),
        Operator::EndsWith => a.ends_with(&e),
        Operator::GreaterThan => compare_numbers(actual, expected, |x, y| x > y),
        Operator::LessThan => compare_numbers(actual, expected, |x, y| x < y),
        Operator::IsNull | Operator::IsNotNull => unreachable!("handled above"),
    }
}

fn compare_numbers<F>(actual: &str, expected: &str, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(e)) => cmp(a, e),
        _ => false,
    }
}
