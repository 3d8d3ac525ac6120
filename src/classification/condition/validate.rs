// SPDX-License-Identifier: MIT

//! Save-time validation of condition trees

use super::node::{ConditionNode, NodePath};
use std::fmt;

/// A single problem found in a tree or rule
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Node the issue belongs to; `None` for rule-level fields
    pub path: Option<NodePath>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Every issue found in one validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_node(&mut self, path: NodePath, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: Some(path),
            message: message.into(),
        });
    }

    pub fn push_field(&mut self, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: None,
            message: message.into(),
        });
    }

    /// Append every issue of `other`
    pub fn extend(&mut self, other: ValidationErrors) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a whole tree, collecting every issue
pub fn validate(node: &ConditionNode) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    collect(node, &NodePath::root(), &mut errors);
    errors.into_result()
}

fn collect(node: &ConditionNode, path: &NodePath, errors: &mut ValidationErrors) {
    match node {
        ConditionNode::Comparison(cmp) => {
            if !cmp.operator.takes_value() {
                return;
            }
            let blank = cmp.value.as_deref().map(str::trim).unwrap_or("").is_empty();
            if blank {
                errors.push_node(
                    path.clone(),
                    format!("{} {} requires a value", cmp.field, cmp.operator),
                );
            }
        }
        combinator => {
            for (i, child) in combinator.children().unwrap_or_default().iter().enumerate() {
                collect(child, &path.child(i), errors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::condition::{Comparison, Field, Operator};

    fn cmp(operator: Operator, value: Option<&str>) -> ConditionNode {
        ConditionNode::Comparison(Comparison {
            field: Field::AssetType,
            operator,
            value: value.map(str::to_string),
        })
    }

    #[test]
    fn test_null_operators_valid_with_or_without_value() {
        for op in [Operator::IsNull, Operator::IsNotNull] {
            assert!(validate(&cmp(op, None)).is_ok());
            assert!(validate(&cmp(op, Some(""))).is_ok());
            assert!(validate(&cmp(op, Some("anything"))).is_ok());
        }
    }

    #[test]
    fn test_value_operators_require_value() {
        let ops = [
            Operator::Equals,
            Operator::NotEquals,
            Operator::Contains,
            Operator::NotContains,
            Operator::StartsWith,
            Operator::EndsWith,
            Operator::GreaterThan,
            Operator::LessThan,
        ];
        for op in ops {
            assert!(validate(&cmp(op, Some("x"))).is_ok(), "{} with value", op);
            assert!(validate(&cmp(op, None)).is_err(), "{} without value", op);
            assert!(validate(&cmp(op, Some(""))).is_err(), "{} with empty", op);
            assert!(validate(&cmp(op, Some("   "))).is_err(), "{} with blank", op);
        }
    }

    #[test]
    fn test_collects_all_issues_with_paths() {
        let tree = ConditionNode::and(vec![
            cmp(Operator::Equals, None),
            ConditionNode::or(vec![cmp(Operator::IsNull, None), cmp(Operator::Contains, Some(""))]),
        ]);
        let errors = validate(&tree).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.issues()[0].path, Some(NodePath::from(vec![0])));
        assert_eq!(errors.issues()[1].path, Some(NodePath::from(vec![1, 1])));
        assert_eq!(
            errors.to_string(),
            "root.0: assetType EQUALS requires a value; root.1.1: assetType CONTAINS requires a value"
        );
    }

    #[test]
    fn test_empty_combinators_are_valid() {
        assert!(validate(&ConditionNode::and(vec![])).is_ok());
        assert!(validate(&ConditionNode::not(vec![])).is_ok());
    }
}
