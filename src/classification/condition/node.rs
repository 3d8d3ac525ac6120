// SPDX-License-Identifier: MIT

//! Condition tree data model
//!
//! A condition is a closed sum type. Comparisons are leaves; `AND`, `OR`,
//! `NOT` and `IF` combine an ordered list of child conditions. On the wire a
//! node is a JSON object tagged by `"type"`:
//!
//! ```json
//! {"type": "AND", "children": [
//!     {"type": "COMPARISON", "field": "priority", "operator": "EQUALS", "value": "HIGH"},
//!     {"type": "COMPARISON", "field": "assetType", "operator": "IS_NOT_NULL"}
//! ]}
//! ```

use crate::api::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Demand attributes a comparison can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Description,
    DemandType,
    Priority,
    BusinessJustification,
    AssetType,
    AssetOwner,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Title,
        Field::Description,
        Field::DemandType,
        Field::Priority,
        Field::BusinessJustification,
        Field::AssetType,
        Field::AssetOwner,
    ];

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::DemandType => "demandType",
            Field::Priority => "priority",
            Field::BusinessJustification => "businessJustification",
            Field::AssetType => "assetType",
            Field::AssetOwner => "assetOwner",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    /// Wire name, ignoring case
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// `IS_NULL` and `IS_NOT_NULL` ignore the comparison value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "EQUALS",
            Operator::NotEquals => "NOT_EQUALS",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThan => "LESS_THAN",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Comparison {
    pub field: Field,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Comparison {
    pub fn new(field: Field, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: Some(value.into()),
        }
    }

    /// Comparison for the value-less operators
    pub fn unary(field: Field, operator: Operator) -> Self {
        Self {
            field,
            operator,
            value: None,
        }
    }
}

impl Default for Comparison {
    fn default() -> Self {
        Self::new(Field::Priority, Operator::Equals, "HIGH")
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.operator.takes_value()) {
            (Some(v), true) => write!(f, "{} {} '{}'", self.field, self.operator, v),
            _ => write!(f, "{} {}", self.field, self.operator),
        }
    }
}

/// One node of a condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionNode {
    /// Leaf test on one field
    Comparison(Comparison),
    /// All children hold
    And {
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    /// At least one child holds
    Or {
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    /// No child holds
    Not {
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    /// Top-level grouping, combines like `AND`
    If {
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
}

/// Variant tags, used by the editor to switch a node's type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Comparison,
    And,
    Or,
    Not,
    If,
}

impl NodeKind {
    pub fn is_combinator(&self) -> bool {
        !matches!(self, NodeKind::Comparison)
    }

    /// Fresh node of this kind: default comparison or an empty combinator
    pub fn empty_node(&self) -> ConditionNode {
        match self {
            NodeKind::Comparison => ConditionNode::default(),
            NodeKind::And => ConditionNode::And { children: vec![] },
            NodeKind::Or => ConditionNode::Or { children: vec![] },
            NodeKind::Not => ConditionNode::Not { children: vec![] },
            NodeKind::If => ConditionNode::If { children: vec![] },
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Comparison => "COMPARISON",
            NodeKind::And => "AND",
            NodeKind::Or => "OR",
            NodeKind::Not => "NOT",
            NodeKind::If => "IF",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMPARISON" => Ok(NodeKind::Comparison),
            "AND" => Ok(NodeKind::And),
            "OR" => Ok(NodeKind::Or),
            "NOT" => Ok(NodeKind::Not),
            "IF" => Ok(NodeKind::If),
            other => Err(format!("Unknown condition type: {}", other)),
        }
    }
}

/// Location of a node: child indexes walked from the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(steps: Vec<usize>) -> Self {
        Self(steps)
    }
}

impl From<&[usize]> for NodePath {
    fn from(steps: &[usize]) -> Self {
        Self(steps.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for step in &self.0 {
            write!(f, ".{}", step)?;
        }
        Ok(())
    }
}

impl Default for ConditionNode {
    /// `priority EQUALS HIGH`, the seed for new rules and new children
    fn default() -> Self {
        ConditionNode::Comparison(Comparison::default())
    }
}

impl ConditionNode {
    pub fn and(children: Vec<ConditionNode>) -> Self {
        ConditionNode::And { children }
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Or { children }
    }

    pub fn not(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Not { children }
    }

    pub fn when(children: Vec<ConditionNode>) -> Self {
        ConditionNode::If { children }
    }

    pub fn compare(field: Field, operator: Operator, value: impl Into<String>) -> Self {
        ConditionNode::Comparison(Comparison::new(field, operator, value))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ConditionNode::Comparison(_) => NodeKind::Comparison,
            ConditionNode::And { .. } => NodeKind::And,
            ConditionNode::Or { .. } => NodeKind::Or,
            ConditionNode::Not { .. } => NodeKind::Not,
            ConditionNode::If { .. } => NodeKind::If,
        }
    }

    pub fn is_combinator(&self) -> bool {
        self.kind().is_combinator()
    }

    /// Children of a combinator, `None` for a comparison
    pub fn children(&self) -> Option<&[ConditionNode]> {
        match self {
            ConditionNode::Comparison(_) => None,
            ConditionNode::And { children }
            | ConditionNode::Or { children }
            | ConditionNode::Not { children }
            | ConditionNode::If { children } => Some(children),
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<ConditionNode>> {
        match self {
            ConditionNode::Comparison(_) => None,
            ConditionNode::And { children }
            | ConditionNode::Or { children }
            | ConditionNode::Not { children }
            | ConditionNode::If { children } => Some(children),
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match self {
            ConditionNode::Comparison(c) => Some(c),
            _ => None,
        }
    }

    /// Node at `path`, if every step exists
    pub fn get(&self, path: &NodePath) -> Option<&ConditionNode> {
        path.steps()
            .iter()
            .try_fold(self, |node, &idx| node.children()?.get(idx))
    }

    /// Number of nodes in the tree, this one included
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .map(|c| c.iter().map(ConditionNode::node_count).sum())
            .unwrap_or(0)
    }

    /// Depth of the tree; a lone comparison has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .and_then(|c| c.iter().map(ConditionNode::depth).max())
            .unwrap_or(0)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionNode::Comparison(c) => write!(f, "{}", c),
            other => {
                write!(f, "{}(", other.kind())?;
                for (i, child) in other.children().unwrap_or_default().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> ConditionNode {
        ConditionNode::when(vec![ConditionNode::and(vec![
            ConditionNode::compare(Field::Priority, Operator::Equals, "HIGH"),
            ConditionNode::or(vec![
                ConditionNode::compare(Field::AssetType, Operator::Equals, "database"),
                ConditionNode::Comparison(Comparison::unary(Field::AssetOwner, Operator::IsNull)),
            ]),
            ConditionNode::not(vec![ConditionNode::compare(
                Field::Title,
                Operator::Contains,
                "test",
            )]),
        ])])
    }

    #[test]
    fn test_default_node_is_priority_equals_high() {
        let node = ConditionNode::default();
        assert_eq!(
            node,
            ConditionNode::Comparison(Comparison {
                field: Field::Priority,
                operator: Operator::Equals,
                value: Some("HIGH".to_string()),
            })
        );
    }

    #[test]
    fn test_wire_format() {
        let node = ConditionNode::and(vec![
            ConditionNode::compare(Field::Priority, Operator::Equals, "HIGH"),
            ConditionNode::Comparison(Comparison::unary(Field::AssetType, Operator::IsNotNull)),
        ]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "AND",
                "children": [
                    {"type": "COMPARISON", "field": "priority", "operator": "EQUALS", "value": "HIGH"},
                    {"type": "COMPARISON", "field": "assetType", "operator": "IS_NOT_NULL"}
                ]
            })
        );
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let tree = sample_tree();
        let decoded = ConditionNode::from_json(&tree.to_json().unwrap()).unwrap();
        assert_eq!(decoded, tree);

        let pretty = ConditionNode::from_json(&tree.to_json_pretty().unwrap()).unwrap();
        assert_eq!(pretty, tree);
    }

    #[test]
    fn test_round_trip_keeps_value_on_null_operator() {
        let node = ConditionNode::Comparison(Comparison {
            field: Field::AssetOwner,
            operator: Operator::IsNull,
            value: Some("ignored".to_string()),
        });
        let decoded = ConditionNode::from_json(&node.to_json().unwrap()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = ConditionNode::from_json(r#"{"type": "XOR", "children": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_and_operator_rejected() {
        assert!(ConditionNode::from_json(
            r#"{"type": "COMPARISON", "field": "severity", "operator": "EQUALS", "value": "x"}"#
        )
        .is_err());
        assert!(ConditionNode::from_json(
            r#"{"type": "COMPARISON", "field": "priority", "operator": "MATCHES", "value": "x"}"#
        )
        .is_err());
    }

    #[test]
    fn test_parse_field_name() {
        assert_eq!("assetType".parse::<Field>().unwrap(), Field::AssetType);
        assert_eq!("DEMANDTYPE".parse::<Field>().unwrap(), Field::DemandType);
        assert!("severity".parse::<Field>().is_err());
    }

    #[test]
    fn test_comparison_with_children_rejected() {
        let result = ConditionNode::from_json(
            r#"{"type": "COMPARISON", "field": "priority", "operator": "EQUALS", "value": "HIGH", "children": []}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_children_decodes_empty() {
        let node = ConditionNode::from_json(r#"{"type": "OR"}"#).unwrap();
        assert_eq!(node, ConditionNode::or(vec![]));
    }

    #[test]
    fn test_get_by_path() {
        let tree = sample_tree();
        let leaf = tree.get(&NodePath::from(vec![0, 1, 0])).unwrap();
        assert_eq!(
            leaf.as_comparison().unwrap().value.as_deref(),
            Some("database")
        );
        assert!(tree.get(&NodePath::from(vec![0, 5])).is_none());
        assert!(tree.get(&NodePath::from(vec![0, 0, 0])).is_none());
        assert_eq!(tree.get(&NodePath::root()), Some(&tree));
    }

    #[test]
    fn test_node_count_and_depth() {
        let tree = sample_tree();
        assert_eq!(tree.node_count(), 8);
        assert_eq!(tree.depth(), 4);
        assert_eq!(ConditionNode::default().depth(), 1);
        assert_eq!(ConditionNode::and(vec![]).depth(), 1);
    }

    #[test]
    fn test_display() {
        let node = ConditionNode::and(vec![
            ConditionNode::compare(Field::Priority, Operator::Equals, "HIGH"),
            ConditionNode::Comparison(Comparison::unary(Field::AssetOwner, Operator::IsNull)),
        ]);
        assert_eq!(
            node.to_string(),
            "AND(priority EQUALS 'HIGH', assetOwner IS_NULL)"
        );
        assert_eq!(NodePath::from(vec![0, 2]).to_string(), "root.0.2");
    }

    #[test]
    fn test_node_kind_from_str() {
        assert_eq!("and".parse::<NodeKind>().unwrap(), NodeKind::And);
        assert_eq!("COMPARISON".parse::<NodeKind>().unwrap(), NodeKind::Comparison);
        assert!("xor".parse::<NodeKind>().is_err());
    }
}
