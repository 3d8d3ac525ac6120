// SPDX-License-Identifier: MIT

//! Interactive editing of condition trees
//!
//! Each edit borrows the current tree and hands back a new root. Only the
//! edited node and its ancestors are rebuilt; siblings along the path are
//! copied into the new parents. The input tree is never changed, so a failed
//! edit leaves the caller with exactly what it had.

use super::node::{ConditionNode, Field, NodeKind, NodePath, Operator};
use crate::api::{ClassifierError, Result};

/// Partial update of a comparison; `None` keeps the current attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafPatch {
    pub field: Option<Field>,
    pub operator: Option<Operator>,
    pub value: Option<String>,
}

impl LeafPatch {
    pub fn field(field: Field) -> Self {
        Self {
            field: Some(field),
            ..Default::default()
        }
    }

    pub fn operator(operator: Operator) -> Self {
        Self {
            operator: Some(operator),
            ..Default::default()
        }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// A single editor operation
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SetNodeType { path: NodePath, kind: NodeKind },
    AddChild { path: NodePath },
    RemoveChild { path: NodePath, index: usize },
    UpdateLeaf { path: NodePath, patch: LeafPatch },
}

/// Switch the node at `path` to `kind`
///
/// Switching to a combinator drops field, operator and value and leaves an
/// empty child list; switching to a comparison yields the default
/// comparison. Re-selecting the current kind changes nothing.
pub fn set_node_type(
    root: &ConditionNode,
    path: &NodePath,
    kind: NodeKind,
) -> Result<ConditionNode> {
    rewrite(root, path, |node| {
        if node.kind() == kind {
            return Ok(node);
        }
        Ok(kind.empty_node())
    })
}

/// Append a default comparison to the combinator at `path`
///
/// Calling this on a comparison leaves the tree as it was.
pub fn add_child(root: &ConditionNode, path: &NodePath) -> Result<ConditionNode> {
    rewrite(root, path, |mut node| {
        match node.children_mut() {
            Some(children) => children.push(ConditionNode::default()),
            None => log::debug!("add_child on a comparison at {} ignored", path),
        }
        Ok(node)
    })
}

/// Remove child `index` of the combinator at `path`
///
/// The last remaining child may be removed.
pub fn remove_child(
    root: &ConditionNode,
    path: &NodePath,
    index: usize,
) -> Result<ConditionNode> {
    rewrite(root, path, |mut node| {
        let children = node
            .children_mut()
            .ok_or_else(|| ClassifierError::edit(format!("{} is not a combinator", path)))?;
        if index >= children.len() {
            return Err(ClassifierError::edit(format!(
                "{} has no child {} ({} children)",
                path,
                index,
                children.len()
            )));
        }
        children.remove(index);
        Ok(node)
    })
}

/// Apply `patch` to the comparison at `path`
pub fn update_leaf(
    root: &ConditionNode,
    path: &NodePath,
    patch: LeafPatch,
) -> Result<ConditionNode> {
    rewrite(root, path, |node| match node {
        ConditionNode::Comparison(mut cmp) => {
            if let Some(field) = patch.field {
                cmp.field = field;
            }
            if let Some(operator) = patch.operator {
                cmp.operator = operator;
            }
            if let Some(value) = patch.value {
                cmp.value = Some(value);
            }
            Ok(ConditionNode::Comparison(cmp))
        }
        other => Err(ClassifierError::edit(format!(
            "{} is a {} node, not a comparison",
            path,
            other.kind()
        ))),
    })
}

/// Apply `f` to a copy of the node at `path`, rebuilding every ancestor
fn rewrite<F>(root: &ConditionNode, path: &NodePath, f: F) -> Result<ConditionNode>
where
    F: FnOnce(ConditionNode) -> Result<ConditionNode>,
{
    if root.get(path).is_none() {
        return Err(ClassifierError::edit(format!("no node at {}", path)));
    }
    rebuild(root, path.steps(), f)
}

fn rebuild<F>(node: &ConditionNode, steps: &[usize], f: F) -> Result<ConditionNode>
where
    F: FnOnce(ConditionNode) -> Result<ConditionNode>,
{
    let Some((&idx, rest)) = steps.split_first() else {
        return f(node.clone());
    };

    let children = node
        .children()
        .ok_or_else(|| ClassifierError::edit("path descends into a comparison"))?;
    let child = children
        .get(idx)
        .ok_or_else(|| ClassifierError::edit(format!("no child {}", idx)))?;
    let rebuilt = rebuild(child, rest, f)?;

    let mut parent = node.kind().empty_node();
    if let Some(slots) = parent.children_mut() {
        slots.reserve(children.len());
        slots.extend_from_slice(&children[..idx]);
        slots.push(rebuilt);
        slots.extend_from_slice(&children[idx + 1..]);
    }
    Ok(parent)
}

/// Holds the tree being edited and applies edits to it
///
/// A failed edit leaves the previous tree in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionEditor {
    root: ConditionNode,
    revision: u64,
}

impl ConditionEditor {
    pub fn new(root: ConditionNode) -> Self {
        Self { root, revision: 0 }
    }

    pub fn root(&self) -> &ConditionNode {
        &self.root
    }

    pub fn into_root(self) -> ConditionNode {
        self.root
    }

    /// Number of edits applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn apply(&mut self, edit: Edit) -> Result<&ConditionNode> {
        let current = &self.root;
        let next = match edit {
            Edit::SetNodeType { path, kind } => set_node_type(current, &path, kind),
            Edit::AddChild { path } => add_child(current, &path),
            Edit::RemoveChild { path, index } => remove_child(current, &path, index),
            Edit::UpdateLeaf { path, patch } => update_leaf(current, &path, patch),
        }?;
        self.root = next;
        self.revision += 1;
        Ok(&self.root)
    }

    pub fn set_node_type(&mut self, path: &NodePath, kind: NodeKind) -> Result<&ConditionNode> {
        self.apply(Edit::SetNodeType {
            path: path.clone(),
            kind,
        })
    }

    pub fn add_child(&mut self, path: &NodePath) -> Result<&ConditionNode> {
        self.apply(Edit::AddChild { path: path.clone() })
    }

    pub fn remove_child(&mut self, path: &NodePath, index: usize) -> Result<&ConditionNode> {
        self.apply(Edit::RemoveChild {
            path: path.clone(),
            index,
        })
    }

    pub fn update_leaf(&mut self, path: &NodePath, patch: LeafPatch) -> Result<&ConditionNode> {
        self.apply(Edit::UpdateLeaf {
            path: path.clone(),
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::condition::Comparison;

    fn root() -> NodePath {
        NodePath::root()
    }

    fn two_leaf_and() -> ConditionNode {
        ConditionNode::and(vec![
            ConditionNode::compare(Field::Priority, Operator::Equals, "HIGH"),
            ConditionNode::compare(Field::AssetType, Operator::Equals, "database"),
        ])
    }

    #[test]
    fn test_set_node_type_to_combinator_clears_leaf() {
        for kind in [NodeKind::And, NodeKind::Or, NodeKind::Not, NodeKind::If] {
            let node = set_node_type(&ConditionNode::default(), &root(), kind).unwrap();
            assert_eq!(node.kind(), kind);
            assert_eq!(node.children().unwrap().len(), 0);
            assert!(node.as_comparison().is_none());
        }
    }

    #[test]
    fn test_set_node_type_between_combinators_empties_children() {
        let node = set_node_type(&two_leaf_and(), &root(), NodeKind::Or).unwrap();
        assert_eq!(node, ConditionNode::or(vec![]));
    }

    #[test]
    fn test_set_node_type_to_comparison_yields_default() {
        let node = set_node_type(&two_leaf_and(), &root(), NodeKind::Comparison).unwrap();
        assert_eq!(node, ConditionNode::default());
    }

    #[test]
    fn test_set_node_type_same_kind_keeps_node() {
        let tree = two_leaf_and();
        let node = set_node_type(&tree, &root(), NodeKind::And).unwrap();
        assert_eq!(node, tree);
    }

    #[test]
    fn test_add_child_appends_default() {
        let tree = two_leaf_and();
        let node = add_child(&tree, &root()).unwrap();
        let children = node.children().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[2], ConditionNode::default());
    }

    #[test]
    fn test_add_child_on_comparison_is_noop() {
        let leaf = ConditionNode::compare(Field::Title, Operator::Contains, "vpn");
        let node = add_child(&leaf, &root()).unwrap();
        assert_eq!(node, leaf);
    }

    #[test]
    fn test_remove_child_allows_emptying() {
        let node = remove_child(&two_leaf_and(), &root(), 0).unwrap();
        assert_eq!(node.children().unwrap().len(), 1);
        let node = remove_child(&node, &root(), 0).unwrap();
        assert_eq!(node, ConditionNode::and(vec![]));
    }

    #[test]
    fn test_remove_child_out_of_range() {
        let err = remove_child(&two_leaf_and(), &root(), 2).unwrap_err();
        assert!(matches!(err, ClassifierError::Edit(_)));
    }

    #[test]
    fn test_update_leaf_preserves_unspecified() {
        let path = NodePath::from(vec![1]);
        let node = update_leaf(&two_leaf_and(), &path, LeafPatch::value("webserver")).unwrap();
        assert_eq!(
            node.get(&path).unwrap().as_comparison().unwrap(),
            &Comparison::new(Field::AssetType, Operator::Equals, "webserver")
        );

        let node = update_leaf(&node, &path, LeafPatch::operator(Operator::StartsWith)).unwrap();
        assert_eq!(
            node.get(&path).unwrap().as_comparison().unwrap(),
            &Comparison::new(Field::AssetType, Operator::StartsWith, "webserver")
        );
    }

    #[test]
    fn test_update_leaf_on_combinator_fails() {
        let err =
            update_leaf(&two_leaf_and(), &root(), LeafPatch::field(Field::Title)).unwrap_err();
        assert!(matches!(err, ClassifierError::Edit(_)));
    }

    #[test]
    fn test_nested_edit_rebuilds_ancestors_only() {
        let tree = ConditionNode::when(vec![
            two_leaf_and(),
            ConditionNode::compare(Field::DemandType, Operator::Equals, "CHANGE"),
        ]);
        let path = NodePath::from(vec![0, 0]);
        let node = update_leaf(&tree, &path, LeafPatch::value("CRITICAL")).unwrap();

        assert_eq!(
            node.get(&path).unwrap().as_comparison().unwrap().value.as_deref(),
            Some("CRITICAL")
        );
        // untouched siblings keep their content
        assert_eq!(node.get(&NodePath::from(vec![1])), tree.get(&NodePath::from(vec![1])));
        assert_eq!(
            node.get(&NodePath::from(vec![0, 1])),
            tree.get(&NodePath::from(vec![0, 1]))
        );
    }

    #[test]
    fn test_invalid_path_rejected() {
        let err = add_child(&two_leaf_and(), &NodePath::from(vec![4])).unwrap_err();
        assert!(matches!(err, ClassifierError::Edit(_)));
        let err = add_child(&two_leaf_and(), &NodePath::from(vec![0, 0])).unwrap_err();
        assert!(matches!(err, ClassifierError::Edit(_)));
    }

    #[test]
    fn test_input_tree_survives_every_edit() {
        let tree = ConditionNode::when(vec![two_leaf_and()]);
        let nested = NodePath::from(vec![0]);

        assert!(remove_child(&tree, &nested, 5).is_err());
        assert!(update_leaf(&tree, &nested, LeafPatch::value("x")).is_err());
        assert!(set_node_type(&tree, &NodePath::from(vec![3]), NodeKind::Or).is_err());
        assert_eq!(tree, ConditionNode::when(vec![two_leaf_and()]));

        let edited = update_leaf(&tree, &nested.child(1), LeafPatch::value("cache")).unwrap();
        assert_ne!(edited, tree);
        assert_eq!(tree, ConditionNode::when(vec![two_leaf_and()]));
    }

    #[test]
    fn test_editor_builds_tree_step_by_step() {
        let mut editor = ConditionEditor::default();
        editor.set_node_type(&root(), NodeKind::And).unwrap();
        editor.add_child(&root()).unwrap();
        editor.add_child(&root()).unwrap();
        editor
            .update_leaf(
                &NodePath::from(vec![1]),
                LeafPatch {
                    field: Some(Field::AssetType),
                    value: Some("database".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(editor.root(), &two_leaf_and());
        assert_eq!(editor.revision(), 4);
    }

    #[test]
    fn test_editor_keeps_tree_on_failed_edit() {
        let mut editor = ConditionEditor::new(two_leaf_and());
        assert!(editor.remove_child(&root(), 9).is_err());
        assert_eq!(editor.root(), &two_leaf_and());
        assert_eq!(editor.revision(), 0);
    }
}
