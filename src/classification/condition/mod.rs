// SPDX-License-Identifier: MIT

//! Classification rule conditions
//!
//! This module provides the condition tree model, its editor, save-time
//! validation and a local evaluator. A condition looks like:
//! - `priority EQUALS HIGH`
//! - `AND(priority EQUALS HIGH, assetType EQUALS database)`
//! - `NOT(OR(assetOwner IS_NULL, title CONTAINS test))`

mod editor;
mod evaluator;
mod node;
mod validate;

pub use editor::{
    add_child, remove_child, set_node_type, update_leaf, ConditionEditor, Edit, LeafPatch,
};
pub use evaluator::{evaluate, matches, Evaluation, FieldSource};
pub use node::{Comparison, ConditionNode, Field, NodeKind, NodePath, Operator};
pub use validate::{validate, ValidationErrors, ValidationIssue};
