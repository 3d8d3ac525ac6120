// SPDX-License-Identifier: MIT

//! Rule records: a named, prioritized condition tree with a target class

use crate::classification::condition::{self, ConditionNode, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk tier assigned to a demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskClass {
    A,
    B,
    C,
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskClass::A => "A",
            RiskClass::B => "B",
            RiskClass::C => "C",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RiskClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RiskClass::A),
            "B" => Ok(RiskClass::B),
            "C" => Ok(RiskClass::C),
            other => Err(format!("Unknown classification: {}", other)),
        }
    }
}

/// A classification rule as stored by the backend
///
/// `id` and `priority_order` are assigned server-side and stay `None`
/// until the first successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub condition: ConditionNode,
    pub classification: RiskClass,
    pub confidence_score: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_order: Option<i32>,
}

fn default_active() -> bool {
    true
}

impl ClassificationRule {
    /// Fresh unsaved rule as the editor opens it
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            condition: ConditionNode::default(),
            classification: RiskClass::B,
            confidence_score: 0.8,
            active: true,
            priority_order: None,
        }
    }

    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_classification(mut self, classification: RiskClass, confidence: f64) -> Self {
        self.classification = classification;
        self.confidence_score = confidence;
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Rule-level checks plus every condition issue
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.push_field("name is required");
        }
        if !(0.0..=1.0).contains(&self.confidence_score) || self.confidence_score.is_nan() {
            errors.push_field(format!(
                "confidenceScore must be between 0 and 1, got {}",
                self.confidence_score
            ));
        }
        if let Err(tree_errors) = condition::validate(&self.condition) {
            errors.extend(tree_errors);
        }
        errors.into_result()
    }
}

/// Order rules the way the evaluator resolves conflicts
///
/// Lower `priority_order` wins; rules without one go last, ties keep their
/// relative order.
pub fn sort_by_priority(rules: &mut [ClassificationRule]) {
    rules.sort_by_key(|r| (r.priority_order.is_none(), r.priority_order.unwrap_or(0)));
}
