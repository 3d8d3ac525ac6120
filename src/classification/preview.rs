// SPDX-License-Identifier: MIT

//! Evaluation preview
//!
//! A sample demand (and optionally one specific rule) is sent to an
//! [`Evaluator`]; the structured result, including the step-by-step trace, is
//! kept for read-only display. [`PreviewClient`] never walks condition trees
//! itself. [`LocalEvaluator`] is a self-contained evaluator for offline use.

use crate::api::{ClassifierError, Result};
use crate::classification::condition::{self, Field, FieldSource};
use crate::classification::rules::{ClassificationRule, RiskClass, RuleStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;

/// Demand attributes submitted for a test classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub demand_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub business_justification: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub asset_owner: Option<String>,
}

impl DemandInput {
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            Field::Title => self.title = value,
            Field::Description => self.description = value,
            Field::DemandType => self.demand_type = value,
            Field::Priority => self.priority = value,
            Field::BusinessJustification => self.business_justification = value,
            Field::AssetType => self.asset_type = value,
            Field::AssetOwner => self.asset_owner = value,
        }
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }
}

impl FieldSource for DemandInput {
    fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::DemandType => &self.demand_type,
            Field::Priority => &self.priority,
            Field::BusinessJustification => &self.business_justification,
            Field::AssetType => &self.asset_type,
            Field::AssetOwner => &self.asset_owner,
        };
        value.as_deref()
    }
}

/// Body of `POST /api/classification/test`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    pub input: DemandInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<i64>,
}

/// Evaluator answer, consumed read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub classification: RiskClass,
    pub classification_hash: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_rule_name: Option<String>,
    #[serde(default)]
    pub evaluation_log: Vec<String>,
    pub timestamp: String,
}

/// Something that can classify a sample demand
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &TestRequest) -> Result<EvaluationResult>;
}

/// Submits previews and keeps the last outcome for display
pub struct PreviewClient {
    evaluator: Arc<dyn Evaluator>,
    last_result: Option<EvaluationResult>,
    last_error: Option<String>,
}

impl PreviewClient {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            last_result: None,
            last_error: None,
        }
    }

    /// Run one preview; the previous result is cleared either way
    pub async fn preview(
        &mut self,
        input: DemandInput,
        rule_id: Option<i64>,
    ) -> Result<&EvaluationResult> {
        self.last_result = None;
        self.last_error = None;

        let request = TestRequest { input, rule_id };
        match self.evaluator.evaluate(&request).await {
            Ok(result) => {
                log::info!(
                    "Preview classified as {} ({:.2}) by {:?}",
                    result.classification,
                    result.confidence_score,
                    result.applied_rule_name
                );
                Ok(&*self.last_result.insert(result))
            }
            Err(e) => {
                log::warn!("Preview failed: {}", e);
                self.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn last_result(&self) -> Option<&EvaluationResult> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }
}

/// Human-readable rendering of a result and its trace
pub fn render_trace(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Classification: {}", result.classification);
    let _ = writeln!(out, "Confidence:     {:.2}", result.confidence_score);
    let _ = writeln!(
        out,
        "Applied rule:   {}",
        result.applied_rule_name.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(out, "Hash:           {}", result.classification_hash);
    let _ = writeln!(out, "Timestamp:      {}", result.timestamp);
    let _ = writeln!(out, "Evaluation log:");
    for (i, line) in result.evaluation_log.iter().enumerate() {
        let _ = writeln!(out, "  {:>3}. {}", i + 1, line);
    }
    out
}

/// In-process evaluator over a [`RuleStore`]
///
/// Active rules are tried in priority order and the first match wins. With
/// a `rule_id` only that rule is tried, active or not. Without a match the
/// result carries the fallback class and zero confidence.
pub struct LocalEvaluator {
    store: Arc<dyn RuleStore>,
    fallback: RiskClass,
}

impl LocalEvaluator {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            fallback: RiskClass::C,
        }
    }

    pub fn with_fallback(mut self, fallback: RiskClass) -> Self {
        self.fallback = fallback;
        self
    }

    /// Classify `input` against an explicit, already ordered rule list
    pub fn classify(&self, rules: &[ClassificationRule], input: &DemandInput) -> EvaluationResult {
        self.run(rules, input, true)
    }

    fn run(
        &self,
        rules: &[ClassificationRule],
        input: &DemandInput,
        skip_inactive: bool,
    ) -> EvaluationResult {
        let mut log = Vec::new();
        for rule in rules {
            if skip_inactive && !rule.active {
                log.push(format!("Rule '{}' skipped (inactive)", rule.name));
                continue;
            }
            let priority = rule
                .priority_order
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            log.push(format!("Rule '{}' (priority {}):", rule.name, priority));
            let eval = condition::evaluate(&rule.condition, input);
            log.extend(eval.log.into_iter().map(|l| format!("  {}", l)));
            if eval.matched {
                log.push(format!("Matched '{}' -> {}", rule.name, rule.classification));
                return build_result(
                    input,
                    rule.classification,
                    rule.confidence_score,
                    Some(rule.name.clone()),
                    log,
                );
            }
        }
        log.push(format!("No rule matched, default classification {}", self.fallback));
        build_result(input, self.fallback, 0.0, None, log)
    }
}

#[async_trait]
impl Evaluator for LocalEvaluator {
    async fn evaluate(&self, request: &TestRequest) -> Result<EvaluationResult> {
        match request.rule_id {
            Some(id) => {
                let rule = self.store.get(id).await?;
                Ok(self.run(std::slice::from_ref(&rule), &request.input, false))
            }
            None => {
                let rules = self.store.list().await?;
                if rules.is_empty() {
                    log::debug!("Evaluating without any rules");
                }
                Ok(self.run(&rules, &request.input, true))
            }
        }
    }
}

fn build_result(
    input: &DemandInput,
    classification: RiskClass,
    confidence_score: f64,
    applied_rule_name: Option<String>,
    evaluation_log: Vec<String>,
) -> EvaluationResult {
    EvaluationResult {
        classification,
        classification_hash: classification_hash(input, classification),
        confidence_score,
        applied_rule_name,
        evaluation_log,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// SHA-256 over the canonical input document and the resulting class
pub fn classification_hash(input: &DemandInput, classification: RiskClass) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(input).unwrap_or_default());
    hasher.update(b"|");
    hasher.update(classification.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
