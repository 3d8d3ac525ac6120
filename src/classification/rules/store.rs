// SPDX-License-Identifier: MIT

//! Persistence seam for rule records

use super::record::{sort_by_priority, ClassificationRule};
use crate::api::{ClassifierError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whole-document persistence of rule records
///
/// Implementations own id and `priority_order` assignment.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules, in priority order
    async fn list(&self) -> Result<Vec<ClassificationRule>>;

    async fn get(&self, id: i64) -> Result<ClassificationRule>;

    /// Persist a new rule and return it as stored
    async fn create(&self, rule: &ClassificationRule) -> Result<ClassificationRule>;

    /// Replace rule `id` with `rule`
    async fn update(&self, id: i64, rule: &ClassificationRule) -> Result<ClassificationRule>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Every rule, suitable for [`RuleStore::import`] elsewhere
    async fn export(&self) -> Result<Vec<ClassificationRule>> {
        self.list().await
    }

    /// Add `rules` as new records, returns how many were stored
    async fn import(&self, rules: &[ClassificationRule]) -> Result<usize>;
}

#[derive(Debug, Default)]
struct Inner {
    rules: Vec<ClassificationRule>,
    next_id: i64,
}

impl Inner {
    fn next_priority(&self) -> i32 {
        self.rules
            .iter()
            .filter_map(|r| r.priority_order)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn insert(&mut self, rule: &ClassificationRule) -> ClassificationRule {
        self.next_id += 1;
        let stored = ClassificationRule {
            id: Some(self.next_id),
            priority_order: Some(self.next_priority()),
            ..rule.clone()
        };
        self.rules.push(stored.clone());
        stored
    }
}

/// In-process store backing the development server and tests
#[derive(Clone, Default)]
pub struct MemoryRuleStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list(&self) -> Result<Vec<ClassificationRule>> {
        let inner = self.inner.read().await;
        let mut rules = inner.rules.clone();
        sort_by_priority(&mut rules);
        Ok(rules)
    }

    async fn get(&self, id: i64) -> Result<ClassificationRule> {
        let inner = self.inner.read().await;
        inner
            .rules
            .iter()
            .find(|r| r.id == Some(id))
            .cloned()
            .ok_or_else(|| ClassifierError::not_found("rule", id))
    }

    async fn create(&self, rule: &ClassificationRule) -> Result<ClassificationRule> {
        rule.validate()?;
        let mut inner = self.inner.write().await;
        let stored = inner.insert(rule);
        log::info!(
            "Created rule {:?} '{}' with priority {:?}",
            stored.id,
            stored.name,
            stored.priority_order
        );
        Ok(stored)
    }

    async fn update(&self, id: i64, rule: &ClassificationRule) -> Result<ClassificationRule> {
        rule.validate()?;
        let mut inner = self.inner.write().await;
        let existing = inner
            .rules
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or_else(|| ClassifierError::not_found("rule", id))?;

        let priority_order = rule.priority_order.or(existing.priority_order);
        *existing = ClassificationRule {
            id: Some(id),
            priority_order,
            ..rule.clone()
        };
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let before = inner.rules.len();
        inner.rules.retain(|r| r.id != Some(id));
        if inner.rules.len() == before {
            return Err(ClassifierError::not_found("rule", id));
        }
        log::info!("Deleted rule {}", id);
        Ok(())
    }

    async fn import(&self, rules: &[ClassificationRule]) -> Result<usize> {
        for rule in rules {
            rule.validate()?;
        }
        let mut inner = self.inner.write().await;
        for rule in rules {
            inner.insert(rule);
        }
        Ok(rules.len())
    }
}
