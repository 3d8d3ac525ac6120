// SPDX-License-Identifier: MIT

//! Rule record management
//!
//! The manager mirrors what an administrator sees: the list of rules as the
//! server last reported it, the rule currently open in the editor, and the
//! last error banner. The server is the source of truth: every successful
//! mutation is followed by a fresh `list`, nothing is patched locally. A
//! failed re-fetch only sets the banner, the mutation itself still stands.

use super::record::ClassificationRule;
use super::store::RuleStore;
use crate::api::{Result, Session};
use crate::classification::condition::ConditionEditor;
use std::sync::Arc;

/// A rule open for editing: metadata plus the condition editor
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub rule: ClassificationRule,
    pub editor: ConditionEditor,
}

impl RuleDraft {
    pub fn new(rule: ClassificationRule) -> Self {
        let editor = ConditionEditor::new(rule.condition.clone());
        Self { rule, editor }
    }

    pub fn id(&self) -> Option<i64> {
        self.rule.id
    }

    /// The full document to send, with the edited condition
    pub fn to_rule(&self) -> ClassificationRule {
        ClassificationRule {
            condition: self.editor.root().clone(),
            ..self.rule.clone()
        }
    }
}

pub struct RuleManager {
    store: Arc<dyn RuleStore>,
    session: Session,
    rules: Vec<ClassificationRule>,
    editing: Option<RuleDraft>,
    last_error: Option<String>,
}

impl RuleManager {
    pub fn new(store: Arc<dyn RuleStore>, session: Session) -> Self {
        Self {
            store,
            session,
            rules: Vec::new(),
            editing: None,
            last_error: None,
        }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn editing(&self) -> Option<&RuleDraft> {
        self.editing.as_ref()
    }

    pub fn editing_mut(&mut self) -> Option<&mut RuleDraft> {
        self.editing.as_mut()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Re-fetch the rule list from the store
    pub async fn refresh(&mut self) -> Result<&[ClassificationRule]> {
        let result = self.fetch().await;
        self.record(result)?;
        Ok(self.rules.as_slice())
    }

    /// Open an unsaved rule with the default condition
    pub fn new_draft(&mut self, name: impl Into<String>) -> &mut RuleDraft {
        self.editing.insert(RuleDraft::new(ClassificationRule::draft(name)))
    }

    /// Open rule `id`, preferring the last fetched list
    pub async fn edit(&mut self, id: i64) -> Result<&mut RuleDraft> {
        let result = self.lookup(id).await;
        let rule = self.record(result)?;
        Ok(self.editing.insert(RuleDraft::new(rule)))
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Persist the rule open in the editor and close it on success
    ///
    /// Without an open draft this is a no-op returning `None`.
    pub async fn save(&mut self) -> Result<Option<ClassificationRule>> {
        let Some(draft) = &self.editing else {
            return Ok(None);
        };
        let rule = draft.to_rule();
        let stored = match rule.id {
            Some(id) => self.update(id, &rule).await?,
            None => self.create(&rule).await?,
        };
        self.editing = None;
        Ok(Some(stored))
    }

    /// Validate and create `rule`, then re-fetch
    pub async fn create(&mut self, rule: &ClassificationRule) -> Result<ClassificationRule> {
        let result = self.create_inner(rule).await;
        let stored = self.record(result)?;
        self.reload().await;
        Ok(stored)
    }

    /// Validate and replace rule `id`, then re-fetch
    pub async fn update(
        &mut self,
        id: i64,
        rule: &ClassificationRule,
    ) -> Result<ClassificationRule> {
        let result = self.update_inner(id, rule).await;
        let stored = self.record(result)?;
        self.reload().await;
        Ok(stored)
    }

    /// Delete rule `id`, closing the editor if it had that rule open
    pub async fn delete(&mut self, id: i64) -> Result<()> {
        let result = self.delete_inner(id).await;
        self.record(result)?;
        self.reload().await;
        Ok(())
    }

    /// Flip the active flag through a whole-document update
    pub async fn set_active(&mut self, id: i64, active: bool) -> Result<ClassificationRule> {
        let result = self.set_active_inner(id, active).await;
        let stored = self.record(result)?;
        self.reload().await;
        Ok(stored)
    }

    pub async fn export(&mut self) -> Result<Vec<ClassificationRule>> {
        let result = self.export_inner().await;
        self.record(result)
    }

    /// Import `rules` as new records, then re-fetch
    pub async fn import(&mut self, rules: &[ClassificationRule]) -> Result<usize> {
        let result = self.import_inner(rules).await;
        let count = self.record(result)?;
        self.reload().await;
        Ok(count)
    }

    async fn fetch(&mut self) -> Result<()> {
        self.session.require_admin()?;
        self.rules = self.store.list().await?;
        log::debug!("Fetched {} rules", self.rules.len());
        Ok(())
    }

    /// Re-fetch after a mutation the store already accepted
    async fn reload(&mut self) {
        if let Err(e) = self.fetch().await {
            log::warn!("Rule list reload failed: {}", e);
            self.last_error = Some(e.user_message());
        }
    }

    async fn lookup(&self, id: i64) -> Result<ClassificationRule> {
        self.session.require_admin()?;
        match self.rules.iter().find(|r| r.id == Some(id)) {
            Some(rule) => Ok(rule.clone()),
            None => self.store.get(id).await,
        }
    }

    async fn create_inner(&self, rule: &ClassificationRule) -> Result<ClassificationRule> {
        self.session.require_admin()?;
        rule.validate()?;
        let stored = self.store.create(rule).await?;
        log::info!(
            "Created rule '{}' (id {:?}, priority {:?})",
            stored.name,
            stored.id,
            stored.priority_order
        );
        Ok(stored)
    }

    async fn update_inner(&self, id: i64, rule: &ClassificationRule) -> Result<ClassificationRule> {
        self.session.require_admin()?;
        rule.validate()?;
        let stored = self.store.update(id, rule).await?;
        log::info!("Updated rule '{}' (id {})", stored.name, id);
        Ok(stored)
    }

    async fn set_active_inner(&self, id: i64, active: bool) -> Result<ClassificationRule> {
        self.session.require_admin()?;
        let mut rule = self.store.get(id).await?;
        rule.active = active;
        self.update_inner(id, &rule).await
    }

    async fn export_inner(&self) -> Result<Vec<ClassificationRule>> {
        self.session.require_admin()?;
        self.store.export().await
    }

    async fn import_inner(&self, rules: &[ClassificationRule]) -> Result<usize> {
        self.session.require_admin()?;
        for rule in rules {
            rule.validate()?;
        }
        let count = self.store.import(rules).await?;
        log::info!("Imported {} rules", count);
        Ok(count)
    }

    async fn delete_inner(&mut self, id: i64) -> Result<()> {
        self.session.require_admin()?;
        self.store.delete(id).await?;
        log::info!("Deleted rule {}", id);
        if self.editing.as_ref().and_then(RuleDraft::id) == Some(id) {
            self.editing = None;
        }
        Ok(())
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(value)
            }
            Err(e) => {
                log::warn!("Rule operation failed: {}", e);
                self.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }
}
