// SPDX-License-Identifier: MIT

//! Classification rules: records, persistence and the admin-facing manager

mod loader;
mod manager;
mod record;
mod store;

pub use loader::{RuleFormat, RuleLoader};
pub use manager::{RuleDraft, RuleManager};
pub use record::{sort_by_priority, ClassificationRule, RiskClass};
pub use store::{MemoryRuleStore, RuleStore};
