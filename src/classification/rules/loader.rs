// SPDX-License-Identifier: MIT

//! Rule file loading
//!
//! Rule sets are kept in YAML or JSON files, either as a list of rules or a
//! single rule document. The format follows the file extension; `.yaml` and
//! `.yml` are YAML, anything else is read as JSON.

use super::record::ClassificationRule;
use crate::api::Result;
use crate::classification::condition::ValidationErrors;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Many(Vec<ClassificationRule>),
    One(Box<ClassificationRule>),
}

impl From<RuleFile> for Vec<ClassificationRule> {
    fn from(file: RuleFile) -> Self {
        match file {
            RuleFile::Many(rules) => rules,
            RuleFile::One(rule) => vec![*rule],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Yaml,
    Json,
}

impl RuleFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                RuleFormat::Yaml
            }
            _ => RuleFormat::Json,
        }
    }
}

/// Loads and saves rule sets
pub struct RuleLoader;

impl RuleLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load every rule in the file at `path`
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ClassificationRule>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let rules = match RuleFormat::from_path(path) {
            RuleFormat::Yaml => Self::parse_yaml(&content)?,
            RuleFormat::Json => Self::parse_json(&content)?,
        };
        log::info!("Loaded {} rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    /// Write `rules` to `path` as a list
    pub fn save<P: AsRef<Path>>(&self, path: P, rules: &[ClassificationRule]) -> Result<()> {
        let path = path.as_ref();
        let content = match RuleFormat::from_path(path) {
            RuleFormat::Yaml => serde_yaml::to_string(rules)?,
            RuleFormat::Json => serde_json::to_string_pretty(rules)?,
        };
        fs::write(path, content)?;
        log::info!("Wrote {} rules to {}", rules.len(), path.display());
        Ok(())
    }

    pub fn parse_yaml(content: &str) -> Result<Vec<ClassificationRule>> {
        let file: RuleFile = serde_yaml::from_str(content)?;
        Ok(file.into())
    }

    pub fn parse_json(content: &str) -> Result<Vec<ClassificationRule>> {
        let file: RuleFile = serde_json::from_str(content)?;
        Ok(file.into())
    }

    /// Validate every rule, prefixing each issue with the rule's name
    pub fn validate_all(rules: &[ClassificationRule]) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (i, rule) in rules.iter().enumerate() {
            if let Err(rule_errors) = rule.validate() {
                let label = if rule.name.trim().is_empty() {
                    format!("rule #{}", i + 1)
                } else {
                    format!("'{}'", rule.name)
                };
                for issue in rule_errors.issues() {
                    errors.push_field(format!("{}: {}", label, issue));
                }
            }
        }
        errors.into_result()
    }
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new()
    }
}
