//! Rule-driven channel enrichment
//!
//! Assigns flavor, category, and language tags by substring-matching rule
//! tables against channel display names. The tables are data, not code, so
//! rules can change without a rebuild.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::ProcessedChannel;

const DEFAULT_TAG: &str = "general";
const DEFAULT_LANGUAGE: &str = "en";

/// One rule table entry
///
/// `patterns` are checked before `keywords`; a match is rejected when any
/// exclude entry also matches the name. `priority` is only meaningful in
/// the category table (lower number = stronger match).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleEntry {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default = "default_rule_priority")]
    pub priority: i64,
}

fn default_rule_priority() -> i64 {
    100
}

/// A rule table in file iteration order
#[derive(Debug, Default)]
struct RuleTable {
    entries: Vec<(String, RuleEntry)>,
    default_language: Option<String>,
}

impl RuleTable {
    /// Load a table from a JSON file; a missing file degrades to an empty
    /// table, a malformed one is an error.
    fn load(path: &Path, table_key: &str) -> AppResult<Self> {
        if !path.exists() {
            warn!("Rules file not found: {}", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let parsed: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|e| AppError::configuration(format!("{}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        if let Some(table) = parsed.get(table_key).and_then(|v| v.as_object()) {
            for (tag_id, value) in table {
                let entry: RuleEntry = serde_json::from_value(value.clone()).map_err(|e| {
                    AppError::configuration(format!(
                        "{}: rule '{}': {}",
                        path.display(),
                        tag_id,
                        e
                    ))
                })?;
                entries.push((tag_id.clone(), entry));
            }
        }

        let default_language = parsed
            .get("default_language")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        debug!("Loaded {} rules from {}", entries.len(), path.display());
        Ok(Self {
            entries,
            default_language,
        })
    }
}

/// Enriches channels with flavor, category, and language tags
pub struct Enricher {
    flavor_rules: RuleTable,
    category_rules: RuleTable,
    language_rules: RuleTable,
}

impl Enricher {
    pub fn load(
        flavor_rules_path: &Path,
        category_rules_path: &Path,
        language_rules_path: &Path,
    ) -> AppResult<Self> {
        Ok(Self {
            flavor_rules: RuleTable::load(flavor_rules_path, "flavors")?,
            category_rules: RuleTable::load(category_rules_path, "categories")?,
            language_rules: RuleTable::load(language_rules_path, "languages")?,
        })
    }

    /// Enrich all channels in place, returning the collection for chaining
    pub fn enrich(&self, mut channels: Vec<ProcessedChannel>) -> Vec<ProcessedChannel> {
        for channel in &mut channels {
            let name_lower = channel.name.to_lowercase();
            channel.flavor = self.determine_flavor(&name_lower);
            channel.category = self.determine_category(&name_lower, &channel.category);
            channel.language = self.determine_language(&name_lower, &channel.language);
        }
        channels
    }

    /// First accepted match in table order wins; patterns are checked
    /// before keywords within a rule.
    fn determine_flavor(&self, name_lower: &str) -> String {
        for (flavor_id, rule) in &self.flavor_rules.entries {
            let pattern_hit = rule
                .patterns
                .iter()
                .any(|p| name_lower.contains(&p.to_lowercase()));
            let keyword_hit = !pattern_hit
                && rule
                    .keywords
                    .iter()
                    .any(|k| name_lower.contains(&k.to_lowercase()));

            if (pattern_hit || keyword_hit) && !is_excluded(rule, name_lower) {
                return flavor_id.clone();
            }
        }

        DEFAULT_TAG.to_string()
    }

    /// A channel that already carries a non-default category keeps it;
    /// otherwise the matching rule with the lowest priority number wins,
    /// ties broken by table order.
    fn determine_category(&self, name_lower: &str, current: &str) -> String {
        if !current.is_empty() && current != DEFAULT_TAG {
            return current.to_string();
        }

        let mut best_match: Option<&str> = None;
        let mut best_priority = i64::MAX;

        for (category_id, rule) in &self.category_rules.entries {
            if rule
                .patterns
                .iter()
                .any(|p| name_lower.contains(&p.to_lowercase()))
                && rule.priority < best_priority
            {
                best_match = Some(category_id);
                best_priority = rule.priority;
            }
        }

        match best_match {
            Some(category) => category.to_string(),
            None if !current.is_empty() => current.to_string(),
            None => DEFAULT_TAG.to_string(),
        }
    }

    /// A channel with a non-default language keeps it; otherwise first
    /// match in table order wins, falling back to the table's configured
    /// default language.
    fn determine_language(&self, name_lower: &str, current: &str) -> String {
        if !current.is_empty() && current != DEFAULT_LANGUAGE {
            return current.to_string();
        }

        for (lang_code, rule) in &self.language_rules.entries {
            let matched = rule
                .patterns
                .iter()
                .chain(rule.keywords.iter())
                .any(|p| name_lower.contains(&p.to_lowercase()));
            if matched {
                return lang_code.clone();
            }
        }

        if !current.is_empty() {
            current.to_string()
        } else {
            self.language_rules
                .default_language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
        }
    }
}

fn is_excluded(rule: &RuleEntry, name_lower: &str) -> bool {
    rule.exclude_patterns
        .iter()
        .chain(rule.exclude_keywords.iter())
        .any(|ex| name_lower.contains(&ex.to_lowercase()))
}
