//! Rulesets and their aggregated per-run results.

use std::collections::HashMap;

use serde::Serialize;

use super::rule::Rule;
use super::violation::Violation;

/// A named collection of rules sharing labels, loaded from one rule source.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Unique name of the ruleset.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Labels inherited by every rule in this set.
    pub labels: Vec<String>,
    /// The rules to evaluate.
    pub rules: Vec<Rule>,
}

/// The outcome of running one ruleset to completion.
///
/// Invariant: a rule id appears in exactly one of `violations`, `insights`,
/// `errors`, `unmatched`, `skipped`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleSetResult {
    /// Name of the originating ruleset.
    pub name: String,
    /// Description of the originating ruleset.
    pub description: Option<String>,
    /// Deduplicated tags produced by this ruleset's tag rules.
    pub tags: Vec<String>,
    /// Rules whose match produced a violation (effort > 0).
    pub violations: HashMap<String, Violation>,
    /// Rules whose match produced an insight (effort 0 or unset).
    pub insights: HashMap<String, Violation>,
    /// Rules that errored during evaluation, keyed by rule id.
    pub errors: HashMap<String, String>,
    /// Rule ids evaluated with no matching incidents.
    pub unmatched: Vec<String>,
    /// Rule ids filtered out before evaluation by an incident selector.
    pub skipped: Vec<String>,
}

impl RuleSetResult {
    /// A fresh, empty result for the given ruleset name/description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
            ..Self::default()
        }
    }

    /// Record a tag, deduplicating against tags already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}
