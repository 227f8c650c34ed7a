//! The violation/insight result shape emitted for a matched rule.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::response::IncidentContext;
use super::rule::Link;

/// A rule's matched result: either a violation (effort > 0) or an insight
/// (effort 0 or unset), sharing the same shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Violation {
    /// Copied from the originating rule.
    pub description: Option<String>,
    /// Copied from the originating rule.
    pub category: Option<String>,
    /// Deduplicated labels (ruleset labels + rule labels + any `tag=` labels).
    pub labels: Vec<String>,
    /// Deduplicated incidents, in first-seen order.
    pub incidents: Vec<IncidentContext>,
    /// Links copied from the rule's `Perform`.
    pub links: Vec<Link>,
    /// Remediation effort; `None` here only for pure tag-rule insights.
    pub effort: Option<u32>,
    /// Extra rule-supplied data not otherwise modeled.
    pub extras: HashMap<String, Value>,
}

impl Violation {
    /// Append `labels`, skipping any already present.
    pub fn extend_labels<I: IntoIterator<Item = String>>(&mut self, labels: I) {
        for label in labels {
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
    }
}
