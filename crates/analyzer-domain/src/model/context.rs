//! Per-rule evaluation context: cross-rule tags and chain templates.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// Intermediate per-`As` record produced by a condition entry.
#[derive(Debug, Clone, Default)]
pub struct ChainTemplate {
    /// Filesystem paths derived from the entry's incidents.
    pub filepaths: Vec<String>,
    /// Arbitrary extra data carried from the entry's `templateContext`.
    pub extras: HashMap<String, Value>,
}

/// The evaluation context threaded through one rule's condition tree.
///
/// `tags` is shared read-only within a scheduler batch and merged between
/// batches; `template` is deep-copied per dispatched rule so siblings can
/// register `As` bindings without any cross-rule synchronization.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    /// Tags visible to `HasTags` conditions, produced by earlier batches.
    pub tags: HashSet<String>,
    /// Named chain template bindings produced by `As` entries.
    pub template: HashMap<String, ChainTemplate>,
}

impl ConditionContext {
    /// An empty context with no tags or template bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A deep copy suitable for handing to a single dispatched rule.
    ///
    /// Cloning here (rather than sharing via `Arc`) is what lets AND/OR/CHAIN
    /// mutate `template` locally without any locking inside rule evaluation.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }
}
