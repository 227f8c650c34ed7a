//! The condition tree: the boolean/chain composition algebra evaluated
//! against a provider for each rule.

/// One child of an AND/OR/CHAIN composite.
///
/// `from` and `as_name` wire a producer/consumer relationship between
/// siblings via the evaluation context's chain templates; `not` inverts
/// the subtree's match after it has evaluated; `ignorable` suppresses the
/// subtree's incidents from the parent without affecting matching.
#[derive(Debug, Clone)]
pub struct ConditionEntry {
    /// Name of a previously produced chain template this entry requires.
    pub from: Option<String>,
    /// Name under which this entry's template output is registered.
    pub as_name: Option<String>,
    /// Suppress incidents from this subtree in the parent's aggregate.
    pub ignorable: bool,
    /// Invert this entry's matched flag after evaluation.
    pub not: bool,
    /// The nested condition.
    pub condition: Condition,
}

/// A leaf invocation of a provider capability.
#[derive(Debug, Clone)]
pub struct ProviderCondition {
    /// Name of the provider to invoke (resolved through a provider registry).
    pub provider: String,
    /// Capability exposed by the provider, e.g. `"keyword.exists"`.
    pub capability: String,
    /// Opaque capability input, forwarded to the provider as-is.
    pub input: serde_json::Value,
}

/// The recursive condition tree.
#[derive(Debug, Clone)]
pub enum Condition {
    /// All entries must match (non-short-circuit); `matched` is the conjunction.
    And(Vec<ConditionEntry>),
    /// Any entry must match (non-short-circuit); `matched` is the disjunction.
    Or(Vec<ConditionEntry>),
    /// Entries evaluate in author order; `matched` is the last entry's result.
    Chain(Vec<ConditionEntry>),
    /// A provider capability invocation.
    Provider(ProviderCondition),
    /// True iff every named tag is present in the run's tag set.
    HasTags(Vec<String>),
}

impl Condition {
    /// Entries of a composite, or `None` for a leaf condition.
    #[must_use]
    pub fn entries(&self) -> Option<&[ConditionEntry]> {
        match self {
            Self::And(entries) | Self::Or(entries) | Self::Chain(entries) => Some(entries),
            Self::Provider(_) | Self::HasTags(_) => None,
        }
    }

    /// Whether any condition in this rule references `hasTags`.
    ///
    /// Used by the scheduler to classify tag rules as initial or dependent
    /// (§4.4): a tag rule whose condition tree contains `HasTags` anywhere
    /// must run after the batch that produces those tags.
    #[must_use]
    pub fn references_has_tags(&self) -> bool {
        match self {
            Self::HasTags(_) => true,
            Self::Provider(_) => false,
            Self::And(entries) | Self::Or(entries) | Self::Chain(entries) => entries
                .iter()
                .any(|entry| entry.condition.references_has_tags()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn leaf() -> ConditionEntry {
        ConditionEntry {
            from: None,
            as_name: None,
            ignorable: false,
            not: false,
            condition: Condition::Provider(ProviderCondition {
                provider: "p".to_owned(),
                capability: "c".to_owned(),
                input: serde_json::Value::Null,
            }),
        }
    }

    #[rstest]
    #[case(Condition::Provider(ProviderCondition { provider: "p".to_owned(), capability: "c".to_owned(), input: serde_json::Value::Null }), false)]
    #[case(Condition::HasTags(vec!["x".to_owned()]), true)]
    #[case(Condition::And(vec![leaf()]), false)]
    #[case(Condition::Or(vec![ConditionEntry { condition: Condition::HasTags(vec![]), ..leaf() }]), true)]
    fn references_has_tags_looks_through_composites(#[case] condition: Condition, #[case] expected: bool) {
        assert_eq!(condition.references_has_tags(), expected);
    }

    #[test]
    fn leaf_conditions_have_no_entries() {
        assert!(Condition::HasTags(vec![]).entries().is_none());
        assert!(matches!(Condition::And(vec![leaf()]).entries(), Some(entries) if entries.len() == 1));
    }
}
