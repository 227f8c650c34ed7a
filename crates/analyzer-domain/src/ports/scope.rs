//! The scope port: run-wide path filters (§4.3).

use crate::model::{ConditionContext, IncidentContext};

/// A composable, run-wide filter over which paths rules are allowed to see.
///
/// `add_to_context` seeds the chain template so condition leaves can read
/// scope data (e.g. a pre-narrowed file list); `filter_response` drops
/// incidents after evaluation. Both must be idempotent under composition.
pub trait Scope: Send + Sync {
    /// Name used for diagnostics and for the chain template key it seeds.
    fn name(&self) -> &str;

    /// Seed `context.template` with scope-derived data, if any.
    fn add_to_context(&self, context: &mut ConditionContext);

    /// Whether `incident` should be dropped from the final result.
    fn filter_response(&self, incident: &IncidentContext) -> bool;
}

/// Left-to-right composition of multiple scopes.
///
/// `add_to_context` runs every scope in order; `filter_response` is a
/// short-circuiting OR (the first scope that wants to drop an incident wins).
pub struct CompositeScope {
    scopes: Vec<Box<dyn Scope>>,
}

impl CompositeScope {
    /// Build a composite from an ordered list of scopes.
    #[must_use]
    pub fn new(scopes: Vec<Box<dyn Scope>>) -> Self {
        Self { scopes }
    }
}

impl Scope for CompositeScope {
    fn name(&self) -> &str {
        "composite"
    }

    fn add_to_context(&self, context: &mut ConditionContext) {
        for scope in &self.scopes {
            scope.add_to_context(context);
        }
    }

    fn filter_response(&self, incident: &IncidentContext) -> bool {
        self.scopes.iter().any(|scope| scope.filter_response(incident))
    }
}
