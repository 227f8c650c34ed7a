//! The provider port: external analyzers consulted by condition leaves.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::{ConditionContext, ConditionResponse};

/// An external analyzer capability invoked by a provider-leaf condition.
///
/// Implementations must tolerate concurrent invocation from different
/// worker tasks (§5 "Shared resources") but may serialize work internally
/// per call; a call is scoped to a single rule's evaluation.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable name this provider is registered under.
    fn name(&self) -> &str;

    /// Capabilities this provider exposes, e.g. `["keyword.exists"]`.
    fn capabilities(&self) -> Vec<String>;

    /// Evaluate one capability invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is unknown, the input is
    /// malformed, or the underlying analysis fails. Any error aborts the
    /// enclosing composite (§4.1) and is recorded against the rule (§7).
    async fn evaluate(
        &self,
        context: &ConditionContext,
        capability: &str,
        input: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ConditionResponse>;
}
