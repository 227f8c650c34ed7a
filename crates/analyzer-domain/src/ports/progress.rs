//! The progress port: staged run events delivered to reporters (§4.6, §6).

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// A stage of a run, reported in roughly this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The run has started.
    Init,
    /// A provider is starting up.
    ProviderStart,
    /// A provider finished initializing.
    ProviderInit,
    /// A provider is preparing (e.g. warming caches) before evaluation.
    ProviderPrepare,
    /// Rule sources are being parsed.
    RuleParsing,
    /// Rules are being evaluated.
    RuleExecution,
    /// Cross-rule dependency analysis (tag batches) is running.
    DependencyAnalysis,
    /// The run has finished.
    Complete,
}

/// A single progress update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Milliseconds since the run started.
    pub timestamp_ms: u64,
    /// Stage this event belongs to.
    pub stage: Stage,
    /// Human-readable description.
    pub message: Option<String>,
    /// Units of work completed so far, if known.
    pub current: Option<u64>,
    /// Total units of work, if known.
    pub total: Option<u64>,
    /// `current / total * 100`, if both are known.
    pub percent: Option<f64>,
    /// Arbitrary stage-specific metadata.
    pub metadata: HashMap<String, String>,
}

impl ProgressEvent {
    /// Build an event for `stage` with no progress counters.
    #[must_use]
    pub fn new(timestamp_ms: u64, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            stage,
            message: Some(message.into()),
            current: None,
            total: None,
            percent: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach `current`/`total` counters, computing `percent`.
    #[must_use]
    pub fn with_progress(mut self, current: u64, total: u64) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self.percent = if total == 0 {
            None
        } else {
            Some((current as f64 / total as f64) * 100.0)
        };
        self
    }
}

/// A sink for progress events.
///
/// Implementations must be non-blocking: a slow reporter must not stall the
/// scheduler (§4.6), so reporters backed by an I/O sink should buffer or
/// drop internally rather than awaiting on backpressure here.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Deliver one event.
    async fn report(&self, event: &ProgressEvent);
}
