//! The progress bus (§4.6): staged events delivered through collectors to
//! reporters. Reporters must never block the scheduler, so both collectors
//! use fire-and-forget delivery rather than awaiting reporter backpressure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use analyzer_domain::ports::{ProgressEvent, ProgressReporter, Stage};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Receives every event the run produces and decides how to forward it.
#[async_trait]
pub trait ProgressCollector: Send + Sync {
    /// Handle one event.
    async fn collect(&self, event: ProgressEvent);

    /// Handle the run's final event; unlike `collect`, this must always
    /// reach the reporters regardless of any throttling in effect.
    async fn finish(&self, event: ProgressEvent) {
        self.collect(event).await;
    }
}

/// Forwards every event to every reporter immediately.
pub struct PassThroughCollector {
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl PassThroughCollector {
    /// Build a collector over `reporters`.
    #[must_use]
    pub fn new(reporters: Vec<Arc<dyn ProgressReporter>>) -> Self {
        Self { reporters }
    }

    async fn broadcast(&self, event: &ProgressEvent) {
        for reporter in &self.reporters {
            reporter.report(event).await;
        }
    }
}

#[async_trait]
impl ProgressCollector for PassThroughCollector {
    async fn collect(&self, event: ProgressEvent) {
        self.broadcast(&event).await;
    }
}

/// Forwards the first event, the final event, and at most one event per
/// `interval` in between; everything else is dropped.
pub struct ThrottledCollector {
    reporters: Vec<Arc<dyn ProgressReporter>>,
    interval: Duration,
    last_sent: Mutex<Option<Instant>>,
    seen_count: AtomicU64,
}

impl ThrottledCollector {
    /// Build a collector forwarding at most one event per `interval`
    /// (default 500 ms, per §4.6).
    #[must_use]
    pub fn new(reporters: Vec<Arc<dyn ProgressReporter>>, interval: Duration) -> Self {
        Self {
            reporters,
            interval,
            last_sent: Mutex::new(None),
            seen_count: AtomicU64::new(0),
        }
    }

    /// A collector using the default 500 ms throttle interval.
    #[must_use]
    pub fn with_default_interval(reporters: Vec<Arc<dyn ProgressReporter>>) -> Self {
        Self::new(reporters, Duration::from_millis(500))
    }

    async fn broadcast(&self, event: &ProgressEvent) {
        for reporter in &self.reporters {
            reporter.report(event).await;
        }
    }
}

#[async_trait]
impl ProgressCollector for ThrottledCollector {
    async fn collect(&self, event: ProgressEvent) {
        let is_first = self.seen_count.fetch_add(1, Ordering::SeqCst) == 0;
        let mut last_sent = self.last_sent.lock().await;
        let should_send = is_first
            || last_sent.is_none_or(|last| last.elapsed() >= self.interval);
        if should_send {
            *last_sent = Some(Instant::now());
            drop(last_sent);
            self.broadcast(&event).await;
        }
    }

    async fn finish(&self, event: ProgressEvent) {
        self.broadcast(&event).await;
    }
}

/// A `ProgressBus` ties a monotonic clock to whichever collector the caller
/// configured, and is the handle the scheduler/loader actually hold.
pub struct ProgressBus {
    start: Instant,
    collector: Arc<dyn ProgressCollector>,
}

impl ProgressBus {
    /// Build a bus over `collector`, starting its elapsed-time clock now.
    #[must_use]
    pub fn new(collector: Arc<dyn ProgressCollector>) -> Self {
        Self {
            start: Instant::now(),
            collector,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Emit a plain staged event.
    pub async fn emit(&self, stage: Stage, message: impl Into<String>) {
        let event = ProgressEvent::new(self.elapsed_ms(), stage, message);
        self.collector.collect(event).await;
    }

    /// Emit a staged event with `current`/`total` progress counters.
    pub async fn emit_progress(
        &self,
        stage: Stage,
        message: impl Into<String>,
        current: u64,
        total: u64,
    ) {
        let event = ProgressEvent::new(self.elapsed_ms(), stage, message).with_progress(current, total);
        self.collector.collect(event).await;
    }

    /// Emit the terminal `Complete` event, bypassing any throttling.
    pub async fn complete(&self, message: impl Into<String>) {
        let event = ProgressEvent::new(self.elapsed_ms(), Stage::Complete, message);
        self.collector.finish(event).await;
    }
}

/// Logs each event via `tracing` at info level.
pub struct TextReporter;

#[async_trait]
impl ProgressReporter for TextReporter {
    async fn report(&self, event: &ProgressEvent) {
        match (event.current, event.total) {
            (Some(current), Some(total)) => {
                tracing::info!(stage = ?event.stage, current, total, "{}", event.message.as_deref().unwrap_or_default());
            }
            _ => {
                tracing::info!(stage = ?event.stage, "{}", event.message.as_deref().unwrap_or_default());
            }
        }
    }
}

/// Writes one JSON object per line to stdout, for machine consumption.
pub struct JsonReporter;

#[async_trait]
impl ProgressReporter for JsonReporter {
    async fn report(&self, event: &ProgressEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, "failed to serialize progress event"),
        }
    }
}

/// Overwrites a single terminal line with `current/total` and `percent`.
pub struct BarReporter;

#[async_trait]
impl ProgressReporter for BarReporter {
    async fn report(&self, event: &ProgressEvent) {
        if let (Some(current), Some(total)) = (event.current, event.total) {
            let percent = event.percent.unwrap_or(0.0);
            print!("\r[{stage:?}] {current}/{total} ({percent:.1}%)", stage = event.stage);
            use std::io::Write as _;
            let _ = std::io::stdout().flush();
        }
    }
}

/// Forwards every event onto an `mpsc` channel for embedding in another process.
pub struct ChannelReporter {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelReporter {
    /// Build a reporter that forwards onto `sender`.
    #[must_use]
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    async fn report(&self, event: &ProgressEvent) {
        // A full or closed channel means the embedder stopped listening;
        // dropping the event here keeps this reporter non-blocking.
        let _ = self.sender.try_send(event.clone());
    }
}
