//! Structured progress reporting for pipeline stages.
//!
//! Provides incremental feedback during long-running operations like
//! fetching, chunking, embedding and index building.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during pipeline operations.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Phase of the operation: "fetch", "chunk", "embed", "index"
    pub phase: String,

    /// Current progress (articles fetched, chunks embedded, etc.)
    pub current: u64,

    /// Total expected work (if known)
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    /// Human-readable message
    pub message: String,

    /// Elapsed time since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    /// Create a new progress event.
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    /// Set elapsed time.
    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => format!("{}", self.current),
        };

        let pct = match self.percentage {
            Some(p) => format!(" ({:.0}%)", p),
            None => String::new(),
        };

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter that emits events through a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl ProgressReporter {
    /// Create a new reporter with a callback.
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Create a no-op reporter (no events emitted).
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Emit a progress event.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let event = event.with_elapsed(elapsed);

            tracing::debug!(
                phase = %event.phase,
                current = event.current,
                total = ?event.total,
                message = %event.message,
                elapsed_secs = elapsed,
                "Progress event"
            );

            callback(event);
        }
    }

    /// Emit fetch phase event.
    pub fn fetch(&self, current: u64, total: Option<u64>, source: &str, keyword: &str) {
        self.emit(ProgressEvent::new(
            "fetch",
            current,
            total,
            format!("{} \"{}\"", source, keyword),
        ));
    }

    /// Emit chunking phase event.
    pub fn chunk(&self, current: u64, total: Option<u64>, chunks_created: usize) {
        self.emit(ProgressEvent::new(
            "chunk",
            current,
            total,
            format!("{} chunks created", chunks_created),
        ));
    }

    /// Emit embedding phase event.
    pub fn embed(&self, current: u64, total: Option<u64>, model: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            current,
            total,
            format!("model={}", model),
        ));
    }

    /// Emit indexing phase event.
    pub fn index(&self, current: u64, total: Option<u64>, kind: &str) {
        self.emit(ProgressEvent::new(
            "index",
            current,
            total,
            format!("building {} index", kind),
        ));
    }
}
