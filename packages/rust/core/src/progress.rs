//! Progress reporting.
//!
//! The pipeline pushes [`ProgressUpdate`]s into a [`ProgressSink`]. A
//! [`LogAccumulator`] turns that stream into snapshots holding every log
//! line so far plus the latest known document and locator.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::stage::{StageFailure, format_ui_error};

/// One incremental progress event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub log_line: String,
    pub markdown: Option<String>,
    pub locator: Option<String>,
}

impl ProgressUpdate {
    /// A log-only update.
    pub fn log(line: impl Into<String>) -> Self {
        Self {
            log_line: line.into(),
            ..Default::default()
        }
    }

    /// An update carrying a finished document and where it was stored.
    pub fn result(
        line: impl Into<String>,
        markdown: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            log_line: line.into(),
            markdown: Some(markdown.into()),
            locator: Some(locator.into()),
        }
    }
}

/// Receives progress events in emission order.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, update: ProgressUpdate);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _update: ProgressUpdate) {}
}

/// `📍 {stage}: {message}`
pub fn format_log_line(stage: &str, message: &str) -> String {
    format!("📍 {stage}: {message}")
}

/// Format and emit a stage log line.
pub fn emit_log(sink: &dyn ProgressSink, stage: &str, message: &str) {
    info!(stage, "{message}");
    sink.emit(ProgressUpdate::log(format_log_line(stage, message)));
}

/// Accumulated view of the progress stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// All log lines so far, newline-separated.
    pub log: String,
    pub markdown: Option<String>,
    pub locator: Option<String>,
}

/// Sink that concatenates log lines and carries the latest document and
/// locator forward, notifying `on_update` after every event.
pub struct LogAccumulator<F> {
    state: Mutex<Snapshot>,
    on_update: F,
}

impl<F> LogAccumulator<F>
where
    F: Fn(&ProgressUpdate, &Snapshot) + Send + Sync,
{
    pub fn new(on_update: F) -> Self {
        Self {
            state: Mutex::new(Snapshot::default()),
            on_update,
        }
    }

    /// Current accumulated state.
    pub fn snapshot(&self) -> Snapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Append the user-facing rendering of a stage failure.
    pub fn record_failure(&self, failure: &StageFailure) {
        self.emit(ProgressUpdate::log(format_ui_error(failure)));
    }

    /// Append a line for an unclassified error, naming only its category.
    pub fn record_unexpected(&self, category: &str) {
        self.emit(ProgressUpdate::log(format!("❌ Unexpected error: {category}")));
    }
}

impl<F> ProgressSink for LogAccumulator<F>
where
    F: Fn(&ProgressUpdate, &Snapshot) + Send + Sync,
{
    fn emit(&self, update: ProgressUpdate) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.log.is_empty() {
                state.log.push('\n');
            }
            state.log.push_str(&update.log_line);
            if let Some(markdown) = &update.markdown {
                state.markdown = Some(markdown.clone());
            }
            if let Some(locator) = &update.locator {
                state.locator = Some(locator.clone());
            }
            state.clone()
        };
        (self.on_update)(&update, &snapshot);
    }
}
