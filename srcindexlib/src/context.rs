//! Per-run state threaded through every component.
//!
//! Discovery warnings, extraction violations and cache degradation notices
//! are collected here rather than in global state, so a run's report can be
//! built from its context alone.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// File the diagnostic is about, if any
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Run-scoped context shared by the walker, caches and orchestrator.
#[derive(Debug, Default)]
pub struct RunContext {
    diagnostics: Mutex<Vec<Diagnostic>>,
    cache_misses: AtomicUsize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        // A poisoned lock only means another worker panicked mid-push.
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record and log a warning.
    pub fn warn(&self, path: Option<&Path>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.lock().push(Diagnostic {
            severity: Severity::Warning,
            path: path.map(Path::to_path_buf),
            message,
        });
    }

    /// Record and log an error that only affects `path`.
    pub fn error(&self, path: &Path, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(path = %path.display(), "{}", message);
        self.lock().push(Diagnostic {
            severity: Severity::Error,
            path: Some(path.to_path_buf()),
            message,
        });
    }

    /// Snapshot of all diagnostics so far, in recording order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn warning_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Count a TRAP cache lookup that found nothing.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Start a timed step; the returned guard logs `"<label> done (N ms)"`.
    pub fn begin(&self, label: impl Into<String>) -> TimedStep {
        let label = label.into();
        tracing::debug!("{}...", label);
        TimedStep {
            label,
            start: Instant::now(),
        }
    }
}

/// A running, timed step of work.
#[derive(Debug)]
pub struct TimedStep {
    label: String,
    start: Instant,
}

impl TimedStep {
    /// Finish the step and log its duration.
    pub fn end(self) -> u128 {
        let millis = self.start.elapsed().as_millis();
        tracing::info!("{} done ({} ms)", self.label, millis);
        millis
    }
}
