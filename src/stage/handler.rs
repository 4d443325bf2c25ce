// src/stage/handler.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use super::StageError;

/// Outcome sink invoked once per executed stageable.
///
/// Calls arrive from arbitrary worker threads, so implementations that
/// accumulate state must synchronise it themselves.
pub trait StageHandler: Send + Sync {
    fn on_success(&self, subject: &str);
    fn on_error(&self, subject: &str, cause: &StageError);
}

/// Ignores every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStageHandler;

impl StageHandler for NoOpStageHandler {
    fn on_success(&self, _subject: &str) {}
    fn on_error(&self, _subject: &str, _cause: &StageError) {}
}

/// Reports outcomes as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingStageHandler;

impl StageHandler for LoggingStageHandler {
    fn on_success(&self, subject: &str) {
        info!(subject = %subject, "warm-up succeeded");
    }

    fn on_error(&self, subject: &str, cause: &StageError) {
        warn!(subject = %subject, error = %cause, "warm-up failed");
    }
}

/// Decorator that counts outcomes before forwarding them.
///
/// The orchestrator wraps the caller's handler in one of these to build the
/// `StageReport` for a run.
pub struct CountingStageHandler {
    inner: Arc<dyn StageHandler>,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    interrupted: AtomicUsize,
}

impl CountingStageHandler {
    pub fn new(inner: Arc<dyn StageHandler>) -> Self {
        Self {
            inner,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            interrupted: AtomicUsize::new(0),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Acquire)
    }

    /// Errors of any kind, interruptions included.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CountingStageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingStageHandler")
            .field("succeeded", &self.succeeded())
            .field("failed", &self.failed())
            .field("interrupted", &self.interrupted())
            .finish_non_exhaustive()
    }
}

impl StageHandler for CountingStageHandler {
    fn on_success(&self, subject: &str) {
        self.succeeded.fetch_add(1, Ordering::AcqRel);
        self.inner.on_success(subject);
    }

    fn on_error(&self, subject: &str, cause: &StageError) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        if cause.is_interrupted() {
            self.interrupted.fetch_add(1, Ordering::AcqRel);
        }
        self.inner.on_error(subject, cause);
    }
}

/// Per-execution guard that forwards only the first outcome a stageable
/// reports.
pub(crate) struct OnceStageHandler<'a> {
    inner: &'a dyn StageHandler,
    reported: AtomicBool,
}

impl<'a> OnceStageHandler<'a> {
    pub(crate) fn new(inner: &'a dyn StageHandler) -> Self {
        Self {
            inner,
            reported: AtomicBool::new(false),
        }
    }

    pub(crate) fn reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    fn claim(&self, subject: &str) -> bool {
        let first = !self.reported.swap(true, Ordering::AcqRel);
        if !first {
            debug!(subject = %subject, "stageable already reported an outcome; dropping extra report");
        }
        first
    }
}

impl StageHandler for OnceStageHandler<'_> {
    fn on_success(&self, subject: &str) {
        if self.claim(subject) {
            self.inner.on_success(subject);
        }
    }

    fn on_error(&self, subject: &str, cause: &StageError) {
        if self.claim(subject) {
            self.inner.on_error(subject, cause);
        }
    }
}
