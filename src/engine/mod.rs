// src/engine/mod.rs

//! Warm-up run engine.
//!
//! - [`warmuper`] is the orchestrator: it owns registrations, starts a run,
//!   and enforces the deadline.
//! - [`task`] is the per-node scheduling unit that forks, deduplicates and
//!   joins dependency tasks before staging its own node.
//! - [`report`] summarises a finished run.

pub mod report;
pub mod task;
pub mod warmuper;

pub use report::StageReport;
pub use task::{TaskFailure, TaskHandle, WarmUpTask};
pub use warmuper::WarmUper;

use std::num::NonZeroUsize;

/// Worker count used when none is configured.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
