// src/engine/report.rs

use std::fmt;
use std::time::Duration;

/// Summary of one warm-up run that returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageReport {
    /// Nodes present in the registration snapshot.
    pub nodes_registered: usize,
    /// Distinct nodes that got a task, registered or discovered.
    pub nodes_visited: usize,
    /// Stageables present in the snapshot.
    pub stageables_registered: usize,
    /// Stageables actually started.
    pub stageables_run: usize,
    pub succeeded: usize,
    /// `on_error` reports, interruptions included.
    pub failed: usize,
    /// The waiting caller was interrupted before the run finished.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl StageReport {
    /// Every registered stageable ran and none reported an error.
    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self.failed == 0
            && self.stageables_run == self.stageables_registered
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node(s), {}/{} stageable(s) run, {} ok, {} failed in {:?}",
            self.nodes_visited,
            self.stageables_run,
            self.stageables_registered,
            self.succeeded,
            self.failed,
            self.elapsed
        )?;
        if self.interrupted {
            f.write_str(" (interrupted)")?;
        }
        Ok(())
    }
}
