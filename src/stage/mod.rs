// src/stage/mod.rs

//! Terminal warm-up work and its outcome reporting.
//!
//! - [`stageable`] defines the `Stageable` contract plus closure adapters.
//! - [`handler`] defines the `StageHandler` outcome sink and the stock
//!   implementations (no-op, logging, counting).

pub mod handler;
pub mod stageable;

pub use handler::{CountingStageHandler, LoggingStageHandler, NoOpStageHandler, StageHandler};
pub(crate) use handler::OnceStageHandler;
pub use stageable::{BlockingStageable, FnStageable, StageFuture, Stageable};

use thiserror::Error;

/// Why a stageable reported `on_error`.
#[derive(Error, Debug)]
pub enum StageError {
    /// The underlying warm-up action returned an error.
    #[error("warm-up action failed: {0:#}")]
    Failed(#[source] anyhow::Error),

    /// The run was cancelled (deadline, interrupt or cycle) while the action
    /// was in flight.
    #[error("warm-up action interrupted")]
    Interrupted,

    /// The action panicked; the payload message is kept when it is a string.
    #[error("warm-up action panicked: {0}")]
    Panicked(String),
}

impl StageError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StageError::Interrupted)
    }
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
