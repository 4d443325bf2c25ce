// src/exec/mod.rs

//! Process execution for config-driven warm-ups.
//!
//! - [`command`] provides `CommandStageable`, which runs one shell command
//!   with `tokio::process::Command` and reports its exit status to the
//!   run's `StageHandler`.

pub mod command;

pub use command::CommandStageable;
