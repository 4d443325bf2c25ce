// src/lib.rs

//! Dependency-ordered, parallel warm-up runs.
//!
//! Collaborators register terminal warm-up work ("stageables") against node
//! identities on a [`WarmUper`]. A run drains those registrations, discovers
//! each node's dependencies on demand through a [`DependencyResolver`], and
//! executes every node's stageables only after all of its dependencies have
//! finished. Shared dependencies run once per run; independent branches run
//! concurrently.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod stage;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate, parse_duration};
use crate::exec::CommandStageable;
use crate::stage::LoggingStageHandler;

pub use crate::dag::{DagGraph, DependencyResolver, NodeKey, ResolveError, StaticResolver};
pub use crate::engine::{StageReport, WarmUper};
pub use crate::errors::{WarmUpError, WarmdagError};
pub use crate::stage::{StageError, StageHandler, Stageable};

/// How a CLI run ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every warm-up command ran and succeeded (or this was a dry run).
    Clean,
    /// At least one warm-up command failed.
    Failures,
    /// Ctrl-C arrived before the run finished.
    Interrupted,
}

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, registers one `CommandStageable` per
/// configured command, and drives a single warm-up run. Ctrl-C interrupts
/// the run.
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config from '{}'", args.config))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(RunStatus::Clean);
    }

    let warmuper = build_warmuper(&cfg, args.max_wait.as_deref())?;

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received; interrupting warm-up"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C; run cannot be interrupted");
                std::future::pending::<()>().await;
            }
        }
    };

    let report = warmuper
        .stage_until(Arc::new(LoggingStageHandler), interrupt)
        .await?;

    println!("warmdag: {report}");

    Ok(if report.interrupted {
        RunStatus::Interrupted
    } else if report.is_clean() {
        RunStatus::Clean
    } else {
        RunStatus::Failures
    })
}

/// Build a [`WarmUper`] for a validated config with every command registered.
///
/// `max_wait_override` takes precedence over `[config].max_wait`.
pub fn build_warmuper(
    cfg: &ConfigFile,
    max_wait_override: Option<&str>,
) -> Result<WarmUper<String>> {
    let max_wait = match max_wait_override {
        Some(s) => Some(parse_duration(s).map_err(|e| anyhow!("--max-wait: {e}"))?),
        None => cfg.max_wait(),
    };

    let warmuper = WarmUper::new(DagGraph::from_config(cfg)).with_parallelism(cfg.parallelism());
    warmuper.set_max_wait(max_wait);

    for (name, node) in cfg.node.iter() {
        for cmd in node.warmup.iter() {
            warmuper.register_type(name.clone(), Arc::new(CommandStageable::new(name, cmd)));
        }
    }

    debug!(
        nodes = warmuper.pending_nodes(),
        commands = cfg.command_count(),
        "registered warm-up commands"
    );
    Ok(warmuper)
}

/// Simple dry-run output: print nodes, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("warmdag dry-run");
    match cfg.max_wait() {
        Some(d) => println!("  config.max_wait = {d:?}"),
        None => println!("  config.max_wait = unbounded"),
    }
    println!("  config.parallelism = {}", cfg.parallelism());
    println!();

    let graph = DagGraph::from_config(cfg);
    println!("nodes ({}):", cfg.node.len());
    for (name, node) in cfg.node.iter() {
        println!("  - {name}");
        if !node.after.is_empty() {
            println!("      after: {:?}", node.after);
        }
        let dependents = graph.dependents_of(name);
        if !dependents.is_empty() {
            println!("      needed by: {dependents:?}");
        }
        for cmd in node.warmup.iter() {
            println!("      warmup: {cmd}");
        }
    }
    println!("  final nodes: {:?}", graph.sinks());

    debug!("dry-run complete (no execution)");
}
