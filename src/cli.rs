// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `warmdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "warmdag",
    version,
    about = "Run warm-up commands in dependency order, in parallel where possible.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Warmup.toml")]
    pub config: String,

    /// Override `[config].max_wait` (e.g. "500ms", "30s", "2m").
    #[arg(long, value_name = "DURATION")]
    pub max_wait: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WARMDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the graph, but don't run any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
