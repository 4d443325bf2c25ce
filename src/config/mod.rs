// src/config/mod.rs

//! Configuration loading and validation for warmdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate graph invariants and parse durations (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, NodeConfig, RawConfigFile};
pub use validate::parse_duration;
