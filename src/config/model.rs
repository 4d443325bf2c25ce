// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// max_wait = "30s"
/// parallelism = 4
///
/// [node.db]
/// warmup = ["pg_isready"]
///
/// [node.cache]
/// after = ["db"]
/// warmup = ["redis-cli ping"]
/// ```
///
/// Use [`ConfigFile::try_from`] to obtain a validated configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All nodes from `[node.<name>]`, keyed by node name.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Upper bound for one warm-up run (`"500ms"`, `"30s"`, `"2m"`, `"1h"`).
    ///
    /// Absent means wait as long as it takes.
    #[serde(default)]
    pub max_wait: Option<String>,

    /// Maximum number of warm-up commands running at once.
    ///
    /// Defaults to the machine's available parallelism.
    #[serde(default)]
    pub parallelism: Option<usize>,
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Nodes that must finish warming up before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shell commands to run for this node, one stageable each.
    ///
    /// A node without commands only links its dependencies.
    #[serde(default)]
    pub warmup: Vec<String>,
}

/// Validated configuration.
///
/// Guarantees: at least one node, every `after` entry names a known node,
/// no node depends on itself, the graph is acyclic and `max_wait` parsed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub node: BTreeMap<String, NodeConfig>,
    max_wait: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        node: BTreeMap<String, NodeConfig>,
        max_wait: Option<Duration>,
    ) -> Self {
        Self {
            config,
            node,
            max_wait,
        }
    }

    /// Parsed `[config].max_wait`.
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// `[config].parallelism`, falling back to available parallelism.
    pub fn parallelism(&self) -> usize {
        self.config
            .parallelism
            .unwrap_or_else(crate::engine::default_parallelism)
    }

    /// Total number of warm-up commands across all nodes.
    pub fn command_count(&self) -> usize {
        self.node.values().map(|n| n.warmup.len()).sum()
    }
}
