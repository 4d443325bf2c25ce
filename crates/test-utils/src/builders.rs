#![allow(dead_code)]

use std::collections::BTreeMap;
use warmdag::config::{ConfigFile, ConfigSection, NodeConfig, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn max_wait(mut self, duration: &str) -> Self {
        self.config.config.max_wait = Some(duration.to_string());
        self
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.config.parallelism = Some(n);
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self {
            node: NodeConfig {
                after: vec![],
                warmup: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.node.after.push(dep.to_string());
        self
    }

    pub fn warmup(mut self, cmd: &str) -> Self {
        self.node.warmup.push(cmd.to_string());
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
