// src/dag/graph.rs

use std::collections::HashMap;

use crate::config::model::ConfigFile;
use crate::dag::resolver::{DependencyResolver, ResolveError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Nodes that must finish warming up before this one.
    deps: Vec<String>,
    /// Nodes that list this one in their `after`.
    dependents: Vec<String>,
}

/// In-memory warm-up graph keyed by node name, built from a validated config.
///
/// Acyclicity is already checked in `config::validate`; this only keeps
/// adjacency for dependency resolution and dry-run output.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut nodes: HashMap<String, DagNode> = cfg
            .node
            .iter()
            .map(|(name, node)| {
                (
                    name.clone(),
                    DagNode {
                        deps: node.after.clone(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for (name, node) in cfg.node.iter() {
            for dep in node.after.iter() {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all node names.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a node (its `after` list).
    pub fn after_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a node.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes nothing else depends on.
    pub fn sinks(&self) -> Vec<&str> {
        let mut sinks: Vec<&str> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.dependents.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        sinks.sort_unstable();
        sinks
    }
}

impl DependencyResolver<String> for DagGraph {
    fn dependencies_of(&self, node: &String) -> Result<Vec<String>, ResolveError> {
        self.nodes
            .get(node)
            .map(|n| n.deps.clone())
            .ok_or_else(|| ResolveError::Unresolvable(node.clone()))
    }
}
