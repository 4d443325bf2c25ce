// src/dag/resolver.rs

//! Dependency discovery.
//!
//! The scheduler never sees a precomputed graph. It asks a
//! [`DependencyResolver`] for one node's direct dependencies at the moment a
//! task for that node starts. Resolvers should be side-effect free; any error
//! they return is treated by the scheduler as "no dependencies".

use std::collections::HashMap;

use thiserror::Error;

use super::NodeKey;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The node carries no dependency information (e.g. an abstract type).
    #[error("no dependency information for {0}")]
    Unresolvable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Answers "which nodes must be warmed up before this one".
pub trait DependencyResolver<N>: Send + Sync {
    fn dependencies_of(&self, node: &N) -> Result<Vec<N>, ResolveError>;
}

impl<N, F> DependencyResolver<N> for F
where
    F: Fn(&N) -> Result<Vec<N>, ResolveError> + Send + Sync,
{
    fn dependencies_of(&self, node: &N) -> Result<Vec<N>, ResolveError> {
        self(node)
    }
}

/// Every node is a leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl<N> DependencyResolver<N> for NoDependencies {
    fn dependencies_of(&self, _node: &N) -> Result<Vec<N>, ResolveError> {
        Ok(Vec::new())
    }
}

/// Resolver backed by an explicit adjacency map.
///
/// Nodes never mentioned as a dependent are reported as
/// [`ResolveError::Unresolvable`]; nodes only mentioned as a dependency target
/// are leaves.
#[derive(Debug, Clone)]
pub struct StaticResolver<N> {
    edges: HashMap<N, Vec<N>>,
}

impl<N: NodeKey> StaticResolver<N> {
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    /// Record that `node` depends on `dependency`.
    pub fn with_edge(mut self, node: N, dependency: N) -> Self {
        self.add_edge(node, dependency);
        self
    }

    /// Record all of `node`'s dependencies at once.
    pub fn with_dependencies(mut self, node: N, deps: impl IntoIterator<Item = N>) -> Self {
        self.edges.entry(node.clone()).or_default();
        for dep in deps {
            self.add_edge(node.clone(), dep);
        }
        self
    }

    pub fn add_edge(&mut self, node: N, dependency: N) {
        let deps = self.edges.entry(node).or_default();
        if !deps.contains(&dependency) {
            deps.push(dependency.clone());
        }
        self.edges.entry(dependency).or_default();
    }
}

impl<N: NodeKey> Default for StaticResolver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NodeKey> DependencyResolver<N> for StaticResolver<N> {
    fn dependencies_of(&self, node: &N) -> Result<Vec<N>, ResolveError> {
        self.edges
            .get(node)
            .cloned()
            .ok_or_else(|| ResolveError::Unresolvable(format!("{node:?}")))
    }
}
