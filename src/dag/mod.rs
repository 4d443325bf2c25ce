// src/dag/mod.rs

//! Dependency graph plumbing for warm-up runs.
//!
//! - [`node`] defines what may serve as a node identity and the root sentinel.
//! - [`resolver`] is the pluggable "what does this node depend on" query.
//! - [`registry`] holds `(node, stageable)` registrations until a run drains them.
//! - [`wait_graph`] tracks which in-flight task waits on which, to catch cycles.
//! - [`graph`] is the config-backed graph used by the CLI.

pub mod graph;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod wait_graph;

pub use graph::DagGraph;
pub use node::{NodeKey, Target};
pub use registry::{Registry, Snapshot};
pub use resolver::{DependencyResolver, NoDependencies, ResolveError, StaticResolver};
pub use wait_graph::WaitGraph;
