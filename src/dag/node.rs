// src/dag/node.rs

use std::fmt::{self, Debug};
use std::hash::Hash;

/// Anything usable as a node identity in the warm-up graph.
pub trait NodeKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> NodeKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// What a single warm-up task is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target<N> {
    /// Synthetic entry point; its children are every registered node.
    Root,
    Node(N),
}

impl<N> Target<N> {
    pub fn node(&self) -> Option<&N> {
        match self {
            Target::Root => None,
            Target::Node(n) => Some(n),
        }
    }
}

impl<N: Debug> fmt::Display for Target<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Root => f.write_str("<root>"),
            Target::Node(n) => write!(f, "{n:?}"),
        }
    }
}
