// src/dag/wait_graph.rs

//! "Who waits on whom" bookkeeping for one warm-up run.
//!
//! Every task records its outgoing wait edges here right before it blocks on
//! its children, and drops its node once those children are joined. The graph
//! therefore only holds tasks that are still waiting. All inserts happen under
//! one lock, so whichever task closes a cycle last is guaranteed to see it.

use std::collections::HashMap;

use parking_lot::Mutex;
use petgraph::Direction;
use petgraph::algo::astar;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;

use super::NodeKey;

pub struct WaitGraph<N> {
    inner: Mutex<Inner<N>>,
}

struct Inner<N> {
    graph: StableDiGraph<N, ()>,
    index: HashMap<N, NodeIndex>,
}

impl<N: NodeKey> Inner<N> {
    fn index_of(&mut self, node: &N) -> NodeIndex {
        if let Some(idx) = self.index.get(node) {
            return *idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node.clone(), idx);
        idx
    }

    fn is_waiting(&self, idx: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .next()
            .is_some()
    }

    /// Path from one of `seeds` back to `goal`, or `None`.
    fn path_to(&self, seeds: &[NodeIndex], goal: NodeIndex) -> Option<Vec<NodeIndex>> {
        let mut dfs = Dfs::empty(&self.graph);
        dfs.stack.extend_from_slice(seeds);
        let mut reached = false;
        while let Some(n) = dfs.next(&self.graph) {
            if n == goal {
                reached = true;
                break;
            }
        }
        if !reached {
            return None;
        }

        seeds.iter().find_map(|&s| {
            astar(&self.graph, s, |n| n == goal, |_| 1usize, |_| 0usize).map(|(_, path)| path)
        })
    }
}

impl<N: NodeKey> WaitGraph<N> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                graph: StableDiGraph::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Record that `waiter` is about to wait on every node in `children`.
    ///
    /// Returns the offending cycle, starting and ending at `waiter`, if any
    /// new edge closes one. Only children that are themselves waiting can
    /// lead back to `waiter`, so the walk is seeded from those alone.
    pub fn add_waits(&self, waiter: &N, children: &[N]) -> Result<(), Vec<N>> {
        let mut inner = self.inner.lock();
        let w = inner.index_of(waiter);

        let mut seeds = Vec::new();
        for child in children {
            let c = inner.index_of(child);
            inner.graph.update_edge(w, c, ());
            if inner.is_waiting(c) {
                seeds.push(c);
            }
        }
        if seeds.is_empty() {
            return Ok(());
        }

        match inner.path_to(&seeds, w) {
            Some(path) => {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(waiter.clone());
                cycle.extend(path.into_iter().map(|idx| inner.graph[idx].clone()));
                Err(cycle)
            }
            None => Ok(()),
        }
    }

    /// `node` stopped waiting; forget it and every edge touching it.
    pub fn release(&self, node: &N) {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.index.remove(node) {
            inner.graph.remove_node(idx);
        }
    }

    /// Number of nodes currently tracked.
    pub fn node_count(&self) -> usize {
        self.inner.lock().graph.node_count()
    }
}

impl<N: NodeKey> Default for WaitGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}
