// src/dag/registry.rs

//! Registration map: which stageables belong to which node.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::NodeKey;
use crate::stage::Stageable;

type Bucket = Vec<Arc<dyn Stageable>>;

/// Concurrent `node -> stageables` map, filled while the object graph is
/// built and drained once per warm-up run.
///
/// Buckets behave as identity sets: the same `Arc` registered twice under
/// one node is kept once.
pub struct Registry<N> {
    buckets: Mutex<HashMap<N, Bucket>>,
}

impl<N: NodeKey> Registry<N> {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Add `stageable` to `node`'s bucket, creating the bucket if needed.
    ///
    /// Returns `false` if this exact stageable was already registered there.
    pub fn insert(&self, node: N, stageable: Arc<dyn Stageable>) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(node).or_default();
        if bucket.iter().any(|s| same_stageable(s, &stageable)) {
            return false;
        }
        bucket.push(stageable);
        true
    }

    /// Swap the whole map out for an empty one.
    ///
    /// Registrations made after this returns land in the fresh map and wait
    /// for the next run.
    pub fn take_snapshot(&self) -> Snapshot<N> {
        let buckets = std::mem::take(&mut *self.buckets.lock());
        Snapshot { buckets }
    }

    /// Number of nodes with at least one registration.
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

impl<N: NodeKey> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only registrations captured at the start of a run.
pub struct Snapshot<N> {
    buckets: HashMap<N, Bucket>,
}

impl<N: NodeKey> Snapshot<N> {
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.buckets.keys()
    }

    pub fn stageables_for(&self, node: &N) -> &[Arc<dyn Stageable>] {
        self.buckets.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn stageable_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Identity comparison on the data pointer only; vtable pointers for the same
/// concrete type may differ between codegen units.
fn same_stageable(a: &Arc<dyn Stageable>, b: &Arc<dyn Stageable>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageFuture, StageHandler};
    use tokio_util::sync::CancellationToken;

    struct Named(&'static str);

    impl Stageable for Named {
        fn subject(&self) -> &str {
            self.0
        }

        fn stage<'a>(
            &'a self,
            handler: &'a dyn StageHandler,
            _cancel: CancellationToken,
        ) -> StageFuture<'a> {
            Box::pin(async move { handler.on_success(self.0) })
        }
    }

    #[test]
    fn insert_is_identity_deduplicated() {
        let registry = Registry::new();
        let a: Arc<dyn Stageable> = Arc::new(Named("a"));
        let twin: Arc<dyn Stageable> = Arc::new(Named("a"));

        assert!(registry.insert("n", Arc::clone(&a)));
        assert!(!registry.insert("n", Arc::clone(&a)));
        assert!(registry.insert("n", twin));
        assert!(registry.insert("m", a));

        let snapshot = registry.take_snapshot();
        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.stageables_for(&"n").len(), 2);
        assert_eq!(snapshot.stageable_count(), 3);
    }

    #[test]
    fn snapshot_leaves_registry_empty() {
        let registry = Registry::new();
        registry.insert(7, Arc::new(Named("x")) as Arc<dyn Stageable>);

        let snapshot = registry.take_snapshot();
        assert!(registry.is_empty());
        assert!(!snapshot.is_empty());
        assert!(snapshot.stageables_for(&8).is_empty());
    }
}
