// src/engine/task.rs

//! The per-node scheduling unit of a warm-up run.
//!
//! A [`WarmUpTask`] is bound to one [`Target`]. Running it:
//!
//! 1. discovers the target's dependencies (for the root: every registered
//!    node),
//! 2. forks one task per dependency, reusing any task another parent already
//!    started for the same node,
//! 3. waits for all of those children,
//! 4. stages every stageable registered for its own node.
//!
//! Waiting happens on shared futures rather than on worker threads, so deep
//! chains never pin a worker while their children run.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::dag::{DependencyResolver, NodeKey, Snapshot, Target, WaitGraph};
use crate::errors::WarmUpError;
use crate::stage::{
    CountingStageHandler, OnceStageHandler, StageError, StageHandler, Stageable, panic_message,
};

/// Why a task stopped without finishing its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The run was cancelled before or while this task ran.
    Cancelled,
    /// The task itself panicked outside any stageable.
    Panicked(String),
}

pub type TaskResult = Result<(), TaskFailure>;

/// Awaitable, cloneable handle to a forked task.
pub type TaskHandle = Shared<BoxFuture<'static, TaskResult>>;

/// State shared by every task of one run.
pub(crate) struct RunContext<N> {
    pub(crate) handler: Arc<CountingStageHandler>,
    pub(crate) snapshot: Snapshot<N>,
    pub(crate) resolver: Arc<dyn DependencyResolver<N>>,
    /// Insert-if-absent guard against scheduling one node twice.
    pub(crate) in_progress: Mutex<HashMap<N, TaskHandle>>,
    pub(crate) wait_graph: WaitGraph<N>,
    /// Bounds how many stageables execute at once.
    pub(crate) permits: Semaphore,
    pub(crate) cancel: CancellationToken,
    pub(crate) stageables_run: AtomicUsize,
    fatal: Mutex<Option<WarmUpError>>,
}

impl<N: NodeKey> RunContext<N> {
    pub(crate) fn new(
        handler: Arc<CountingStageHandler>,
        snapshot: Snapshot<N>,
        resolver: Arc<dyn DependencyResolver<N>>,
        parallelism: usize,
    ) -> Self {
        Self {
            handler,
            snapshot,
            resolver,
            in_progress: Mutex::new(HashMap::new()),
            wait_graph: WaitGraph::new(),
            permits: Semaphore::new(parallelism.max(1)),
            cancel: CancellationToken::new(),
            stageables_run: AtomicUsize::new(0),
            fatal: Mutex::new(None),
        }
    }

    /// Record a fatal error (first one wins) and cancel the run.
    pub(crate) fn abort_with(&self, err: WarmUpError) {
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
        self.cancel.cancel();
    }

    pub(crate) fn take_fatal(&self) -> Option<WarmUpError> {
        self.fatal.lock().take()
    }

    pub(crate) fn nodes_visited(&self) -> usize {
        self.in_progress.lock().len()
    }

    /// Return the task owning `node`, starting one if nobody has yet.
    fn fork(self: &Arc<Self>, node: N) -> TaskHandle {
        let mut in_progress = self.in_progress.lock();
        match in_progress.entry(node) {
            Entry::Occupied(existing) => {
                trace!(node = ?existing.key(), "reusing in-flight warm-up task");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let task = WarmUpTask::new(Arc::clone(self), Target::Node(slot.key().clone()));
                let handle = task.spawn();
                slot.insert(handle.clone());
                handle
            }
        }
    }
}

/// One node's (or the root's) share of a warm-up run.
pub struct WarmUpTask<N> {
    ctx: Arc<RunContext<N>>,
    target: Target<N>,
}

impl<N: NodeKey> WarmUpTask<N> {
    pub(crate) fn new(ctx: Arc<RunContext<N>>, target: Target<N>) -> Self {
        Self { ctx, target }
    }

    /// Schedule this task on the runtime and return a handle others can join.
    pub(crate) fn spawn(self) -> TaskHandle {
        let join = tokio::spawn(self.compute());
        async move {
            match join.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => {
                    Err(TaskFailure::Panicked(panic_message(err.into_panic().as_ref())))
                }
                Err(_) => Err(TaskFailure::Cancelled),
            }
        }
        .boxed()
        .shared()
    }

    fn compute(self) -> BoxFuture<'static, TaskResult> {
        async move {
            if self.ctx.cancel.is_cancelled() {
                return Err(TaskFailure::Cancelled);
            }

            let deps = match &self.target {
                Target::Root => self.ctx.snapshot.nodes().cloned().collect(),
                Target::Node(node) => self.discover(node),
            };

            let children: Vec<TaskHandle> = deps
                .iter()
                .map(|dep| self.ctx.fork(dep.clone()))
                .collect();

            if let Some(node) = self.target.node() {
                // Finished children can no longer be part of a cycle.
                let pending: Vec<N> = deps
                    .iter()
                    .zip(children.iter())
                    .filter(|(_, handle)| handle.peek().is_none())
                    .map(|(dep, _)| dep.clone())
                    .collect();
                if let Err(cycle) = self.ctx.wait_graph.add_waits(node, &pending) {
                    let cycle: Vec<String> = cycle.iter().map(|n| format!("{n:?}")).collect();
                    warn!(node = ?node, ?cycle, "dependency cycle detected; aborting warm-up run");
                    self.ctx.abort_with(WarmUpError::DependencyCycle { cycle });
                    return Err(TaskFailure::Cancelled);
                }
            }

            let joined = self.join_children(children).await;
            if let Some(node) = self.target.node() {
                self.ctx.wait_graph.release(node);
            }
            joined?;

            if let Some(node) = self.target.node() {
                self.stage_node(node).await?;
            }

            Ok(())
        }
        .boxed()
    }

    /// Direct dependencies of `node`; any resolver failure means "none".
    fn discover(&self, node: &N) -> Vec<N> {
        let resolver = &self.ctx.resolver;
        match std::panic::catch_unwind(AssertUnwindSafe(|| resolver.dependencies_of(node))) {
            Ok(Ok(mut deps)) => {
                dedup_preserving_order(&mut deps);
                debug!(node = ?node, deps = deps.len(), "resolved warm-up dependencies");
                deps
            }
            Ok(Err(err)) => {
                debug!(node = ?node, error = %err, "dependency discovery failed; treating as leaf");
                Vec::new()
            }
            Err(payload) => {
                debug!(
                    node = ?node,
                    panic = %panic_message(payload.as_ref()),
                    "dependency resolver panicked; treating as leaf"
                );
                Vec::new()
            }
        }
    }

    async fn join_children(&self, children: Vec<TaskHandle>) -> TaskResult {
        if children.is_empty() {
            return Ok(());
        }

        let results = tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => return Err(TaskFailure::Cancelled),
            results = join_all(children) => results,
        };

        for result in results {
            match result {
                Ok(()) => {}
                Err(TaskFailure::Cancelled) => return Err(TaskFailure::Cancelled),
                Err(TaskFailure::Panicked(msg)) => {
                    warn!(target_node = %self.target, panic = %msg, "dependency task panicked; continuing");
                }
            }
        }

        Ok(())
    }

    async fn stage_node(&self, node: &N) -> TaskResult {
        let stageables = self.ctx.snapshot.stageables_for(node);
        if stageables.is_empty() {
            trace!(node = ?node, "no stageables registered; dependency link only");
            return Ok(());
        }

        debug!(node = ?node, count = stageables.len(), "dependencies done; staging node");
        join_all(stageables.iter().map(|s| self.stage_one(node, s.as_ref()))).await;

        if self.ctx.cancel.is_cancelled() {
            return Err(TaskFailure::Cancelled);
        }
        Ok(())
    }

    async fn stage_one(&self, node: &N, stageable: &dyn Stageable) {
        let _permit = tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => {
                debug!(node = ?node, subject = %stageable.subject(), "run cancelled; not starting stageable");
                return;
            }
            permit = self.ctx.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        self.ctx.stageables_run.fetch_add(1, Ordering::AcqRel);
        let handler = OnceStageHandler::new(self.ctx.handler.as_ref());
        let staged = stageable.stage(&handler, self.ctx.cancel.child_token());

        if let Err(payload) = AssertUnwindSafe(staged).catch_unwind().await {
            let msg = panic_message(payload.as_ref());
            warn!(node = ?node, subject = %stageable.subject(), panic = %msg, "stageable panicked");
            handler.on_error(stageable.subject(), &StageError::Panicked(msg));
        }
        if !handler.reported() {
            warn!(node = ?node, subject = %stageable.subject(), "stageable finished without reporting an outcome");
        }
    }
}

/// Self edges survive so the wait graph reports them as a cycle.
fn dedup_preserving_order<N: NodeKey>(deps: &mut Vec<N>) {
    let mut seen = std::collections::HashSet::with_capacity(deps.len());
    deps.retain(|d| seen.insert(d.clone()));
}
