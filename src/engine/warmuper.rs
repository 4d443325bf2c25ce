// src/engine/warmuper.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use crate::dag::{DependencyResolver, NodeKey, Registry, Target};
use crate::errors::WarmUpError;
use crate::stage::{CountingStageHandler, NoOpStageHandler, StageHandler, Stageable};

use super::default_parallelism;
use super::report::StageReport;
use super::task::{RunContext, TaskFailure, TaskHandle, TaskResult, WarmUpTask};

/// How long `stage_blocking` lets a dedicated pool wind down after a run.
const POOL_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Orchestrates warm-up runs over a dependency graph.
///
/// Collaborators call [`register_type`](Self::register_type) while objects are
/// being built. Each call to one of the `stage*` methods drains everything
/// registered so far and runs it, dependencies first, bounded by
/// [`max_wait`](Self::max_wait).
pub struct WarmUper<N> {
    registry: Registry<N>,
    resolver: Arc<dyn DependencyResolver<N>>,
    parallelism: usize,
    max_wait: RwLock<Option<Duration>>,
}

enum RunOutcome {
    Finished(Result<TaskResult, Elapsed>),
    Interrupted,
}

impl<N: NodeKey> WarmUper<N> {
    pub fn new(resolver: impl DependencyResolver<N> + 'static) -> Self {
        Self::with_resolver(Arc::new(resolver))
    }

    pub fn with_resolver(resolver: Arc<dyn DependencyResolver<N>>) -> Self {
        Self {
            registry: Registry::new(),
            resolver,
            parallelism: default_parallelism(),
            max_wait: RwLock::new(None),
        }
    }

    /// Cap the number of stageables executing at once (minimum 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_max_wait(self, max_wait: Duration) -> Self {
        self.set_max_wait(Some(max_wait));
        self
    }

    /// Deadline for subsequent runs; `None` waits indefinitely.
    pub fn set_max_wait(&self, max_wait: Option<Duration>) {
        *self.max_wait.write() = max_wait;
    }

    pub fn max_wait(&self) -> Option<Duration> {
        *self.max_wait.read()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Number of nodes waiting for the next run.
    pub fn pending_nodes(&self) -> usize {
        self.registry.len()
    }

    /// Register `stageable` as terminal work for `node`.
    pub fn register_type(&self, node: N, stageable: Arc<dyn Stageable>) {
        let subject = stageable.subject().to_string();
        if self.registry.insert(node.clone(), stageable) {
            debug!(node = ?node, subject = %subject, "registered stageable");
        } else {
            debug!(node = ?node, subject = %subject, "stageable already registered; ignoring");
        }
    }

    /// Accepted for parity with stagers that need no node identity; graph
    /// scheduling cannot place a stageable without one, so this does nothing.
    pub fn register(&self, stageable: Arc<dyn Stageable>) {
        debug!(
            subject = %stageable.subject(),
            "register() without a node is ignored; use register_type()"
        );
    }

    /// Run everything registered so far, discarding outcomes.
    pub async fn stage(&self) -> Result<StageReport, WarmUpError> {
        self.stage_with(Arc::new(NoOpStageHandler)).await
    }

    /// Run everything registered so far, reporting outcomes to `handler`.
    pub async fn stage_with(
        &self,
        handler: Arc<dyn StageHandler>,
    ) -> Result<StageReport, WarmUpError> {
        self.stage_until(handler, std::future::pending()).await
    }

    /// Like [`stage_with`](Self::stage_with), but gives up waiting as soon as
    /// `interrupt` resolves.
    ///
    /// An interrupt cancels outstanding work and returns `Ok` with
    /// [`StageReport::interrupted`] set; only deadline exhaustion produces
    /// [`WarmUpError::Timeout`]. Dropping the returned future cancels the run
    /// as well.
    pub async fn stage_until<I>(
        &self,
        handler: Arc<dyn StageHandler>,
        interrupt: I,
    ) -> Result<StageReport, WarmUpError>
    where
        I: Future<Output = ()>,
    {
        let started = Instant::now();
        let snapshot = self.registry.take_snapshot();
        let nodes_registered = snapshot.node_count();
        let stageables_registered = snapshot.stageable_count();
        let max_wait = self.max_wait();

        info!(
            nodes = nodes_registered,
            stageables = stageables_registered,
            parallelism = self.parallelism,
            ?max_wait,
            "starting warm-up run"
        );

        let counting = Arc::new(CountingStageHandler::new(handler));
        let ctx = Arc::new(RunContext::new(
            Arc::clone(&counting),
            snapshot,
            Arc::clone(&self.resolver),
            self.parallelism,
        ));
        let _cancel_on_drop = ctx.cancel.clone().drop_guard();

        let root = WarmUpTask::new(Arc::clone(&ctx), Target::Root).spawn();

        let outcome = tokio::select! {
            biased;
            finished = wait_for_root(root, max_wait) => RunOutcome::Finished(finished),
            _ = interrupt => RunOutcome::Interrupted,
        };

        let report = |interrupted: bool| StageReport {
            nodes_registered,
            nodes_visited: ctx.nodes_visited(),
            stageables_registered,
            stageables_run: ctx.stageables_run.load(Ordering::Acquire),
            succeeded: counting.succeeded(),
            failed: counting.failed(),
            interrupted,
            elapsed: started.elapsed(),
        };

        match outcome {
            RunOutcome::Finished(Ok(result)) => {
                if let Some(err) = ctx.take_fatal() {
                    warn!(error = %err, "warm-up run aborted");
                    return Err(err);
                }
                match result {
                    Ok(()) => {
                        let report = report(false);
                        info!(%report, "warm-up run finished");
                        Ok(report)
                    }
                    Err(TaskFailure::Cancelled) => {
                        Err(WarmUpError::RootTask("cancelled".to_string()))
                    }
                    Err(TaskFailure::Panicked(msg)) => Err(WarmUpError::RootTask(msg)),
                }
            }
            RunOutcome::Finished(Err(elapsed)) => {
                ctx.cancel.cancel();
                let waited = max_wait.unwrap_or_default();
                warn!(
                    ?waited,
                    completed = counting.succeeded() + counting.failed(),
                    registered = stageables_registered,
                    "warm-up deadline exceeded; cancelling outstanding work"
                );
                Err(WarmUpError::Timeout {
                    waited,
                    source: elapsed,
                })
            }
            RunOutcome::Interrupted => {
                ctx.cancel.cancel();
                let report = report(true);
                warn!(%report, "warm-up wait interrupted; cancelling outstanding work");
                Ok(report)
            }
        }
    }

    /// Synchronous entry point running the warm-up on a dedicated worker pool
    /// of [`parallelism`](Self::parallelism) threads.
    ///
    /// Returns [`WarmUpError::InsideRuntime`] when called from inside a Tokio
    /// runtime, where blocking on the pool would panic.
    pub fn stage_blocking(
        &self,
        handler: Arc<dyn StageHandler>,
    ) -> Result<StageReport, WarmUpError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(WarmUpError::InsideRuntime);
        }

        let pool = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.parallelism)
            .thread_name("warmdag-worker")
            .enable_all()
            .build()
            .map_err(WarmUpError::WorkerPool)?;

        let result = pool.block_on(self.stage_with(handler));
        pool.shutdown_timeout(POOL_SHUTDOWN_GRACE);
        result
    }
}

impl<N> fmt::Debug for WarmUper<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmUper")
            .field("parallelism", &self.parallelism)
            .field("max_wait", &*self.max_wait.read())
            .finish_non_exhaustive()
    }
}

async fn wait_for_root(
    root: TaskHandle,
    max_wait: Option<Duration>,
) -> Result<TaskResult, Elapsed> {
    match max_wait {
        Some(limit) => tokio::time::timeout(limit, root).await,
        None => Ok(root.await),
    }
}
