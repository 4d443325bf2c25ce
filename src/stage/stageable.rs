// src/stage/stageable.rs

//! The `Stageable` contract and closure-backed implementations.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{StageError, StageHandler, panic_message};

/// Boxed future returned by [`Stageable::stage`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// One unit of terminal warm-up work bound to a node.
///
/// `stage` must report exactly one outcome to `handler` and must not let a
/// failure escape. `cancel` fires when the run is torn down (deadline,
/// interrupt, cycle); implementations should stop promptly and report
/// [`StageError::Interrupted`].
pub trait Stageable: Send + Sync {
    /// Human-readable identity passed to the handler.
    fn subject(&self) -> &str;

    fn stage<'a>(
        &'a self,
        handler: &'a dyn StageHandler,
        cancel: CancellationToken,
    ) -> StageFuture<'a>;
}

/// Adapts an async closure into a [`Stageable`].
///
/// The action is raced against the cancellation token; if the token wins, the
/// action future is dropped and `Interrupted` is reported.
pub struct FnStageable<F> {
    subject: String,
    action: F,
}

impl<F, Fut> FnStageable<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(subject: impl Into<String>, action: F) -> Self {
        Self {
            subject: subject.into(),
            action,
        }
    }
}

impl<F, Fut> Stageable for FnStageable<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn subject(&self) -> &str {
        &self.subject
    }

    fn stage<'a>(
        &'a self,
        handler: &'a dyn StageHandler,
        cancel: CancellationToken,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            let action = (self.action)(cancel.clone());

            tokio::select! {
                biased;

                result = action => match result {
                    Ok(()) => handler.on_success(&self.subject),
                    Err(err) => handler.on_error(&self.subject, &StageError::Failed(err)),
                },

                _ = cancel.cancelled() => {
                    debug!(subject = %self.subject, "warm-up action dropped on cancellation");
                    handler.on_error(&self.subject, &StageError::Interrupted);
                }
            }
        })
    }
}

/// Adapts a synchronous closure into a [`Stageable`] run on Tokio's blocking
/// pool.
///
/// The closure receives the cancellation token and is expected to poll it.
/// An `Err` returned once the token has fired is reported as `Interrupted`.
pub struct BlockingStageable<F> {
    subject: String,
    action: Arc<F>,
}

impl<F> BlockingStageable<F>
where
    F: Fn(&CancellationToken) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(subject: impl Into<String>, action: F) -> Self {
        Self {
            subject: subject.into(),
            action: Arc::new(action),
        }
    }
}

impl<F> Stageable for BlockingStageable<F>
where
    F: Fn(&CancellationToken) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn subject(&self) -> &str {
        &self.subject
    }

    fn stage<'a>(
        &'a self,
        handler: &'a dyn StageHandler,
        cancel: CancellationToken,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            let action = Arc::clone(&self.action);
            let token = cancel.clone();
            let joined = tokio::task::spawn_blocking(move || action(&token)).await;

            match joined {
                Ok(Ok(())) => handler.on_success(&self.subject),
                Ok(Err(_)) if cancel.is_cancelled() => {
                    handler.on_error(&self.subject, &StageError::Interrupted)
                }
                Ok(Err(err)) => handler.on_error(&self.subject, &StageError::Failed(err)),
                Err(join_err) if join_err.is_panic() => {
                    let msg = panic_message(join_err.into_panic().as_ref());
                    handler.on_error(&self.subject, &StageError::Panicked(msg));
                }
                Err(_) => handler.on_error(&self.subject, &StageError::Interrupted),
            }
        })
    }
}
