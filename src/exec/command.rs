// src/exec/command.rs

//! Shell command stageable.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::stage::{StageError, StageFuture, StageHandler, Stageable};

/// Runs one shell command as the warm-up work of a node.
///
/// - exit status 0 reports success, anything else reports `Failed`
/// - cancellation kills the child and reports `Interrupted`
#[derive(Debug, Clone)]
pub struct CommandStageable {
    subject: String,
    node: String,
    cmd: String,
}

impl CommandStageable {
    pub fn new(node: impl Into<String>, cmd: impl Into<String>) -> Self {
        let node = node.into();
        let cmd = cmd.into();
        Self {
            subject: format!("{node}: {cmd}"),
            node,
            cmd,
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn shell_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// `Ok(None)` means the process was killed on cancellation.
    async fn run(&self, cancel: &CancellationToken) -> Result<Option<ExitStatus>> {
        info!(node = %self.node, cmd = %self.cmd, "starting warm-up command");

        let mut child = self
            .shell_command()
            .spawn()
            .with_context(|| format!("spawning warm-up command for node '{}'", self.node))?;

        if let Some(stdout) = child.stdout.take() {
            drain_lines(self.node.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(self.node.clone(), "stderr", stderr);
        }

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| {
                    format!("waiting for warm-up command of node '{}'", self.node)
                })?;
                info!(
                    node = %self.node,
                    exit_code = status.code().unwrap_or(-1),
                    success = status.success(),
                    "warm-up command exited"
                );
                Ok(Some(status))
            }

            _ = cancel.cancelled() => {
                info!(node = %self.node, cmd = %self.cmd, "warm-up cancelled; killing process");
                if let Err(e) = child.kill().await {
                    warn!(node = %self.node, error = %e, "failed to kill warm-up process");
                }
                Ok(None)
            }
        }
    }
}

impl Stageable for CommandStageable {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn stage<'a>(
        &'a self,
        handler: &'a dyn StageHandler,
        cancel: CancellationToken,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            match self.run(&cancel).await {
                Ok(Some(status)) if status.success() => handler.on_success(&self.subject),
                Ok(Some(status)) => {
                    let code = status.code().unwrap_or(-1);
                    let err = anyhow!("command `{}` exited with status {}", self.cmd, code);
                    handler.on_error(&self.subject, &StageError::Failed(err));
                }
                Ok(None) => handler.on_error(&self.subject, &StageError::Interrupted),
                Err(err) => handler.on_error(&self.subject, &StageError::Failed(err)),
            }
        })
    }
}

/// Consume a child pipe so its buffer never fills; lines go to debug logs.
fn drain_lines<R>(node: String, stream: &'static str, pipe: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(node = %node, stream, "{}", line);
        }
    });
}
