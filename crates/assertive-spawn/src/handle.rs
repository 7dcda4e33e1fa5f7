//! Caller-side handle to a spawned process.

use crate::launcher::ChildStdio;
use assertive_spawn_common::{SpawnError, SpawnResult, TerminationOutcome};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot, watch};

/// Control request routed to the task that owns the OS child.
#[derive(Debug)]
pub(crate) enum ControlRequest {
    Kill {
        reply: oneshot::Sender<SpawnResult<()>>,
    },
    #[cfg(unix)]
    Signal {
        signal: nix::sys::signal::Signal,
        reply: oneshot::Sender<SpawnResult<()>>,
    },
}

/// Handle to a spawned process, available before its settlement.
///
/// Termination requests are delivered by the task that monitors the process,
/// so they can never reach a pid that has already been reaped and recycled.
/// Once the process is gone they fail with [`SpawnError::ProcessGone`].
#[derive(Debug)]
pub struct ProcessHandle {
    command: String,
    pid: Option<u32>,
    control: mpsc::UnboundedSender<ControlRequest>,
    outcome: watch::Receiver<Option<TerminationOutcome>>,
    stdio: ChildStdio,
}

impl ProcessHandle {
    pub(crate) fn new(
        command: String,
        pid: Option<u32>,
        control: mpsc::UnboundedSender<ControlRequest>,
        outcome: watch::Receiver<Option<TerminationOutcome>>,
        stdio: ChildStdio,
    ) -> Self {
        Self {
            command,
            pid,
            control,
            outcome,
            stdio,
        }
    }

    /// OS process id assigned at launch.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Forcefully terminates the process (SIGKILL on Unix).
    pub async fn kill(&self) -> SpawnResult<()> {
        self.request(|reply| ControlRequest::Kill { reply }).await
    }

    /// Asks the process to terminate: SIGTERM on Unix, a forced kill elsewhere.
    pub async fn terminate(&self) -> SpawnResult<()> {
        #[cfg(unix)]
        {
            self.signal(nix::sys::signal::Signal::SIGTERM).await
        }

        #[cfg(not(unix))]
        {
            self.kill().await
        }
    }

    /// Sends an arbitrary signal to the process.
    #[cfg(unix)]
    pub async fn signal(&self, signal: nix::sys::signal::Signal) -> SpawnResult<()> {
        self.request(|reply| ControlRequest::Signal { signal, reply })
            .await
    }

    /// Whether the termination outcome is known yet.
    pub fn has_exited(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Termination outcome, once the process has ended.
    pub fn outcome(&self) -> Option<TerminationOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits until the termination outcome is known.
    ///
    /// Returns `None` if monitoring failed before an outcome was produced.
    /// Unlike the settlement, this can be awaited any number of times.
    pub async fn wait_for_exit(&self) -> Option<TerminationOutcome> {
        let mut outcome = self.outcome.clone();
        let result = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|current| current.clone());
        result
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdio.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdio.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stdio.stderr.take()
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<SpawnResult<()>>) -> ControlRequest,
    ) -> SpawnResult<()> {
        if self.has_exited() {
            return Err(SpawnError::process_gone(&self.command));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(make(reply_tx))
            .map_err(|_| SpawnError::process_gone(&self.command))?;

        reply_rx
            .await
            .map_err(|_| SpawnError::process_gone(&self.command))?
    }
}
