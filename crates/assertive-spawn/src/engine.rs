//! Spawn entry points and the exit monitor.
//!
//! A spawn has two phases. Launch is synchronous: either the launcher gives
//! us a process or the call fails right away with a Launch error. After that
//! an exit monitor task owns the process, serves control requests from the
//! handle, waits for termination and settles exactly once.

use crate::handle::{ControlRequest, ProcessHandle};
use crate::launcher::{LaunchedProcess, ProcessLauncher, TokioLauncher};
use crate::request::LaunchRequest;
use crate::settlement::{settle, Settlement};
use assertive_spawn_common::{
    normalize_failure, Phase, SpawnError, SpawnResult, TerminationOutcome,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

/// Spawns `request` with the tokio launcher.
///
/// Returns the process handle together with the pending settlement, or a
/// Launch error if the process could not be started. Must be called from
/// within a tokio runtime.
///
/// # Example
///
/// ```rust,no_run
/// use assertive_spawn::{spawn_assertively, LaunchRequest};
///
/// # async fn run() -> Result<(), assertive_spawn::SpawnError> {
/// let (handle, settlement) = spawn_assertively(&LaunchRequest::new("make").arg("test"))?;
/// println!("make running as {:?}", handle.id());
/// settlement.await?;
/// # Ok(())
/// # }
/// ```
pub fn spawn_assertively(request: &LaunchRequest) -> SpawnResult<(ProcessHandle, Settlement)> {
    spawn_assertively_with(&TokioLauncher, request)
}

/// Spawns `request` with an arbitrary launcher.
pub fn spawn_assertively_with<L: ProcessLauncher>(
    launcher: &L,
    request: &LaunchRequest,
) -> SpawnResult<(ProcessHandle, Settlement)> {
    let command = request.command.clone();

    let mut process = launcher
        .launch(request)
        .map_err(|failure| normalize_failure(Phase::Launch, &command, failure))?;

    let pid = process.id();
    let stdio = process.take_stdio();

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = watch::channel(None);
    let (settle_tx, settle_rx) = oneshot::channel();

    tokio::spawn(monitor_exit(
        command.clone(),
        process,
        control_rx,
        outcome_tx,
        settle_tx,
    ));

    let handle = ProcessHandle::new(command.clone(), pid, control_tx, outcome_rx, stdio);
    Ok((handle, Settlement::new(command, settle_rx)))
}

async fn monitor_exit<P: LaunchedProcess>(
    command: String,
    mut process: P,
    mut control: mpsc::UnboundedReceiver<ControlRequest>,
    outcome_tx: watch::Sender<Option<TerminationOutcome>>,
    settle_tx: oneshot::Sender<SpawnResult<()>>,
) {
    let pid = process.id();
    debug!("Exit monitor started for '{}' (PID: {:?})", command, pid);

    let mut control_open = true;
    let waited = loop {
        tokio::select! {
            result = process.wait() => break result,
            request = control.recv(), if control_open => match request {
                Some(request) => serve_control(&command, &mut process, request),
                None => control_open = false,
            },
        }
    };

    let result = match waited {
        Ok(outcome) => {
            debug!("'{}' (PID: {:?}) terminated: {:?}", command, pid, outcome);
            let result = settle(&command, &outcome);
            // Publish before settling so a settled caller always sees the outcome.
            outcome_tx.send_replace(Some(outcome));
            result
        }
        Err(failure) => {
            let error = normalize_failure(Phase::Monitoring, &command, failure);
            warn!("Failed to wait for '{}' (PID: {:?}): {}", command, pid, error);
            Err(error)
        }
    };

    if settle_tx.send(result).is_err() {
        debug!("Settlement for '{}' was dropped before completion", command);
    }
}

fn serve_control<P: LaunchedProcess>(command: &str, process: &mut P, request: ControlRequest) {
    match request {
        ControlRequest::Kill { reply } => {
            debug!("Killing '{}' (PID: {:?})", command, process.id());
            let result = process
                .start_kill()
                .map_err(|e| SpawnError::control(command, e.to_string()));
            let _ = reply.send(result);
        }
        #[cfg(unix)]
        ControlRequest::Signal { signal, reply } => {
            debug!("Sending {:?} to '{}' (PID: {:?})", signal, command, process.id());
            let result = process
                .signal(signal)
                .map_err(|e| SpawnError::control(command, e.to_string()));
            let _ = reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertive_spawn_common::{Failure, SpawnErrorKind};
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Launcher that hands out whatever its closure produces.
    struct ScriptedLauncher<F>(F);

    impl<F> ProcessLauncher for ScriptedLauncher<F>
    where
        F: Fn() -> Result<ScriptedProcess, Failure>,
    {
        type Process = ScriptedProcess;

        fn launch(&self, _request: &LaunchRequest) -> Result<ScriptedProcess, Failure> {
            (self.0)()
        }
    }

    /// Process that either reports a canned result or runs until killed.
    struct ScriptedProcess {
        result: Option<Result<TerminationOutcome, Failure>>,
        killed: Arc<Notify>,
    }

    impl ScriptedProcess {
        fn finishing_with(result: Result<TerminationOutcome, Failure>) -> Self {
            Self {
                result: Some(result),
                killed: Arc::new(Notify::new()),
            }
        }

        fn running() -> Self {
            Self {
                result: None,
                killed: Arc::new(Notify::new()),
            }
        }
    }

    #[async_trait]
    impl LaunchedProcess for ScriptedProcess {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        async fn wait(&mut self) -> Result<TerminationOutcome, Failure> {
            match self.result.take() {
                Some(result) => result,
                None => {
                    self.killed.notified().await;
                    Ok(TerminationOutcome::signaled("SIGKILL"))
                }
            }
        }

        fn start_kill(&mut self) -> io::Result<()> {
            self.killed.notify_one();
            Ok(())
        }

        #[cfg(unix)]
        fn signal(&mut self, _signal: nix::sys::signal::Signal) -> io::Result<()> {
            Err(io::Error::from_raw_os_error(nix::libc::EPERM))
        }
    }

    fn scripted<F>(launch: F) -> ScriptedLauncher<F>
    where
        F: Fn() -> Result<ScriptedProcess, Failure>,
    {
        ScriptedLauncher(launch)
    }

    fn request() -> LaunchRequest {
        LaunchRequest::new("scripted")
    }

    #[tokio::test]
    async fn test_launch_failure_is_synchronous_and_normalized() {
        let launcher = scripted(|| Err(Failure::from(io::Error::from(io::ErrorKind::NotFound))));
        let err = spawn_assertively_with(&launcher, &request()).unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::Launch);
        assert_eq!(err.error_code(), Some("ENOENT"));
        assert_eq!(err.command(), "scripted");
    }

    #[tokio::test]
    async fn test_launch_failure_shapes() {
        let absent = scripted(|| Err(Failure::Absent));
        let err = spawn_assertively_with(&absent, &request()).unwrap_err();
        assert_eq!(err.to_string(), "Spawning 'scripted' failed for an unknown reason.");

        let text = scripted(|| Err(Failure::from("quota exceeded")));
        let err = spawn_assertively_with(&text, &request()).unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::Launch);
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(err.error_code().is_none());

        let other = scripted(|| Err(Failure::other(7)));
        let err = spawn_assertively_with(&other, &request()).unwrap_err();
        assert_eq!(err.to_string(), "7");
    }

    #[tokio::test]
    async fn test_monitoring_failure_rejects_settlement() {
        let launcher = scripted(|| {
            Ok(ScriptedProcess::finishing_with(Err(Failure::from(io::Error::new(
                io::ErrorKind::Other,
                "waitpid failed",
            )))))
        });
        let (handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();

        let err = settlement.await.unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::Monitoring);
        assert_eq!(err.to_string(), "waitpid failed");
        assert!(err.io_source().is_some());
        assert!(handle.wait_for_exit().await.is_none());
    }

    #[tokio::test]
    async fn test_absent_monitoring_failure_names_command() {
        let launcher = scripted(|| Ok(ScriptedProcess::finishing_with(Err(Failure::Absent))));
        let (_handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();

        let err = settlement.await.unwrap_err();
        assert_eq!(err.to_string(), "Child process 'scripted' exited for an unknown reason.");
    }

    #[tokio::test]
    async fn test_ambiguous_outcome_resolves() {
        let ambiguous = TerminationOutcome {
            success: false,
            code: None,
            signal: None,
        };
        let launcher = scripted(move || Ok(ScriptedProcess::finishing_with(Ok(ambiguous.clone()))));
        let (handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();

        settlement.await.unwrap();
        assert_eq!(handle.outcome().map(|o| o.success), Some(false));
    }

    #[tokio::test]
    async fn test_kill_routes_through_monitor() {
        let launcher = scripted(|| Ok(ScriptedProcess::running()));
        let (handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();
        assert_eq!(handle.id(), Some(4242));
        assert!(!handle.has_exited());

        handle.kill().await.unwrap();

        let err = settlement.await.unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::Signal);
        assert_eq!(err.signal_name().map(|s| s.as_str()), Some("SIGKILL"));

        assert!(handle.has_exited());
        let err = handle.kill().await.unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::ProcessGone);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_signal_delivery_failure_is_reported() {
        let launcher = scripted(|| Ok(ScriptedProcess::running()));
        let (handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();

        let err = handle.terminate().await.unwrap_err();
        assert_eq!(err.kind(), SpawnErrorKind::Control);

        handle.kill().await.unwrap();
        assert!(settlement.await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_settlement_still_reaps() {
        let launcher = scripted(|| Ok(ScriptedProcess::finishing_with(Ok(TerminationOutcome::exited(3)))));
        let (handle, settlement) = spawn_assertively_with(&launcher, &request()).unwrap();
        drop(settlement);

        assert_eq!(handle.wait_for_exit().await, Some(TerminationOutcome::exited(3)));
    }
}
