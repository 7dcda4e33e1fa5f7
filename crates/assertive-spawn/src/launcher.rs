//! The process launcher seam.
//!
//! The engine never creates processes itself. It asks a [`ProcessLauncher`]
//! for a [`LaunchedProcess`] and then only waits on it and forwards control
//! requests. [`TokioLauncher`] is the production implementation on top of
//! `tokio::process`.

use crate::request::LaunchRequest;
use assertive_spawn_common::{Failure, TerminationOutcome};
use async_trait::async_trait;
use std::io;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// Piped standard streams of a launched process.
#[derive(Debug, Default)]
pub struct ChildStdio {
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

/// A live process produced by a launcher.
#[async_trait]
pub trait LaunchedProcess: Send + 'static {
    /// OS process id, while the process has not been reaped.
    fn id(&self) -> Option<u32>;

    /// Hands out the piped streams. Called once, right after launch.
    fn take_stdio(&mut self) -> ChildStdio {
        ChildStdio::default()
    }

    /// Waits for the process to terminate.
    ///
    /// Must be cancel safe: the monitor drops a pending wait to serve a
    /// control request and then calls `wait` again.
    async fn wait(&mut self) -> Result<TerminationOutcome, Failure>;

    /// Requests forced termination without waiting for it.
    fn start_kill(&mut self) -> io::Result<()>;

    /// Sends `signal` to the process.
    #[cfg(unix)]
    fn signal(&mut self, signal: nix::sys::signal::Signal) -> io::Result<()> {
        use nix::unistd::Pid;

        let pid = self
            .id()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "process has no pid"))?;
        nix::sys::signal::kill(Pid::from_raw(pid as i32), signal).map_err(io::Error::from)
    }
}

/// Something that can start processes.
pub trait ProcessLauncher {
    type Process: LaunchedProcess;

    /// Starts the process described by `request`. Never suspends.
    fn launch(&self, request: &LaunchRequest) -> Result<Self::Process, Failure>;
}

/// Launcher backed by `tokio::process`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    type Process = TokioProcess;

    fn launch(&self, request: &LaunchRequest) -> Result<TokioProcess, Failure> {
        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args);

        if let Some(ref wd) = request.working_directory {
            cmd.current_dir(wd);
        }

        if request.clear_env {
            cmd.env_clear();
        }

        for (key, value) in &request.environment {
            cmd.env(key, value);
        }

        cmd.stdin(request.stdin)
            .stdout(request.stdout)
            .stderr(request.stderr);

        let child = cmd.spawn()?;
        debug!(
            "Launched '{}' (PID: {:?}) with args {:?}",
            request.command,
            child.id(),
            request.args
        );

        Ok(TokioProcess { child })
    }
}

/// A process started by [`TokioLauncher`].
#[derive(Debug)]
pub struct TokioProcess {
    child: Child,
}

#[async_trait]
impl LaunchedProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdio(&mut self) -> ChildStdio {
        ChildStdio {
            stdin: self.child.stdin.take(),
            stdout: self.child.stdout.take(),
            stderr: self.child.stderr.take(),
        }
    }

    async fn wait(&mut self) -> Result<TerminationOutcome, Failure> {
        let status = self.child.wait().await?;
        Ok(TerminationOutcome::from(status))
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}
