//! Settlement of a spawned process.
//!
//! [`settle`] decides, from a termination outcome, whether the operation
//! succeeded. [`Settlement`] is the deferred side of a spawn: it completes
//! exactly once with that decision, or with a monitoring error if the outcome
//! could not be observed.

use assertive_spawn_common::{
    normalize_failure, Failure, Phase, SpawnError, SpawnResult, TerminationOutcome,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Classifies a termination outcome.
///
/// Evaluated in order:
/// 1. success flag set, or exit code 0: `Ok`
/// 2. terminating signal present: [`SpawnError::Signal`]
/// 3. non-zero exit code: [`SpawnError::ExitCode`]
/// 4. anything else: `Ok`
///
/// The last rule keeps an outcome the launcher could not describe from
/// rejecting (or hanging); it is a fallback, not a success guarantee.
pub fn settle(command: &str, outcome: &TerminationOutcome) -> SpawnResult<()> {
    if outcome.success || outcome.code == Some(0) {
        return Ok(());
    }

    if let Some(signal) = &outcome.signal {
        return Err(SpawnError::signal(command, signal.clone(), outcome.code));
    }

    if let Some(code) = outcome.code {
        return Err(SpawnError::exit_code(command, code, outcome.signal.clone()));
    }

    Ok(())
}

/// Deferred result of a spawn.
///
/// Resolves to `Ok(())` when the process succeeded and to a Signal, ExitCode
/// or Monitoring error otherwise. The process is monitored from the moment it
/// is launched, so dropping a `Settlement` does not leave a zombie behind.
#[must_use = "a settlement does nothing to the process; await it to learn how the process ended"]
#[derive(Debug)]
pub struct Settlement {
    command: String,
    receiver: oneshot::Receiver<SpawnResult<()>>,
}

impl Settlement {
    pub(crate) fn new(command: String, receiver: oneshot::Receiver<SpawnResult<()>>) -> Self {
        Self { command, receiver }
    }

    /// Command this settlement belongs to.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Future for Settlement {
    type Output = SpawnResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The monitor task went away without reporting (runtime shutdown or panic).
            Poll::Ready(Err(_)) => Poll::Ready(Err(normalize_failure(
                Phase::Monitoring,
                &this.command,
                Failure::Absent,
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
