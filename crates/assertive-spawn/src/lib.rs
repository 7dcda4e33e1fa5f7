//! # Assertive Spawn
//!
//! Launch a process and get back two things:
//! - a [`ProcessHandle`], immediately, for acting on the running process
//! - a [`Settlement`], a future that completes once the process terminates
//!
//! The settlement resolves only when the process succeeded. It rejects with a
//! [`SpawnError`] naming how it failed: terminated by a signal, or exited with
//! a non-zero code. A process that cannot be started at all fails the spawn
//! call itself, before any handle exists.
//!
//! ```rust,no_run
//! use assertive_spawn::{spawn_assertively, LaunchRequest, SpawnErrorKind};
//!
//! # async fn run() {
//! let request = LaunchRequest::new("bash").args(["-c", "exit 12"]);
//! let (_handle, settlement) = spawn_assertively(&request).expect("bash should start");
//!
//! let err = settlement.await.unwrap_err();
//! assert_eq!(err.kind(), SpawnErrorKind::ExitCode);
//! assert_eq!(err.exit_code_value(), Some(12));
//! # }
//! ```

pub mod engine;
pub mod handle;
pub mod launcher;
pub mod request;
pub mod settlement;

// Re-export main types
pub use engine::{spawn_assertively, spawn_assertively_with};
pub use handle::ProcessHandle;
pub use launcher::{ChildStdio, LaunchedProcess, ProcessLauncher, TokioLauncher, TokioProcess};
pub use request::{LaunchRequest, StdioMode};
pub use settlement::{settle, Settlement};

pub use assertive_spawn_common::{
    Failure, Phase, SignalName, SpawnError, SpawnErrorKind, SpawnResult, TerminationOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
