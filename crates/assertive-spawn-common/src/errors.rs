//! Error types for assertive spawning.
//!
//! Every failure a caller can observe is a [`SpawnError`]. A settlement only
//! ever rejects with one of four kinds:
//!
//! | Kind | Raised when |
//! |---|---|
//! | [`SpawnErrorKind::Launch`] | the process could not be started |
//! | [`SpawnErrorKind::Signal`] | the process was terminated by a signal |
//! | [`SpawnErrorKind::ExitCode`] | the process exited with a non-zero code |
//! | [`SpawnErrorKind::Monitoring`] | observing termination itself failed |
//!
//! Launchers and monitors do not all fail in the same shape, so raw failures
//! are first captured as a [`Failure`] and then mapped by
//! [`normalize_failure`]. That function is pure and is the only place where
//! the mapping rules live.

use crate::types::SignalName;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type for spawn operations.
pub type SpawnResult<T> = std::result::Result<T, SpawnError>;

/// Main error type for spawn operations.
#[derive(Error, Debug, Clone)]
pub enum SpawnError {
    /// The process could not be started at all.
    #[error("{message}")]
    Launch {
        command: String,
        message: String,
        /// Errno-style name of the launcher's native code, e.g. `ENOENT`.
        error_code: Option<String>,
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// The process was terminated by a signal.
    #[error("Child process '{command}' exited due to the {signal} signal")]
    Signal {
        command: String,
        exit_code: Option<i32>,
        signal: SignalName,
    },

    /// The process exited with a non-zero code and no signal.
    #[error("Child process '{command}' exited with code {exit_code}")]
    ExitCode {
        command: String,
        exit_code: i32,
        signal: Option<SignalName>,
    },

    /// Waiting for the termination outcome failed.
    #[error("{message}")]
    Monitoring {
        command: String,
        message: String,
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// A control request reached a handle whose process has already been reaped.
    #[error("Child process '{command}' has already exited")]
    ProcessGone { command: String },

    /// A control request (kill, signal) could not be delivered.
    #[error("Failed to control child process '{command}': {reason}")]
    Control { command: String, reason: String },
}

/// Discriminant of [`SpawnError`] for callers that only need the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnErrorKind {
    Launch,
    Signal,
    ExitCode,
    Monitoring,
    ProcessGone,
    Control,
}

impl SpawnError {
    /// Creates a Signal error for `command`.
    pub fn signal(
        command: impl Into<String>,
        signal: impl Into<SignalName>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Signal {
            command: command.into(),
            exit_code,
            signal: signal.into(),
        }
    }

    /// Creates an ExitCode error for `command`.
    pub fn exit_code(command: impl Into<String>, exit_code: i32, signal: Option<SignalName>) -> Self {
        Self::ExitCode {
            command: command.into(),
            exit_code,
            signal,
        }
    }

    pub fn process_gone(command: impl Into<String>) -> Self {
        Self::ProcessGone {
            command: command.into(),
        }
    }

    pub fn control(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Control {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> SpawnErrorKind {
        match self {
            Self::Launch { .. } => SpawnErrorKind::Launch,
            Self::Signal { .. } => SpawnErrorKind::Signal,
            Self::ExitCode { .. } => SpawnErrorKind::ExitCode,
            Self::Monitoring { .. } => SpawnErrorKind::Monitoring,
            Self::ProcessGone { .. } => SpawnErrorKind::ProcessGone,
            Self::Control { .. } => SpawnErrorKind::Control,
        }
    }

    /// Command the error refers to.
    pub fn command(&self) -> &str {
        match self {
            Self::Launch { command, .. }
            | Self::Signal { command, .. }
            | Self::ExitCode { command, .. }
            | Self::Monitoring { command, .. }
            | Self::ProcessGone { command }
            | Self::Control { command, .. } => command,
        }
    }

    /// Exit code attached to a Signal or ExitCode error.
    pub fn exit_code_value(&self) -> Option<i32> {
        match self {
            Self::Signal { exit_code, .. } => *exit_code,
            Self::ExitCode { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Terminating signal attached to a Signal or ExitCode error.
    pub fn signal_name(&self) -> Option<&SignalName> {
        match self {
            Self::Signal { signal, .. } => Some(signal),
            Self::ExitCode { signal, .. } => signal.as_ref(),
            _ => None,
        }
    }

    /// Launcher-level error code of a Launch error, e.g. `ENOENT`.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Launch { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }

    /// Underlying I/O error, when the failure was structured.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            Self::Launch { source, .. } | Self::Monitoring { source, .. } => source.as_deref(),
            _ => None,
        }
    }
}

// ==============================================================================
// Failure normalization
// ==============================================================================

/// Which side of the contract a failure was caught on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Starting the process.
    Launch,
    /// Waiting for the process to terminate.
    Monitoring,
}

/// A raw failure value as produced by a launcher or a monitor.
pub enum Failure {
    /// No failure value at all.
    Absent,
    /// A structured OS error.
    Io(io::Error),
    /// Plain text.
    Message(String),
    /// Anything else that can at least be displayed.
    Other(Box<dyn fmt::Display + Send + Sync>),
}

impl Failure {
    pub fn other(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(value))
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Io(error) => f.debug_tuple("Io").field(error).finish(),
            Self::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Self::Other(value) => f.debug_tuple("Other").field(&value.to_string()).finish(),
        }
    }
}

impl From<io::Error> for Failure {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl<T: Into<Failure>> From<Option<T>> for Failure {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// Converts a raw failure into a [`SpawnError`].
///
/// Precedence: absent (or empty text) becomes a generic error naming the
/// command; a structured error passes through, and in the launch phase its
/// OS code is re-exposed as `error_code`; plain text becomes the message;
/// anything else is displayed into the message.
///
/// # Example
/// ```
/// use assertive_spawn_common::{normalize_failure, Failure, Phase, SpawnErrorKind};
///
/// let err = normalize_failure(Phase::Monitoring, "sleep", Failure::Absent);
/// assert_eq!(err.kind(), SpawnErrorKind::Monitoring);
/// assert_eq!(err.to_string(), "Child process 'sleep' exited for an unknown reason.");
/// ```
pub fn normalize_failure(phase: Phase, command: &str, failure: Failure) -> SpawnError {
    match failure {
        Failure::Absent => unknown_failure(phase, command),
        Failure::Message(message) if message.is_empty() => unknown_failure(phase, command),
        Failure::Io(error) => {
            let message = error.to_string();
            match phase {
                Phase::Launch => SpawnError::Launch {
                    command: command.to_string(),
                    message,
                    error_code: error_code_of(&error),
                    source: Some(Arc::new(error)),
                },
                Phase::Monitoring => SpawnError::Monitoring {
                    command: command.to_string(),
                    message,
                    source: Some(Arc::new(error)),
                },
            }
        }
        Failure::Message(message) => with_message(phase, command, message),
        Failure::Other(value) => with_message(phase, command, value.to_string()),
    }
}

fn unknown_failure(phase: Phase, command: &str) -> SpawnError {
    let message = match phase {
        Phase::Launch => format!("Spawning '{}' failed for an unknown reason.", command),
        Phase::Monitoring => format!("Child process '{}' exited for an unknown reason.", command),
    };
    with_message(phase, command, message)
}

fn with_message(phase: Phase, command: &str, message: String) -> SpawnError {
    match phase {
        Phase::Launch => SpawnError::Launch {
            command: command.to_string(),
            message,
            error_code: None,
            source: None,
        },
        Phase::Monitoring => SpawnError::Monitoring {
            command: command.to_string(),
            message,
            source: None,
        },
    }
}

/// Errno-style name for an I/O error (`ENOENT`, `EACCES`, ...).
///
/// Uses the raw OS code where the host provides a known one, otherwise the
/// closest errno for the error kind.
pub fn error_code_of(error: &io::Error) -> Option<String> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;

        if let Some(raw) = error.raw_os_error() {
            let errno = Errno::from_raw(raw);
            if errno != Errno::UnknownErrno {
                return Some(format!("{:?}", errno));
            }
        }
    }

    let code = match error.kind() {
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::AlreadyExists => "EEXIST",
        io::ErrorKind::InvalidInput => "EINVAL",
        io::ErrorKind::Interrupted => "EINTR",
        io::ErrorKind::WouldBlock => "EAGAIN",
        io::ErrorKind::OutOfMemory => "ENOMEM",
        _ => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_absent_failure_names_command() {
        let err = normalize_failure(Phase::Launch, "deploy.sh", Failure::Absent);
        assert_eq!(err.kind(), SpawnErrorKind::Launch);
        assert_eq!(err.to_string(), "Spawning 'deploy.sh' failed for an unknown reason.");
        assert!(err.error_code().is_none());

        let err = normalize_failure(Phase::Monitoring, "deploy.sh", Failure::Absent);
        assert_eq!(err.kind(), SpawnErrorKind::Monitoring);
        assert_eq!(err.to_string(), "Child process 'deploy.sh' exited for an unknown reason.");
    }

    #[test]
    fn test_empty_message_is_treated_as_absent() {
        let err = normalize_failure(Phase::Launch, "x", Failure::from(""));
        assert_eq!(err.to_string(), "Spawning 'x' failed for an unknown reason.");
    }

    #[test]
    fn test_plain_text_becomes_message() {
        let err = normalize_failure(Phase::Launch, "x", Failure::from("sandbox refused exec"));
        assert_eq!(err.to_string(), "sandbox refused exec");
        assert!(err.io_source().is_none());
        assert!(err.error_code().is_none());
    }

    #[test]
    fn test_displayable_value_is_stringified() {
        let err = normalize_failure(Phase::Monitoring, "x", Failure::other(42u8));
        assert_eq!(err.kind(), SpawnErrorKind::Monitoring);
        assert_eq!(err.to_string(), "42");
    }

    #[test]
    fn test_launch_io_error_exposes_error_code() {
        let io_err = io::Error::from(io::ErrorKind::NotFound);
        let err = normalize_failure(Phase::Launch, "missing", Failure::from(io_err));

        assert_eq!(err.kind(), SpawnErrorKind::Launch);
        assert_eq!(err.error_code(), Some("ENOENT"));
        assert_eq!(err.io_source().map(io::Error::kind), Some(io::ErrorKind::NotFound));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_monitoring_io_error_passes_through_without_code() {
        let io_err = io::Error::new(io::ErrorKind::Other, "wait failed");
        let err = normalize_failure(Phase::Monitoring, "x", Failure::from(io_err));

        assert_eq!(err.kind(), SpawnErrorKind::Monitoring);
        assert_eq!(err.to_string(), "wait failed");
        assert!(err.error_code().is_none());
        assert!(err.io_source().is_some());
    }

    #[test]
    #[cfg(unix)]
    fn test_error_code_uses_raw_os_error() {
        assert_eq!(
            error_code_of(&io::Error::from_raw_os_error(nix::libc::EACCES)).as_deref(),
            Some("EACCES")
        );
        assert_eq!(
            error_code_of(&io::Error::from_raw_os_error(nix::libc::ENOENT)).as_deref(),
            Some("ENOENT")
        );
    }

    #[test]
    fn test_option_failure_conversion() {
        assert!(matches!(Failure::from(None::<io::Error>), Failure::Absent));
        assert!(matches!(Failure::from(Some("boom")), Failure::Message(_)));
    }

    #[test]
    fn test_settlement_error_accessors() {
        let err = SpawnError::signal("sleep", "SIGKILL", None);
        assert_eq!(err.kind(), SpawnErrorKind::Signal);
        assert_eq!(err.to_string(), "Child process 'sleep' exited due to the SIGKILL signal");
        assert_eq!(err.signal_name().map(SignalName::as_str), Some("SIGKILL"));
        assert_eq!(err.exit_code_value(), None);

        let err = SpawnError::exit_code("bash", 12, None);
        assert_eq!(err.kind(), SpawnErrorKind::ExitCode);
        assert_eq!(err.to_string(), "Child process 'bash' exited with code 12");
        assert_eq!(err.exit_code_value(), Some(12));
        assert_eq!(err.command(), "bash");
    }
}
