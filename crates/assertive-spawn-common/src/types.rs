//! Termination outcome and signal naming.
//!
//! A process produces exactly one [`TerminationOutcome`]. Signals are carried
//! by name (`SIGKILL`, `SIGTERM`, ...) rather than by number so that errors
//! read the same on every host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitStatus;

/// Name of a terminating signal, e.g. `SIGKILL`.
///
/// # Example
/// ```
/// use assertive_spawn_common::SignalName;
///
/// let signal = SignalName::from("SIGTERM");
/// assert_eq!(signal.as_str(), "SIGTERM");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalName(String);

impl SignalName {
    /// Creates a signal name from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Names a raw signal number. Numbers the host does not know render as `SIG<n>`.
    #[cfg(unix)]
    pub fn from_raw(signo: i32) -> Self {
        match nix::sys::signal::Signal::try_from(signo) {
            Ok(signal) => Self::from(signal),
            Err(_) => Self(format!("SIG{}", signo)),
        }
    }

    /// Returns the signal name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the name back to the host's signal number, if it has one.
    #[cfg(unix)]
    pub fn number(&self) -> Option<i32> {
        if let Ok(signal) = self.0.parse::<nix::sys::signal::Signal>() {
            return Some(signal as i32);
        }
        self.0.strip_prefix("SIG")?.parse().ok()
    }
}

impl From<&str> for SignalName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SignalName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(unix)]
impl From<nix::sys::signal::Signal> for SignalName {
    fn from(signal: nix::sys::signal::Signal) -> Self {
        Self(signal.as_str().to_string())
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a process ended.
///
/// `code` is absent when the process was killed by a signal; `signal` is
/// absent when it exited normally (and always absent off Unix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub signal: Option<SignalName>,
}

impl TerminationOutcome {
    /// Outcome of a normal exit with `code`.
    pub fn exited(code: i32) -> Self {
        Self {
            success: code == 0,
            code: Some(code),
            signal: None,
        }
    }

    /// Outcome of termination by `signal`.
    pub fn signaled(signal: impl Into<SignalName>) -> Self {
        Self {
            success: false,
            code: None,
            signal: Some(signal.into()),
        }
    }
}

impl From<ExitStatus> for TerminationOutcome {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map(SignalName::from_raw)
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            success: status.success(),
            code: status.code(),
            signal,
        }
    }
}
