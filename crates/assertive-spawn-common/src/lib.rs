//! # Assertive Spawn Common
//!
//! Types shared by the assertive-spawn crates.
//!
//! This crate holds the pure half of the settlement contract: the error
//! taxonomy a settlement can reject with, the normalization of arbitrary
//! failure values into that taxonomy, and the termination outcome a process
//! produces exactly once. Nothing here touches the OS beyond naming signals
//! and errno codes.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{
    error_code_of, normalize_failure, Failure, Phase, SpawnError, SpawnErrorKind, SpawnResult,
};
pub use types::{SignalName, TerminationOutcome};
