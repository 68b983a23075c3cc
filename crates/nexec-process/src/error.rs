// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for process specs and the lifecycle engine.

use nexec_core::SignalError;
use nexec_transport::TransportError;
use thiserror::Error;

/// Errors from building a [`crate::ProcessSpec`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// A raw command line is already set; executable/arguments cannot be
    /// combined with it.
    #[error("a raw command line is already set; executable/arguments cannot be combined with it")]
    CommandLineAlreadySet,

    /// Executable/arguments are already set; a raw command line cannot be
    /// combined with them.
    #[error("executable/arguments are already set; a raw command line cannot be combined with them")]
    ExecutableAlreadySet,

    /// Neither an executable nor a command line was configured.
    #[error("no command configured")]
    NothingToRun,
}

/// Errors from launching and supervising a process.
///
/// Most of these never reach the caller as a `Result`: `start()` folds them
/// into the handle's `Error` state and stderr stream. They surface directly
/// only from the launch strategies' internals and from accessors with a
/// documented failure mode (like `pid()` before startup completed).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The capability probe produced nothing for the target. Fatal and
    /// non-retryable.
    #[error("host characteristics are unavailable for {0}")]
    HostInfoUnavailable(String),

    /// The requested working directory does not exist on the target.
    #[error("working directory does not exist: {0}")]
    WorkingDirectoryMissing(String),

    /// The target's shell could not be found.
    #[error("shell not found: {0}")]
    ShellNotFound(String),

    /// A helper binary required by the selected launch strategy was not
    /// configured.
    #[error("required helper is not configured: {0}")]
    HelperMissing(&'static str),

    /// The bootstrap header ended without a PID entry.
    #[error("failed to get PID of the started process")]
    PidMissing,

    /// The PID has not been discovered yet.
    #[error("pid is not yet available")]
    PidUnavailable,

    /// A mandatory bootstrap header entry is absent.
    #[error("bootstrap header is incomplete: missing {0}")]
    HeaderIncomplete(&'static str),

    /// Spawning the OS process failed.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing the bootstrap script to the child failed.
    #[error("failed to write bootstrap script: {0}")]
    Bootstrap(#[source] std::io::Error),

    /// Reading the child's startup output failed.
    #[error("failed to read process output: {0}")]
    Read(#[source] std::io::Error),

    /// The operation was interrupted by cancellation or destroy().
    #[error("operation interrupted")]
    Interrupted,

    /// A bounded wait elapsed.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Spec misuse detected at launch time.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Remote channel acquisition failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Explicit signal delivery (such as resuming a suspended process)
    /// failed. The destruction protocol never surfaces this variant.
    #[error(transparent)]
    Signal(#[from] SignalError),
}
