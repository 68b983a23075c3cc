// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signal delivery contract consumed by the destruction protocol.

use crate::target::ExecutionTarget;
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// The subset of POSIX signals the lifecycle engine needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Signal 0 — liveness probe, delivers nothing.
    Null,
    /// SIGTERM — polite termination request.
    Term,
    /// SIGKILL — forceful termination.
    Kill,
    /// SIGCONT — resume a process suspended at startup.
    Cont,
}

impl Signal {
    /// Name as accepted by `kill -s`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "0",
            Self::Term => "TERM",
            Self::Kill => "KILL",
            Self::Cont => "CONT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from signal delivery.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The dispatcher cannot deliver signals to this target. The
    /// destruction protocol swallows this variant.
    #[error("signal delivery is not supported for this target")]
    Unsupported,

    /// The delivery mechanism itself failed.
    #[error("failed to deliver SIG{signal} to pid {pid}: {source}")]
    Delivery {
        /// Signal name.
        signal: &'static str,
        /// Target pid.
        pid: u32,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The target process rejected the signal (usually: no such process).
    #[error("SIG{signal} to pid {pid} failed with status {status}")]
    Refused {
        /// Signal name.
        signal: &'static str,
        /// Target pid.
        pid: u32,
        /// Exit status of the delivery tool.
        status: i32,
    },
}

/// Sends POSIX signals to a pid, local or remote. External collaborator of
/// the lifecycle engine; injected, never reached through a global.
#[async_trait]
pub trait SignalDispatcher: Send + Sync {
    /// Deliver `signal` to `pid` on `target`.
    async fn signal(
        &self,
        target: &ExecutionTarget,
        pid: u32,
        signal: Signal,
    ) -> Result<(), SignalError>;

    /// Liveness probe via signal 0.
    async fn is_alive(&self, target: &ExecutionTarget, pid: u32) -> bool {
        self.signal(target, pid, Signal::Null).await.is_ok()
    }
}

/// Local dispatcher that shells out to `kill(1)`.
#[derive(Debug, Default)]
pub struct ShellSignalDispatcher;

#[async_trait]
impl SignalDispatcher for ShellSignalDispatcher {
    async fn signal(
        &self,
        target: &ExecutionTarget,
        pid: u32,
        signal: Signal,
    ) -> Result<(), SignalError> {
        if !target.is_local() || cfg!(windows) {
            return Err(SignalError::Unsupported);
        }
        let status = tokio::process::Command::new("kill")
            .arg("-s")
            .arg(signal.name())
            .arg(pid.to_string())
            .status()
            .await
            .map_err(|source| SignalError::Delivery {
                signal: signal.name(),
                pid,
                source,
            })?;
        if status.success() {
            debug!(target: "nexec.signal", pid, signal = %signal, "signal delivered");
            Ok(())
        } else {
            Err(SignalError::Refused {
                signal: signal.name(),
                pid,
                status: status.code().unwrap_or(-1),
            })
        }
    }
}

/// One call observed by a [`RecordingDispatcher`].
#[derive(Clone, Debug)]
pub struct RecordedSignal {
    /// Target pid.
    pub pid: u32,
    /// Signal that was requested.
    pub signal: Signal,
    /// When the call was made.
    pub at: Instant,
}

/// Test double that records every delivery request without touching any
/// real process. Optionally reports every call as unsupported, to exercise
/// the destruction protocol's swallow policy.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<RecordedSignal>>,
    unsupported: bool,
}

impl RecordingDispatcher {
    /// A dispatcher that accepts (and records) every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that records every call but answers `Unsupported`.
    pub fn unsupported() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            unsupported: true,
        }
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<RecordedSignal> {
        match self.calls.lock() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SignalDispatcher for RecordingDispatcher {
    async fn signal(
        &self,
        _target: &ExecutionTarget,
        pid: u32,
        signal: Signal,
    ) -> Result<(), SignalError> {
        let mut guard = match self.calls.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.push(RecordedSignal {
            pid,
            signal,
            at: Instant::now(),
        });
        if self.unsupported {
            Err(SignalError::Unsupported)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_dispatcher_keeps_call_order() {
        let rec = RecordingDispatcher::new();
        let local = ExecutionTarget::local();
        rec.signal(&local, 7, Signal::Term).await.expect("record");
        rec.signal(&local, 7, Signal::Kill).await.expect("record");
        let calls = rec.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].signal, Signal::Term);
        assert_eq!(calls[1].signal, Signal::Kill);
        assert!(calls[0].at <= calls[1].at);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_dispatcher_refuses_remote_targets() {
        let remote = ExecutionTarget::create("u", "nowhere.example.com", 22);
        let err = ShellSignalDispatcher
            .signal(&remote, 1, Signal::Null)
            .await
            .expect_err("remote must be unsupported");
        assert!(matches!(err, SignalError::Unsupported));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn null_signal_probes_our_own_pid() {
        let local = ExecutionTarget::local();
        let alive = ShellSignalDispatcher
            .is_alive(&local, std::process::id())
            .await;
        assert!(alive);
    }
}
