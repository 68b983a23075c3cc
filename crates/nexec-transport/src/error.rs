// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transport error taxonomy: transient signatures vs. everything else.

use thiserror::Error;

/// Errors from channel acquisition and session management.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No authenticated session exists for the target.
    #[error("no authenticated session for {0}")]
    NoSession(String),

    /// Known transport-library defect surfacing as a null cause. Transient.
    #[error("transport library defect: {0}")]
    LibraryBug(String),

    /// I/O on the session was interrupted mid-operation. Transient; retried
    /// after a short backoff.
    #[error("interrupted i/o: {0}")]
    InterruptedIo(String),

    /// The channel was acquired but never reached the opened state.
    /// Transient; triggers a session reconnect before the retry.
    #[error("channel is not opened")]
    ChannelNotOpened,

    /// Channel acquisition failed for a non-transient reason.
    #[error("failed to open channel: {0}")]
    Open(String),

    /// Plain I/O failure on the session.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// `true` for the closed set of failures worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LibraryBug(_) | Self::InterruptedIo(_) | Self::ChannelNotOpened
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_recognised_signatures_are_transient() {
        assert!(TransportError::LibraryBug("npe".into()).is_transient());
        assert!(TransportError::InterruptedIo("read".into()).is_transient());
        assert!(TransportError::ChannelNotOpened.is_transient());
        assert!(!TransportError::NoSession("x".into()).is_transient());
        assert!(!TransportError::Open("refused".into()).is_transient());
        assert!(!TransportError::Io(std::io::Error::other("boom")).is_transient());
    }
}
