// SPDX-License-Identifier: MIT OR Apache-2.0
//! Channels: bidirectional byte streams to a remote shell or exec session.

use crate::error::TransportError;
use async_trait::async_trait;
use nexec_core::ExecutionTarget;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// What kind of remote session to open on the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// One-shot command execution session.
    Exec,
    /// Interactive shell session.
    Shell,
}

/// Type-erased writable half of a channel.
pub type ChannelWrite = Box<dyn AsyncWrite + Send + Unpin>;
/// Type-erased readable half of a channel.
pub type ChannelRead = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Default)]
struct ControlState {
    connected: AtomicBool,
    exit_status: Mutex<Option<i32>>,
}

/// Shared connected-state and exit-status view of a channel.
///
/// The lifecycle engine keeps a clone after splitting the channel so it can
/// poll for disconnection and read the exit status once the session ends.
#[derive(Clone, Debug)]
pub struct ChannelControl {
    state: Arc<ControlState>,
}

impl ChannelControl {
    /// A fresh control in the connected state.
    pub fn new() -> Self {
        let state = ControlState {
            connected: AtomicBool::new(true),
            exit_status: Mutex::new(None),
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// `true` while the session is live.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Exit status of the remote session; `None` until it has ended.
    pub fn exit_status(&self) -> Option<i32> {
        match self.state.exit_status.lock() {
            Ok(g) => *g,
            Err(p) => *p.into_inner(),
        }
    }

    /// Record the session's exit status and mark the channel disconnected.
    /// The first recorded status wins.
    pub fn finish(&self, status: i32) {
        let mut guard = match self.state.exit_status.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.get_or_insert(status);
        self.state.connected.store(false, Ordering::SeqCst);
    }

    /// Mark the channel disconnected without an exit status.
    pub fn disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }
}

impl Default for ChannelControl {
    fn default() -> Self {
        Self::new()
    }
}

/// A live channel to a remote shell/exec session: an input half, output and
/// error halves, and a [`ChannelControl`] for state polling.
pub struct Channel {
    kind: ChannelKind,
    input: ChannelWrite,
    output: ChannelRead,
    error: ChannelRead,
    control: ChannelControl,
}

impl Channel {
    /// Assemble a channel from its halves.
    pub fn new(
        kind: ChannelKind,
        input: ChannelWrite,
        output: ChannelRead,
        error: ChannelRead,
        control: ChannelControl,
    ) -> Self {
        Self {
            kind,
            input,
            output,
            error,
            control,
        }
    }

    /// Session kind this channel was opened as.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Control view for state polling.
    pub fn control(&self) -> ChannelControl {
        self.control.clone()
    }

    /// Tear the channel apart for independent ownership of the halves.
    pub fn into_parts(self) -> (ChannelWrite, ChannelRead, ChannelRead, ChannelControl) {
        (self.input, self.output, self.error, self.control)
    }

    /// Release the channel. Shutdown failures are logged, not fatal.
    pub async fn close(mut self) {
        if let Err(err) = self.input.shutdown().await {
            debug!(target: "nexec.transport", error = %err, "channel shutdown failed");
        }
        self.control.disconnect();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field("connected", &self.control.is_connected())
            .finish_non_exhaustive()
    }
}

/// Acquires and releases channels on an existing authenticated connection.
///
/// The lifecycle engine receives an implementation by injection; it never
/// reaches for a process-wide accessor.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Synchronously open a live channel to `target`, or fail.
    async fn open(
        &self,
        target: &ExecutionTarget,
        kind: ChannelKind,
    ) -> Result<Channel, TransportError>;

    /// Re-establish the underlying authenticated session. Called by the
    /// retry wrapper when a channel reports "not opened".
    async fn reconnect(&self, target: &ExecutionTarget) -> Result<(), TransportError>;
}
