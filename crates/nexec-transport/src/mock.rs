// SPDX-License-Identifier: MIT OR Apache-2.0
//! Test transports: a loopback channel backed by a locally spawned shell,
//! and a scriptable failure wrapper around it.

use crate::channel::{Channel, ChannelControl, ChannelKind, ChannelTransport};
use crate::error::TransportError;
use async_trait::async_trait;
use nexec_core::ExecutionTarget;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::process::Command;
use tracing::debug;

/// A "remote" transport that spawns `/bin/sh -s` locally and wires its
/// stdio up as the channel. Behaviourally equivalent to an SSH exec
/// channel to `localhost`, without any network.
#[derive(Debug, Default)]
pub struct LoopbackTransport;

#[async_trait]
impl ChannelTransport for LoopbackTransport {
    async fn open(
        &self,
        target: &ExecutionTarget,
        kind: ChannelKind,
    ) -> Result<Channel, TransportError> {
        let mut child = Command::new("/bin/sh")
            .arg("-s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(TransportError::Io)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Open("loopback stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Open("loopback stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Open("loopback stderr unavailable".into()))?;

        let control = ChannelControl::new();
        let waiter_control = control.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
            waiter_control.finish(code);
        });

        debug!(target: "nexec.transport", %target, ?kind, "loopback channel opened");
        Ok(Channel::new(
            kind,
            Box::new(stdin),
            Box::new(stdout),
            Box::new(stderr),
            control,
        ))
    }

    async fn reconnect(&self, _target: &ExecutionTarget) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Wraps [`LoopbackTransport`] with a scriptable queue of failures and
/// call counters, for retry-behaviour tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: LoopbackTransport,
    failures: Mutex<VecDeque<TransportError>>,
    opens: AtomicU32,
    reconnects: AtomicU32,
}

impl MockTransport {
    /// A transport that succeeds on every open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure; each queued entry fails exactly one `open` call, in
    /// FIFO order, before the transport starts succeeding.
    pub fn push_failure(&self, err: TransportError) {
        let mut guard = match self.failures.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.push_back(err);
    }

    /// Number of `open` calls observed.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `reconnect` calls observed.
    pub fn reconnects(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn open(
        &self,
        target: &ExecutionTarget,
        kind: ChannelKind,
    ) -> Result<Channel, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let scripted = {
            let mut guard = match self.failures.lock() {
                Ok(g) => g,
                Err(p) => p.into_inner(),
            };
            guard.pop_front()
        };
        if let Some(err) = scripted {
            return Err(err);
        }
        self.inner.open(target, kind).await
    }

    async fn reconnect(&self, target: &ExecutionTarget) -> Result<(), TransportError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.inner.reconnect(target).await
    }
}
