// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! nexec-transport
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod error;
#[cfg(unix)]
pub mod mock;

pub use channel::{Channel, ChannelControl, ChannelKind, ChannelRead, ChannelTransport, ChannelWrite};
pub use error::TransportError;
#[cfg(unix)]
pub use mock::{LoopbackTransport, MockTransport};

use nexec_core::ExecutionTarget;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed attempt budget for channel acquisition.
const OPEN_ATTEMPTS: u32 = 2;

/// Backoff applied before retrying an interrupted-I/O failure.
const INTERRUPTED_IO_BACKOFF: Duration = Duration::from_millis(250);

/// Open a channel, retrying once on the recognised transient failures.
///
/// Only the closed set classified by [`TransportError::is_transient`] is
/// retried: the known library defect retries immediately, interrupted I/O
/// retries after a short backoff, and "channel is not opened" reconnects
/// the underlying session first. Anything else propagates on the first
/// attempt.
pub async fn open_with_retry(
    transport: &dyn ChannelTransport,
    target: &ExecutionTarget,
    kind: ChannelKind,
) -> Result<Channel, TransportError> {
    let mut last = None;
    for attempt in 0..OPEN_ATTEMPTS {
        match transport.open(target, kind).await {
            Ok(channel) => {
                debug!(target: "nexec.transport", %target, ?kind, attempt, "channel opened");
                return Ok(channel);
            }
            Err(err) if err.is_transient() && attempt + 1 < OPEN_ATTEMPTS => {
                warn!(target: "nexec.transport", %target, error = %err, attempt, "transient channel failure, retrying");
                match &err {
                    TransportError::InterruptedIo(_) => {
                        tokio::time::sleep(INTERRUPTED_IO_BACKOFF).await;
                    }
                    TransportError::ChannelNotOpened => {
                        transport.reconnect(target).await?;
                    }
                    _ => {}
                }
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last.unwrap_or(TransportError::ChannelNotOpened))
}
