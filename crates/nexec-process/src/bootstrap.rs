// SPDX-License-Identifier: MIT OR Apache-2.0
//! The bootstrap header protocol.
//!
//! Every launch strategy that cooperates with a helper (shell trampoline,
//! launcher binary, pty helper, external terminal) discovers the real PID
//! through the same newline-delimited `NAME=VALUE` protocol; this module is
//! the single parser for all of them. Reads are buffered line reads, and a
//! cancellation observed mid-read stops reading rather than failing with a
//! corruption error.

use crate::cancel::CancelToken;
use crate::error::LifecycleError;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A parsed `NAME=VALUE` header block.
#[derive(Clone, Debug, Default)]
pub struct HeaderBlock {
    entries: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Value of `name`, if the block carried it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `name`, or [`LifecycleError::HeaderIncomplete`].
    pub fn require(&self, name: &'static str) -> Result<&str, LifecycleError> {
        self.get(name).ok_or(LifecycleError::HeaderIncomplete(name))
    }

    /// The mandatory `PID` entry, parsed. Its absence (or a non-decimal
    /// value) is the fatal "failed to get PID" condition.
    pub fn pid(&self) -> Result<u32, LifecycleError> {
        let raw = self.get("PID").ok_or(LifecycleError::PidMissing)?;
        let pid = parse_leading_digits(raw).ok_or(LifecycleError::PidMissing)?;
        if pid == 0 {
            return Err(LifecycleError::PidMissing);
        }
        Ok(pid)
    }

    /// All entries in the order they appeared.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Parse a block out of already-captured text (e.g. a report file).
    /// Lines without `=` and everything after a blank line are ignored.
    pub fn parse_text(text: &str) -> HeaderBlock {
        let mut block = HeaderBlock::default();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once('=') {
                block.entries.push((name.to_string(), value.to_string()));
            }
        }
        block
    }

    /// Read a blank-line-terminated header block from `reader`.
    ///
    /// Zero entries is a valid block. EOF also terminates the block, which
    /// lets the caller turn a missing mandatory entry into the right fatal
    /// error instead of hanging.
    pub async fn read<R>(reader: &mut R, cancel: &CancelToken) -> Result<HeaderBlock, LifecycleError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut block = HeaderBlock::default();
        loop {
            let line = match read_line_interruptible(reader, cancel).await? {
                Some(line) => line,
                None => break,
            };
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            match line.split_once('=') {
                Some((name, value)) => block.entries.push((name.to_string(), value.to_string())),
                // Not part of the protocol; the header is over.
                None => break,
            }
        }
        Ok(block)
    }

    /// Read exactly `keys.len()` header lines, validating the expected key
    /// order. Used by the pty helper protocol (`PID=`, then `TTY=`).
    pub async fn read_keyed<R>(
        reader: &mut R,
        keys: &[&'static str],
        cancel: &CancelToken,
    ) -> Result<HeaderBlock, LifecycleError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut block = HeaderBlock::default();
        for &key in keys {
            let line = read_line_interruptible(reader, cancel)
                .await?
                .ok_or(LifecycleError::HeaderIncomplete(key))?;
            let line = line.trim_end();
            match line.split_once('=') {
                Some((name, value)) if name == key => {
                    block.entries.push((name.to_string(), value.to_string()));
                }
                _ => return Err(LifecycleError::HeaderIncomplete(key)),
            }
        }
        Ok(block)
    }
}

/// Read the decimal PID line a cooperating shell echoes as its first
/// output. Interruption stops reading — a missing PID surfaces as
/// [`LifecycleError::PidMissing`] or [`LifecycleError::Interrupted`], never
/// as a bogus zero.
pub async fn read_pid_line<R>(reader: &mut R, cancel: &CancelToken) -> Result<u32, LifecycleError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line_interruptible(reader, cancel)
        .await?
        .ok_or(LifecycleError::PidMissing)?;
    match parse_leading_digits(&line) {
        Some(pid) if pid > 0 => Ok(pid),
        _ => Err(LifecycleError::PidMissing),
    }
}

/// Poll a PID file written by an interactively-spawned terminal emulator.
pub async fn poll_pid_file(
    path: &Path,
    interval: Duration,
    deadline: Duration,
    cancel: &CancelToken,
) -> Result<u32, LifecycleError> {
    let give_up = tokio::time::Instant::now() + deadline;
    loop {
        if cancel.is_cancelled() {
            return Err(LifecycleError::Interrupted);
        }
        if let Ok(text) = tokio::fs::read_to_string(path).await {
            if let Some(pid) = parse_leading_digits(text.trim_start()) {
                if pid > 0 {
                    return Ok(pid);
                }
            }
        }
        if tokio::time::Instant::now() >= give_up {
            return Err(LifecycleError::Timeout("pid file"));
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(LifecycleError::Interrupted),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// One buffered line read that aborts cleanly when the token trips.
/// Returns `None` on EOF.
async fn read_line_interruptible<R>(
    reader: &mut R,
    cancel: &CancelToken,
) -> Result<Option<String>, LifecycleError>
where
    R: AsyncBufRead + Unpin,
{
    if cancel.is_cancelled() {
        return Err(LifecycleError::Interrupted);
    }
    let mut line = String::new();
    let n = tokio::select! {
        _ = cancel.cancelled() => return Err(LifecycleError::Interrupted),
        res = reader.read_line(&mut line) => res.map_err(LifecycleError::Read)?,
    };
    if n == 0 { Ok(None) } else { Ok(Some(line)) }
}

/// Accumulate leading ASCII digits into a pid; `None` when the text does
/// not start with a digit.
fn parse_leading_digits(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
