// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handle I/O plumbing: streams that are never null.
//!
//! A handle exposes stdin/stdout/stderr from the moment it is created,
//! even before (or instead of) any OS process existing. Placeholders are
//! empty readers and a sink writer; startup failures chain the error text
//! onto the stderr reader so a caller that only reads streams still sees
//! the failure reason.

use std::io::Cursor;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Type-erased readable process stream.
pub type OutputReader = Box<dyn AsyncRead + Send + Unpin>;
/// Type-erased writable process stream.
pub type InputWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An empty, immediately-EOF reader.
pub fn empty_reader() -> OutputReader {
    Box::new(tokio::io::empty())
}

/// A writer that swallows everything.
pub fn sink_writer() -> InputWriter {
    Box::new(tokio::io::sink())
}

/// A reader yielding the given text once, then EOF.
pub fn text_reader(text: String) -> OutputReader {
    Box::new(Cursor::new(text.into_bytes()))
}

/// The three streams of a process handle.
///
/// Streams are taken at most once by the caller; taking replaces the slot
/// with a placeholder so accessors never observe an absent stream.
pub struct ProcessIo {
    stdin: Mutex<Option<InputWriter>>,
    stdout: Mutex<Option<OutputReader>>,
    stderr: Mutex<Option<OutputReader>>,
}

impl std::fmt::Debug for ProcessIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessIo").finish_non_exhaustive()
    }
}

impl ProcessIo {
    /// Fresh placeholders: sink stdin, empty stdout/stderr.
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(Some(sink_writer())),
            stdout: Mutex::new(Some(empty_reader())),
            stderr: Mutex::new(Some(empty_reader())),
        }
    }

    /// Install the real streams once the OS process exists.
    pub fn install(&self, stdin: InputWriter, stdout: OutputReader, stderr: OutputReader) {
        *lock(&self.stdin) = Some(stdin);
        *lock(&self.stdout) = Some(stdout);
        *lock(&self.stderr) = Some(stderr);
    }

    /// Take the stdin writer. Always yields a writer.
    pub fn take_stdin(&self) -> InputWriter {
        lock(&self.stdin).take().unwrap_or_else(sink_writer)
    }

    /// Take the stdout reader. Always yields a reader.
    pub fn take_stdout(&self) -> OutputReader {
        lock(&self.stdout).take().unwrap_or_else(empty_reader)
    }

    /// Take the stderr reader. Always yields a reader.
    pub fn take_stderr(&self) -> OutputReader {
        lock(&self.stderr).take().unwrap_or_else(empty_reader)
    }

    /// Append a line of synthesized diagnostic text to the stderr reader.
    ///
    /// Used for startup failures and the one-shot native-initialization
    /// diagnostic; whatever the real process wrote (if anything) still
    /// comes first.
    pub fn append_stderr_text(&self, text: String) {
        let mut guard = lock(&self.stderr);
        let current = guard.take().unwrap_or_else(empty_reader);
        *guard = Some(Box::new(current.chain(Cursor::new(text.into_bytes()))));
    }
}

impl Default for ProcessIo {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    }
}
