// SPDX-License-Identifier: MIT OR Apache-2.0
//! The process state machine: monotonic transitions with terminal latching.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Lifecycle state of a launched process attempt.
///
/// Transitions form a DAG: `Initial → Starting → Running → Finishing`
/// followed by exactly one of the terminal states. Terminal states are
/// never left once reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Handle exists; nothing launched yet.
    Initial,
    /// `start()` is running the platform create step.
    Starting,
    /// The OS process is live and its PID is known.
    Running,
    /// The wait task observed the end of the process and is recording the
    /// result.
    Finishing,
    /// Terminal: the process exited on its own.
    Finished,
    /// Terminal: the attempt was interrupted or destroyed mid-flight.
    Cancelled,
    /// Terminal: the launch or supervision machinery failed.
    Error,
}

impl ProcessState {
    /// `true` for {Finished, Cancelled, Error}.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Error)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Finishing => "finishing",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Holder for a handle's state with subscription support.
///
/// Observers subscribe through a `watch` channel. Once a terminal state is
/// published the sender is dropped: subscribers observe the terminal value
/// and then see the channel close, so no notification can ever fire after
/// the process is over. Attempts to leave a terminal state are silently
/// ignored.
#[derive(Debug)]
pub struct StateCell {
    tx: Mutex<Option<watch::Sender<ProcessState>>>,
    rx: watch::Receiver<ProcessState>,
}

impl StateCell {
    /// A cell in the `Initial` state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ProcessState::Initial);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Current state.
    pub fn get(&self) -> ProcessState {
        *self.rx.borrow()
    }

    /// Subscribe to state changes. Late subscribers immediately observe
    /// the current (possibly terminal) state; after a terminal state the
    /// channel is closed and yields nothing further.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.rx.clone()
    }

    /// Attempt a transition. Returns `false` (and changes nothing) if a
    /// terminal state was already reached.
    pub fn set(&self, next: ProcessState) -> bool {
        let mut guard = match self.tx.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        let current = *tx.borrow();
        debug!(target: "nexec.lifecycle", from = %current, to = %next, "state transition");
        tx.send_replace(next);
        if next.is_terminal() {
            // Dropping the sender closes the channel for all subscribers.
            *guard = None;
        }
        true
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_latch() {
        let cell = StateCell::new();
        assert!(cell.set(ProcessState::Starting));
        assert!(cell.set(ProcessState::Running));
        assert!(cell.set(ProcessState::Finished));
        assert!(!cell.set(ProcessState::Error));
        assert!(!cell.set(ProcessState::Running));
        assert_eq!(cell.get(), ProcessState::Finished);
    }

    #[tokio::test]
    async fn subscribers_see_the_terminal_state_then_the_channel_closes() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        cell.set(ProcessState::Starting);
        cell.set(ProcessState::Cancelled);

        // The last published value is observable...
        assert_eq!(*rx.borrow_and_update(), ProcessState::Cancelled);
        // ...and nothing can arrive after it.
        assert!(rx.changed().await.is_err());
    }

    #[test]
    fn late_subscribers_observe_the_terminal_state() {
        let cell = StateCell::new();
        cell.set(ProcessState::Error);
        let rx = cell.subscribe();
        assert_eq!(*rx.borrow(), ProcessState::Error);
    }
}
