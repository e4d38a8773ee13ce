//! External control of a running act.
//!
//! The controller is owned by the caller and read by the dispatcher between
//! steps. Pause and cancel are polled, never preemptive: a signal takes
//! effect only after the in-flight step completes, so callers should expect
//! up to one full step's latency.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Control state of an act, as seen by the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    Running,
    Paused,
    Cancelled,
}

const RUNNING: u8 = 0;
const PAUSED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared pause/cancel cell.
///
/// Written by the caller thread, read by the dispatch task. Cancellation is
/// terminal: once cancelled, pause and resume are ignored.
#[derive(Debug)]
pub struct StateController {
    state: AtomicU8,
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

impl StateController {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    pub fn state(&self) -> ControlState {
        match self.state.load(Ordering::Acquire) {
            PAUSED => ControlState::Paused,
            CANCELLED => ControlState::Cancelled,
            _ => ControlState::Running,
        }
    }

    /// Request a pause. No effect if already cancelled.
    pub fn pause(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, PAUSED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Resume from a pause. No effect if already cancelled.
    pub fn resume(&self) {
        let _ = self
            .state
            .compare_exchange(PAUSED, RUNNING, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Cancel the act. Terminal.
    pub fn cancel(&self) {
        self.state.store(CANCELLED, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ControlState::Cancelled
    }
}
