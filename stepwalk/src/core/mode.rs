//! Execution-mode gate for a flat hook/step/hook sequence.
//!
//! This works one level below the run policy: it only short-circuits the
//! remaining elements around a single node once one of them signals `Skip`.

use crate::core::types::{ExecMode, StepStatus};

impl ExecMode {
    /// Mode for the next element. `Skip` is a one-way latch.
    pub fn next(self, previous: ExecMode) -> ExecMode {
        if previous == ExecMode::Skip {
            ExecMode::Skip
        } else {
            self
        }
    }

    /// Mode an element leaves behind after finishing in `self` with `status`.
    pub fn resulting(self, status: StepStatus, aborted: bool) -> ExecMode {
        if aborted || status.is_failure() {
            ExecMode::Skip
        } else {
            self
        }
    }
}

/// Latching mode tracker for one flat sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeGate {
    mode: ExecMode,
}

impl ModeGate {
    pub fn new(initial: ExecMode) -> Self {
        Self { mode: initial }
    }

    /// Mode the next element must execute in.
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Feed back the mode the element that just ran left behind.
    pub fn advance(&mut self, result: ExecMode) -> ExecMode {
        self.mode = result.next(self.mode);
        self.mode
    }
}
