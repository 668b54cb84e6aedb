//! Scenario failure state machine and step error classification.
//!
//! Severity escalates `None -> Soft -> Hard` and never goes back within one
//! execution. Reaching `Hard` completes the scenario.

use thiserror::Error;
use tracing::debug;

use crate::core::types::{ScenarioStatus, Severity, StepStatus};

/// Error marking a step failure as non-fatal to the scenario.
///
/// Return it (or wrap it with context) from an action to record a soft
/// failure: later steps keep running and the scenario ends soft-failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SoftFailure {
    message: String,
}

impl SoftFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error requesting that the rest of the scenario is not executed.
///
/// The step reports `Skipped` and the failure severity is left untouched.
#[derive(Debug, Error)]
#[error("scenario aborted: {reason}")]
pub struct Aborted {
    reason: String,
}

impl Aborted {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors synthesized for steps the resolver could not bind to one action.
///
/// Both classify as hard failures.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("undefined step: {0}")]
    Undefined(String),
    #[error("ambiguous step '{text}' matches: {}", .candidates.join(", "))]
    Ambiguous {
        text: String,
        candidates: Vec<String>,
    },
}

/// How a step error affects the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Soft,
    Hard,
    Aborted,
}

impl FailureKind {
    pub fn status(self) -> StepStatus {
        match self {
            FailureKind::Soft => StepStatus::SoftFailed,
            FailureKind::Hard => StepStatus::Failed,
            FailureKind::Aborted => StepStatus::Skipped,
        }
    }
}

/// Classify an action error by walking its whole source chain.
///
/// An abort anywhere in the chain wins over a soft failure.
pub fn classify_error(err: &anyhow::Error) -> FailureKind {
    if err.chain().any(|cause| cause.is::<Aborted>()) {
        return FailureKind::Aborted;
    }
    if err.chain().any(|cause| cause.is::<SoftFailure>()) {
        return FailureKind::Soft;
    }
    FailureKind::Hard
}

/// Failure bookkeeping for one scenario execution.
///
/// Must not be shared between scenarios; each run owns its own state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioState {
    severity: Severity,
    complete: bool,
    aborted: bool,
    unresolved: bool,
}

impl ScenarioState {
    /// State that starts at `severity` (e.g. when resuming a component scenario).
    pub fn with_severity(severity: Severity) -> Self {
        Self {
            severity,
            complete: severity == Severity::Hard,
            ..Self::default()
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Feed one node outcome into the state machine.
    pub fn record_outcome(&mut self, status: StepStatus, error: Option<&anyhow::Error>) {
        if matches!(status, StepStatus::Passed | StepStatus::Skipped) {
            return;
        }
        let kind = match error {
            Some(err) => classify_error(err),
            None if status == StepStatus::SoftFailed => FailureKind::Soft,
            None => FailureKind::Hard,
        };

        let before = self.severity;
        match kind {
            FailureKind::Aborted => return,
            FailureKind::Soft => {
                if self.severity != Severity::Hard {
                    self.severity = Severity::Soft;
                }
            }
            FailureKind::Hard => {
                self.severity = Severity::Hard;
                self.complete = true;
            }
        }
        if before != self.severity {
            debug!(from = ?before, to = ?self.severity, %status, "severity escalated");
        }
    }

    /// Stop the scenario without changing its severity.
    pub fn request_abort(&mut self) {
        self.aborted = true;
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.severity == Severity::Hard || self.complete
    }

    pub fn is_failed(&self) -> bool {
        self.severity != Severity::None
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Note an undefined or ambiguous step seen during a dry run.
    ///
    /// The scenario ends up failed, but severity and completion are untouched
    /// so the rest of the dry run still reports every unresolved step.
    pub fn record_unresolved(&mut self) {
        self.unresolved = true;
    }

    pub fn status(&self) -> ScenarioStatus {
        match self.severity {
            Severity::Hard => ScenarioStatus::Failed,
            _ if self.unresolved => ScenarioStatus::Failed,
            Severity::Soft => ScenarioStatus::SoftFailed,
            Severity::None if self.aborted => ScenarioStatus::Aborted,
            Severity::None => ScenarioStatus::Passed,
        }
    }
}
