//! Shared deterministic types for the execution core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conditional-execution directive attached to a step node.
///
/// A node without any flag follows the default policy (run unless marked
/// `skipped`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    AlwaysRun,
    RunIfScenarioFailed,
    RunIfScenarioSoftFailed,
    RunIfScenarioHardFailed,
    RunIfScenarioPassing,
}

impl Flag {
    pub const ALL: [Flag; 5] = [
        Flag::AlwaysRun,
        Flag::RunIfScenarioFailed,
        Flag::RunIfScenarioSoftFailed,
        Flag::RunIfScenarioHardFailed,
        Flag::RunIfScenarioPassing,
    ];

    /// Marker token used in step annotations (e.g. `[@:ALWAYS_RUN]`).
    pub fn token(self) -> &'static str {
        match self {
            Flag::AlwaysRun => "ALWAYS_RUN",
            Flag::RunIfScenarioFailed => "RUN_IF_SCENARIO_FAILED",
            Flag::RunIfScenarioSoftFailed => "RUN_IF_SCENARIO_SOFT_FAILED",
            Flag::RunIfScenarioHardFailed => "RUN_IF_SCENARIO_HARD_FAILED",
            Flag::RunIfScenarioPassing => "RUN_IF_SCENARIO_PASSING",
        }
    }

    pub fn from_token(token: &str) -> Option<Flag> {
        Flag::ALL.into_iter().find(|flag| flag.token() == token)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Scenario-wide failure level. Escalates monotonically within one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Soft,
    Hard,
}

/// Outcome status of a single node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    /// Failed with an error marked as non-fatal to the scenario.
    SoftFailed,
    Failed,
    /// The resolver found no matching action.
    Undefined,
    /// The resolver found more than one matching action.
    Ambiguous,
    /// Not executed (policy, pruning, dry-run, or abort).
    Skipped,
}

impl StepStatus {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            StepStatus::SoftFailed | StepStatus::Failed | StepStatus::Undefined | StepStatus::Ambiguous
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Passed => "passed",
            StepStatus::SoftFailed => "soft_failed",
            StepStatus::Failed => "failed",
            StepStatus::Undefined => "undefined",
            StepStatus::Ambiguous => "ambiguous",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution mode for one element of a flat hook/step/hook sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    #[default]
    Run,
    DryRun,
    Skip,
}

/// Final status of a whole scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    SoftFailed,
    Failed,
    Aborted,
}

impl ScenarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::SoftFailed => "soft_failed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
