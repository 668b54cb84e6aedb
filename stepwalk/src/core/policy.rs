//! Conditional run policy: whether a node executes given the scenario state.

use crate::core::failure::ScenarioState;
use crate::core::types::{Flag, Severity};
use crate::tree::StepNode;

/// Decide whether `node` should run now.
///
/// Rules are checked in order and the first match wins. Severity can change
/// between sibling executions, so callers must evaluate this immediately
/// before each execution.
pub fn should_run(node: &StepNode, state: &ScenarioState) -> bool {
    let severity = state.severity();

    if node.is_root() {
        return true;
    }
    if node.has_flag(Flag::AlwaysRun) {
        return true;
    }
    if node.has_flag(Flag::RunIfScenarioFailed) {
        return severity != Severity::None;
    }
    if node.has_flag(Flag::RunIfScenarioSoftFailed) {
        return severity == Severity::Soft;
    }
    if node.has_flag(Flag::RunIfScenarioHardFailed) {
        return severity == Severity::Hard;
    }
    if node.has_flag(Flag::RunIfScenarioPassing) {
        return severity == Severity::None;
    }
    !node.skipped
}
