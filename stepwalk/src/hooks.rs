//! Hook sandwich: before hooks, the step, then after hooks, as one flat
//! sequence driven by the execution-mode gate.
//!
//! The [`HookSource`] trait decouples execution from hook discovery. Tests and
//! the simulator use static hook lists.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::core::failure::{FailureKind, ResolutionError, classify_error};
use crate::core::mode::ModeGate;
use crate::core::types::{ExecMode, StepStatus};
use crate::tree::{NodeId, Resolution, StepAction, StepNode, StepTree};
use crate::walker::{NodeEffects, StepContext};

/// Abstraction over hook discovery.
pub trait HookSource {
    /// Hooks to run before `node`, in order.
    fn before_step(&self, node: &StepNode) -> Vec<Arc<dyn StepAction>>;
    /// Hooks to run after `node`, in order.
    fn after_step(&self, node: &StepNode) -> Vec<Arc<dyn StepAction>>;
}

/// Hook source that never contributes hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookSource for NoHooks {
    fn before_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        Vec::new()
    }

    fn after_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Before,
    After,
}

/// Outcome of one hook in a sandwich.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookReport {
    pub name: String,
    pub kind: HookKind,
    pub mode: ExecMode,
    pub status: StepStatus,
}

/// Combined outcome of one node's sandwich.
#[derive(Debug)]
pub struct SandwichOutcome {
    /// First failure in the sequence, otherwise the step's own status.
    pub status: StepStatus,
    pub error: Option<anyhow::Error>,
    /// Some element asked for the scenario to stop.
    pub aborted: bool,
    pub hooks: Vec<HookReport>,
}

struct ElementResult {
    status: StepStatus,
    error: Option<anyhow::Error>,
    aborted: bool,
}

impl ElementResult {
    fn status(status: StepStatus) -> Self {
        Self {
            status,
            error: None,
            aborted: false,
        }
    }
}

/// Run `node` wrapped in its hooks, starting in `initial` mode.
///
/// Once any element fails or aborts, every later element runs in `Skip` mode
/// and is recorded as skipped without side effects.
pub fn run_sandwich<H: HookSource + ?Sized>(
    tree: &StepTree,
    node: NodeId,
    hooks: &H,
    initial: ExecMode,
    effects: &mut NodeEffects,
) -> SandwichOutcome {
    let before = hooks.before_step(&tree[node]);
    let after = hooks.after_step(&tree[node]);

    let mut gate = ModeGate::new(initial);
    let mut outcome = SandwichOutcome {
        status: StepStatus::Skipped,
        error: None,
        aborted: false,
        hooks: Vec::with_capacity(before.len() + after.len()),
    };
    let mut failed = false;

    for hook in &before {
        let mode = gate.mode();
        let result = run_hook(tree, node, hook.as_ref(), mode, effects);
        outcome.hooks.push(HookReport {
            name: hook.name().to_string(),
            kind: HookKind::Before,
            mode,
            status: result.status,
        });
        absorb(&mut gate, &mut outcome, &mut failed, mode, result);
    }

    let mode = gate.mode();
    let result = run_step(tree, node, mode, effects);
    let step_status = result.status;
    absorb(&mut gate, &mut outcome, &mut failed, mode, result);

    for hook in &after {
        let mode = gate.mode();
        let result = run_hook(tree, node, hook.as_ref(), mode, effects);
        outcome.hooks.push(HookReport {
            name: hook.name().to_string(),
            kind: HookKind::After,
            mode,
            status: result.status,
        });
        absorb(&mut gate, &mut outcome, &mut failed, mode, result);
    }

    if !failed {
        outcome.status = step_status;
    }
    debug!(node = %node, status = %outcome.status, hooks = outcome.hooks.len(), "sandwich finished");
    outcome
}

fn absorb(
    gate: &mut ModeGate,
    outcome: &mut SandwichOutcome,
    failed: &mut bool,
    mode: ExecMode,
    result: ElementResult,
) {
    gate.advance(mode.resulting(result.status, result.aborted));
    outcome.aborted |= result.aborted;
    if result.status.is_failure() && !*failed {
        *failed = true;
        outcome.status = result.status;
        outcome.error = result.error;
    }
}

fn run_hook(
    tree: &StepTree,
    node: NodeId,
    hook: &dyn StepAction,
    mode: ExecMode,
    effects: &mut NodeEffects,
) -> ElementResult {
    match mode {
        ExecMode::Run => invoke(tree, node, hook, effects),
        ExecMode::DryRun | ExecMode::Skip => ElementResult::status(StepStatus::Skipped),
    }
}

fn run_step(tree: &StepTree, node: NodeId, mode: ExecMode, effects: &mut NodeEffects) -> ElementResult {
    if mode == ExecMode::Skip {
        return ElementResult::status(StepStatus::Skipped);
    }

    let step = &tree[node];
    match &step.resolution {
        Resolution::Undefined => ElementResult {
            status: StepStatus::Undefined,
            error: Some(ResolutionError::Undefined(step.text.clone()).into()),
            aborted: false,
        },
        Resolution::Ambiguous(candidates) => ElementResult {
            status: StepStatus::Ambiguous,
            error: Some(
                ResolutionError::Ambiguous {
                    text: step.text.clone(),
                    candidates: candidates.clone(),
                }
                .into(),
            ),
            aborted: false,
        },
        _ if mode == ExecMode::DryRun => ElementResult::status(StepStatus::Skipped),
        Resolution::Noop => ElementResult::status(StepStatus::Passed),
        Resolution::Resolved(action) => invoke(tree, node, action.as_ref(), effects),
    }
}

fn invoke(tree: &StepTree, node: NodeId, action: &dyn StepAction, effects: &mut NodeEffects) -> ElementResult {
    let requested_before = effects.abort_requested();
    let result = {
        let mut ctx = StepContext::new(tree, node, effects);
        action.run(&mut ctx)
    };
    let requested = !requested_before && effects.abort_requested();

    match result {
        Ok(()) if requested => ElementResult {
            status: StepStatus::Skipped,
            error: None,
            aborted: true,
        },
        Ok(()) => ElementResult::status(StepStatus::Passed),
        Err(err) => {
            let kind = classify_error(&err);
            ElementResult {
                status: kind.status(),
                error: Some(err),
                aborted: requested || kind == FailureKind::Aborted,
            }
        }
    }
}
