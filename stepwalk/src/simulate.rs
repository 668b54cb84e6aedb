//! Plan simulation: resolve a step plan against its scripted definitions,
//! assemble the scenario and walk it.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::debug;

use crate::core::failure::{Aborted, SoftFailure};
use crate::core::invariants::validate_invariants;
use crate::hooks::HookSource;
use crate::io::config::RunnerConfig;
use crate::io::plan::{Definition, HookSpec, Outcome, StepPlan};
use crate::io::report_log::{RunReport, Tee};
use crate::scenario::{StepResolver, prepare_scenario};
use crate::tree::{NodeId, Resolution, StepAction, StepNode, StepTree};
use crate::walker::{EventSink, RecordingSink, StepContext, Walker};

/// Action that produces a scripted outcome.
struct ScriptedStep {
    name: String,
    definition: Definition,
}

impl StepAction for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        if let Some(line) = &self.definition.log {
            ctx.log(line.clone());
        }
        let outcome = ctx
            .branch()
            .and_then(|branch| self.definition.branch_outcomes.get(branch))
            .copied()
            .unwrap_or(self.definition.outcome);
        let message = self
            .definition
            .message
            .clone()
            .unwrap_or_else(|| format!("{} failed", self.name));
        outcome_result(outcome, message)
    }
}

fn outcome_result(outcome: Outcome, message: String) -> Result<()> {
    match outcome {
        Outcome::Passed => Ok(()),
        Outcome::SoftFail => Err(SoftFailure::new(message).into()),
        Outcome::HardFail => Err(anyhow!(message)),
        Outcome::Abort => Err(Aborted::new(message).into()),
    }
}

/// Resolver matching step text against the plan's definition patterns.
pub struct PlanResolver {
    definitions: Vec<(Regex, Arc<dyn StepAction>)>,
}

impl PlanResolver {
    pub fn new(definitions: &[Definition]) -> Result<Self> {
        let definitions = definitions
            .iter()
            .map(|definition| {
                let regex = Regex::new(&format!("^(?:{})$", definition.pattern))
                    .with_context(|| format!("compile pattern '{}'", definition.pattern))?;
                let action: Arc<dyn StepAction> = Arc::new(ScriptedStep {
                    name: definition.pattern.clone(),
                    definition: definition.clone(),
                });
                Ok((regex, action))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { definitions })
    }
}

impl StepResolver for PlanResolver {
    fn resolve(&self, text: &str) -> Resolution {
        let matches: Vec<&Arc<dyn StepAction>> = self
            .definitions
            .iter()
            .filter(|(regex, _)| regex.is_match(text))
            .map(|(_, action)| action)
            .collect();
        match matches.as_slice() {
            [] => Resolution::Undefined,
            [action] => Resolution::Resolved(Arc::clone(action)),
            many => Resolution::Ambiguous(many.iter().map(|action| action.name().to_string()).collect()),
        }
    }
}

/// Hook source built from the plan's hook list; every step gets the same hooks.
pub struct ScriptedHooks {
    before: Vec<Arc<dyn StepAction>>,
    after: Vec<Arc<dyn StepAction>>,
}

impl ScriptedHooks {
    pub fn new(plan: &StepPlan) -> Self {
        fn actions(specs: &[HookSpec]) -> Vec<Arc<dyn StepAction>> {
            specs
                .iter()
                .map(|spec| {
                    Arc::new(ScriptedStep {
                        name: spec.name.clone(),
                        definition: Definition {
                            pattern: spec.name.clone(),
                            outcome: spec.outcome,
                            message: spec.message.clone(),
                            ..Definition::default()
                        },
                    }) as Arc<dyn StepAction>
                })
                .collect()
        }
        Self {
            before: actions(&plan.hooks.before),
            after: actions(&plan.hooks.after),
        }
    }
}

impl HookSource for ScriptedHooks {
    fn before_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        self.before.clone()
    }

    fn after_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        self.after.clone()
    }
}

/// Assemble the plan's scenario tree.
pub fn prepare_plan(plan: &StepPlan, config: &RunnerConfig) -> Result<StepTree> {
    let resolver = PlanResolver::new(&plan.definitions)?;
    let tree = prepare_scenario(
        &plan.scenario,
        plan.file.as_deref(),
        &plan.steps,
        &resolver,
        config.build_options(),
    )
    .with_context(|| format!("assemble scenario '{}'", plan.scenario))?;
    Ok(tree)
}

/// Assemble the plan and check the resulting tree.
///
/// Returns the tree when it is structurally sound, plus every step that
/// resolves to no definition or to several.
pub fn validate_plan(plan: &StepPlan, config: &RunnerConfig) -> Result<(StepTree, Vec<String>)> {
    let tree = prepare_plan(plan, config)?;
    let errors = validate_invariants(&tree);
    if !errors.is_empty() {
        return Err(anyhow!("tree invariants failed: {}", errors.join("; ")));
    }
    let mut warnings = Vec::new();
    for id in tree.preorder(tree.root()) {
        let node = &tree[id];
        match &node.resolution {
            Resolution::Undefined => warnings.push(format!("undefined step: {}", node.text)),
            Resolution::Ambiguous(candidates) => warnings.push(format!(
                "ambiguous step '{}' matches: {}",
                node.text,
                candidates.join(", ")
            )),
            Resolution::Noop | Resolution::Resolved(_) => {}
        }
    }
    Ok((tree, warnings))
}

/// Walk the plan's scenario, forwarding events to `sink`.
pub fn run_plan<S: EventSink + ?Sized>(
    plan: &StepPlan,
    config: &RunnerConfig,
    sink: &mut S,
) -> Result<RunReport> {
    let mut tree = prepare_plan(plan, config)?;
    let hooks = ScriptedHooks::new(plan);
    let mut recording = RecordingSink::default();
    let scenario = {
        let mut tee = Tee {
            first: &mut recording,
            second: sink,
        };
        Walker::new(&hooks, config.walk_options()).run(&mut tree, &mut tee)
    };
    debug!(scenario = %scenario.name, status = %scenario.status, "plan simulated");
    Ok(RunReport {
        scenario,
        nodes: recording.nodes,
    })
}

/// Render the tree as indented lines with flags, tags and branch values.
pub fn render_tree(tree: &StepTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", tree.name());
    render_children(tree, tree.root(), 1, &mut out);
    out
}

fn render_children(tree: &StepTree, id: NodeId, indent: usize, out: &mut String) {
    let node = &tree[id];
    for &attached in node.attached() {
        render_node(tree, attached, indent, "+ ", out);
    }
    for &child in node.children() {
        render_node(tree, child, indent, "- ", out);
    }
}

fn render_node(tree: &StepTree, id: NodeId, indent: usize, bullet: &str, out: &mut String) {
    let node = &tree[id];
    let mut line = format!("{}{bullet}{}", "  ".repeat(indent - 1), node.text);
    if let Some(branch) = &node.branch {
        let _ = write!(line, " <{branch}>");
    }
    for flag in &node.flags {
        let _ = write!(line, " [{flag}]");
    }
    for tag in &node.tags {
        let _ = write!(line, " #{tag}");
    }
    if node.is_flag_step {
        line.push_str(" (flag step)");
    }
    match &node.resolution {
        Resolution::Undefined => line.push_str(" (undefined)"),
        Resolution::Ambiguous(_) => line.push_str(" (ambiguous)"),
        Resolution::Noop | Resolution::Resolved(_) => {}
    }
    out.push_str(&line);
    out.push('\n');
    render_children(tree, id, indent + 1, out);
}
