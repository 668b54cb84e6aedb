//! Depth-first execution of an assembled step tree.
//!
//! The walker is synchronous and strictly sequential. For each node it checks
//! the run policy, executes the node, feeds the outcome to the failure state
//! machine and, unless the scenario is complete, continues with the node's
//! attached steps, its children and then its next sibling. Errors never escape
//! a node: scenario outcome is communicated only through [`ScenarioState`] and
//! the reports handed to the [`EventSink`].

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::failure::ScenarioState;
use crate::core::path::node_path;
use crate::core::policy::should_run;
use crate::core::types::{ExecMode, ScenarioStatus, Severity, StepStatus};
use crate::hooks::{HookReport, HookSource, run_sandwich};
use crate::tree::{NodeId, Resolution, StepTree};

/// Default cap on error text stored in a [`NodeReport`].
pub const DEFAULT_ERROR_LIMIT_BYTES: usize = 4096;

/// Named payload attached by an action to the node it ran for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// Side effects recorded while one node executes.
#[derive(Debug, Default)]
pub struct NodeEffects {
    logs: Vec<String>,
    attachments: Vec<Attachment>,
    abort_reason: Option<String>,
}

impl NodeEffects {
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_reason.is_some()
    }
}

/// Execution context handed to actions and hooks.
///
/// Everything an action does through the context is attributed to the node
/// being executed.
pub struct StepContext<'a> {
    tree: &'a StepTree,
    node: NodeId,
    effects: &'a mut NodeEffects,
}

impl<'a> StepContext<'a> {
    pub fn new(tree: &'a StepTree, node: NodeId, effects: &'a mut NodeEffects) -> Self {
        Self { tree, node, effects }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn text(&self) -> &str {
        &self.tree[self.node].text
    }

    /// Branch value of this node or its nearest branched ancestor.
    pub fn branch(&self) -> Option<&str> {
        let mut cursor = Some(self.node);
        while let Some(id) = cursor {
            let node = &self.tree[id];
            if let Some(branch) = &node.branch {
                return Some(branch);
            }
            cursor = node.parent().or(node.owner());
        }
        None
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tree[self.node].tags.iter().map(|tag| &**tag)
    }

    pub fn bookmarks(&self) -> impl Iterator<Item = &str> {
        self.tree[self.node].bookmarks.iter().map(|name| &**name)
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.effects.logs.push(line.into());
    }

    pub fn attach(&mut self, name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) {
        self.effects.attachments.push(Attachment {
            name: name.into(),
            media_type: media_type.into(),
            data,
        });
    }

    /// Ask for the rest of the scenario to be skipped. Severity is unchanged.
    pub fn abort_scenario(&mut self, reason: impl Into<String>) {
        self.effects.abort_reason = Some(reason.into());
    }
}

/// Outcome of one node, as handed to the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub node: NodeId,
    pub path: String,
    pub text: String,
    pub branch: Option<String>,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub hooks: Vec<HookReport>,
    pub logs: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// Scenario-level outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub severity: Severity,
    pub executed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Receiver of per-node and per-scenario outcomes.
pub trait EventSink {
    fn node_finished(&mut self, report: &NodeReport);
    fn scenario_finished(&mut self, report: &ScenarioReport);
}

/// Sink that keeps every report in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub nodes: Vec<NodeReport>,
    pub scenarios: Vec<ScenarioReport>,
}

impl RecordingSink {
    /// Status reported for the node with `text`, if any.
    pub fn status_of(&self, text: &str) -> Option<StepStatus> {
        self.nodes
            .iter()
            .find(|report| report.text == text)
            .map(|report| report.status)
    }

    /// `(text, status)` pairs in report order.
    pub fn statuses(&self) -> Vec<(String, StepStatus)> {
        self.nodes
            .iter()
            .map(|report| (report.text.clone(), report.status))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn node_finished(&mut self, report: &NodeReport) {
        self.nodes.push(report.clone());
    }

    fn scenario_finished(&mut self, report: &ScenarioReport) {
        self.scenarios.push(report.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Resolve and report without invoking actions or hooks.
    pub dry_run: bool,
    /// Truncate error text in reports beyond this many bytes.
    pub error_limit_bytes: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            error_limit_bytes: DEFAULT_ERROR_LIMIT_BYTES,
        }
    }
}

/// Tree walker bound to a hook source.
pub struct Walker<'h, H: HookSource + ?Sized> {
    hooks: &'h H,
    options: WalkOptions,
}

impl<'h, H: HookSource + ?Sized> Walker<'h, H> {
    pub fn new(hooks: &'h H, options: WalkOptions) -> Self {
        Self { hooks, options }
    }

    /// Execute the scenario rooted at `tree.root()`.
    ///
    /// Nodes that never execute are reported as skipped once the walk ends.
    #[instrument(skip_all, fields(scenario = tree.name()))]
    pub fn run<S: EventSink + ?Sized>(&self, tree: &mut StepTree, sink: &mut S) -> ScenarioReport {
        let root = tree.root();
        info!(nodes = tree.preorder(root).len(), dry_run = self.options.dry_run, "scenario started");
        let started = Instant::now();

        let mut run = WalkRun {
            tree,
            hooks: self.hooks,
            sink,
            options: self.options,
            state: ScenarioState::default(),
            reported: HashSet::new(),
            pending_skipped: false,
            executed: 0,
            skipped: 0,
        };
        run.reported.insert(root);
        run.run_descendants(root);
        run.report_unvisited(root);

        let report = ScenarioReport {
            name: run.tree.name().to_string(),
            status: run.state.status(),
            severity: run.state.severity(),
            executed: run.executed,
            skipped: run.skipped,
            duration_ms: elapsed_ms(started),
        };
        info!(status = %report.status, executed = report.executed, skipped = report.skipped, "scenario finished");
        run.sink.scenario_finished(&report);
        report
    }
}

struct WalkRun<'r, H: HookSource + ?Sized, S: EventSink + ?Sized> {
    tree: &'r mut StepTree,
    hooks: &'r H,
    sink: &'r mut S,
    options: WalkOptions,
    state: ScenarioState,
    reported: HashSet<NodeId>,
    pending_skipped: bool,
    executed: usize,
    skipped: usize,
}

struct Executed {
    status: StepStatus,
    error: Option<anyhow::Error>,
    aborted: bool,
    hooks: Vec<HookReport>,
    effects: NodeEffects,
    duration_ms: u64,
}

impl<H: HookSource + ?Sized, S: EventSink + ?Sized> WalkRun<'_, H, S> {
    /// Run `first` and the siblings after it until one completes the scenario.
    fn run_chain(&mut self, first: NodeId) {
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            if !self.run_node(id) {
                return;
            }
            cursor = self.tree[id].next_sibling();
        }
    }

    /// Returns `false` when the scenario completed at this node, in which case
    /// nothing after it in the current chain may run.
    fn run_node(&mut self, id: NodeId) -> bool {
        if !should_run(&self.tree[id], &self.state) {
            debug!(node = %id, severity = ?self.state.severity(), "policy skipped node");
            self.tree[id].skipped = true;
            self.report_skipped(id);
            return true;
        }

        let executed = self.execute(id);
        let unresolved = matches!(executed.status, StepStatus::Undefined | StepStatus::Ambiguous);
        if self.options.dry_run && unresolved {
            self.state.record_unresolved();
        } else {
            self.state.record_outcome(executed.status, executed.error.as_ref());
        }
        if executed.aborted {
            self.state.request_abort();
        }
        self.cache_outcome(id, executed.status);
        self.report_executed(id, executed);

        if self.state.is_complete() {
            debug!(node = %id, severity = ?self.state.severity(), "scenario complete; pruning");
            self.mark_pending_skipped();
            return false;
        }
        self.run_descendants(id)
    }

    /// Attached steps, then children. Returns `false` if the scenario
    /// completed inside the attached steps.
    fn run_descendants(&mut self, id: NodeId) -> bool {
        let attached = self.tree[id].attached().to_vec();
        for step in attached {
            if !self.run_node(step) {
                return false;
            }
        }

        let children = self.tree[id].children().to_vec();
        if let Some(&first) = children.first() {
            self.init_children(id, &children);
            self.run_chain(first);
        }
        true
    }

    /// Children inherit the union of their own and their parent's flags.
    fn init_children(&mut self, parent: NodeId, children: &[NodeId]) {
        let inherited = self.tree[parent].flags.clone();
        if inherited.is_empty() {
            return;
        }
        for &child in children {
            let flags = &mut self.tree[child].flags;
            for flag in &inherited {
                if !flags.contains(flag) {
                    flags.push(*flag);
                }
            }
        }
    }

    fn execute(&mut self, id: NodeId) -> Executed {
        let started = Instant::now();
        let mut effects = NodeEffects::default();

        if self.tree[id].is_flag_step {
            let aborted = self.execute_direct(id, &mut effects);
            return Executed {
                status: if aborted {
                    StepStatus::Skipped
                } else {
                    StepStatus::Passed
                },
                error: None,
                aborted,
                hooks: Vec::new(),
                effects,
                duration_ms: elapsed_ms(started),
            };
        }

        let mode = if self.options.dry_run {
            ExecMode::DryRun
        } else {
            ExecMode::Run
        };
        let outcome = run_sandwich(&*self.tree, id, self.hooks, mode, &mut effects);
        Executed {
            status: outcome.status,
            error: outcome.error,
            aborted: outcome.aborted,
            hooks: outcome.hooks,
            effects,
            duration_ms: elapsed_ms(started),
        }
    }

    /// Fast path for flag steps: no hooks, passed unless the action aborts.
    fn execute_direct(&self, id: NodeId, effects: &mut NodeEffects) -> bool {
        if self.options.dry_run {
            return false;
        }
        let Resolution::Resolved(action) = &self.tree[id].resolution else {
            return false;
        };
        let result = {
            let mut ctx = StepContext::new(&*self.tree, id, effects);
            action.run(&mut ctx)
        };
        if let Err(err) = result {
            warn!(node = %id, error = %format!("{err:#}"), "flag step error ignored");
        }
        effects.abort_requested()
    }

    fn cache_outcome(&mut self, id: NodeId, status: StepStatus) {
        let node = &mut self.tree[id];
        match status {
            StepStatus::SoftFailed => node.soft_fail = true,
            StepStatus::Failed | StepStatus::Undefined | StepStatus::Ambiguous => node.hard_fail = true,
            StepStatus::Passed | StepStatus::Skipped => {}
        }
    }

    /// Mark every node that has not run yet as skipped, so default-policy
    /// nodes reached while unwinding stay skipped.
    fn mark_pending_skipped(&mut self) {
        if self.pending_skipped {
            return;
        }
        self.pending_skipped = true;
        for id in self.tree.preorder(self.tree.root()) {
            if !self.reported.contains(&id) {
                self.tree[id].skipped = true;
            }
        }
    }

    fn report_executed(&mut self, id: NodeId, executed: Executed) {
        if executed.status == StepStatus::Skipped {
            self.skipped += 1;
        } else {
            self.executed += 1;
        }
        let error = executed
            .error
            .map(|err| truncate_utf8(&format!("{err:#}"), self.options.error_limit_bytes));
        let report = NodeReport {
            hooks: executed.hooks,
            logs: executed.effects.logs,
            attachments: executed.effects.attachments,
            ..self.base_report(id, executed.status, executed.duration_ms, error)
        };
        self.emit(id, &report);
    }

    fn report_skipped(&mut self, id: NodeId) {
        self.skipped += 1;
        let report = self.base_report(id, StepStatus::Skipped, 0, None);
        self.emit(id, &report);
    }

    fn report_unvisited(&mut self, root: NodeId) {
        for id in self.tree.preorder(root) {
            if !self.reported.contains(&id) {
                self.tree[id].skipped = true;
                self.report_skipped(id);
            }
        }
    }

    fn base_report(
        &self,
        id: NodeId,
        status: StepStatus,
        duration_ms: u64,
        error: Option<String>,
    ) -> NodeReport {
        let node = &self.tree[id];
        NodeReport {
            node: id,
            path: node_path(&*self.tree, id),
            text: node.text.clone(),
            branch: node.branch.as_deref().map(str::to_string),
            status,
            duration_ms,
            error,
            hooks: Vec::new(),
            logs: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// The tree root is structural and is not reported.
    fn emit(&mut self, id: NodeId, report: &NodeReport) {
        self.reported.insert(id);
        if id == self.tree.root() {
            return;
        }
        debug!(node = %id, path = %report.path, status = %report.status, "node finished");
        self.sink.node_finished(report);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Cut `text` to at most `limit` bytes on a character boundary.
fn truncate_utf8(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &text[..end])
}
