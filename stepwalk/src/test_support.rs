//! Test-only helpers for constructing steps, actions and hook sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;

use crate::core::builder::{BuildOptions, build_tree};
use crate::core::failure::{Aborted, SoftFailure};
use crate::core::types::Flag;
use crate::hooks::HookSource;
use crate::tree::{NodeId, Resolution, StepAction, StepNode, StepTree};
use crate::walker::StepContext;

type Script = dyn Fn(&mut StepContext<'_>) -> anyhow::Result<()> + Send + Sync;

struct ScriptedInner {
    name: String,
    calls: AtomicUsize,
    script: Box<Script>,
}

/// Step action with a fixed behavior that counts its invocations.
///
/// Clones share the same counter, so a test can keep one handle and hand the
/// other to a tree or hook source.
#[derive(Clone)]
pub struct ScriptedAction {
    inner: Arc<ScriptedInner>,
}

impl ScriptedAction {
    pub fn new<F>(name: &str, result: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::with_context(name, move |_| result())
    }

    pub fn with_context<F>(name: &str, script: F) -> Self
    where
        F: Fn(&mut StepContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ScriptedInner {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                script: Box::new(script),
            }),
        }
    }

    pub fn passing(name: &str) -> Self {
        Self::new(name, || Ok(()))
    }

    pub fn failing(name: &str, message: &str) -> Self {
        let message = message.to_string();
        Self::new(name, move || Err(anyhow!("{message}")))
    }

    pub fn soft_failing(name: &str, message: &str) -> Self {
        let message = message.to_string();
        Self::new(name, move || Err(SoftFailure::new(message.clone()).into()))
    }

    pub fn aborting(name: &str, reason: &str) -> Self {
        let reason = reason.to_string();
        Self::new(name, move || Err(Aborted::new(reason.clone()).into()))
    }

    /// Number of times the action (or any clone of it) ran.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl StepAction for ScriptedAction {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        (self.inner.script)(ctx)
    }
}

/// Resolution bound to a clone of `action`.
pub fn resolved(action: &ScriptedAction) -> Resolution {
    Resolution::Resolved(Arc::new(action.clone()))
}

/// Hook source returning the same hooks for every step.
#[derive(Clone, Default)]
pub struct StaticHooks {
    before: Vec<Arc<dyn StepAction>>,
    after: Vec<Arc<dyn StepAction>>,
}

impl StaticHooks {
    pub fn new(before: Vec<ScriptedAction>, after: Vec<ScriptedAction>) -> Self {
        fn erase(actions: Vec<ScriptedAction>) -> Vec<Arc<dyn StepAction>> {
            actions
                .into_iter()
                .map(|action| Arc::new(action) as Arc<dyn StepAction>)
                .collect()
        }
        Self {
            before: erase(before),
            after: erase(after),
        }
    }
}

impl HookSource for StaticHooks {
    fn before_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        self.before.clone()
    }

    fn after_step(&self, _node: &StepNode) -> Vec<Arc<dyn StepAction>> {
        self.after.clone()
    }
}

/// Create a detached step with a raw depth and flags.
pub fn step(text: &str, raw_depth: usize, flags: &[Flag], resolution: Resolution) -> StepNode {
    let mut node = StepNode::new(text, resolution);
    node.raw_depth = raw_depth;
    node.flags = flags.to_vec();
    node
}

/// Insert `steps` into a fresh tree and assemble them under its root.
pub fn scenario(name: &str, steps: Vec<StepNode>) -> (StepTree, Vec<NodeId>) {
    let mut tree = StepTree::new(name);
    let ids: Vec<NodeId> = steps.into_iter().map(|node| tree.insert(node)).collect();
    let root = tree.root();
    if let Err(err) = build_tree(&mut tree, root, &ids, BuildOptions::default()) {
        panic!("test scenario failed to build: {err}");
    }
    (tree, ids)
}

/// First node reachable from the root, in pre-order, whose text is `text`.
pub fn find(tree: &StepTree, text: &str) -> Option<NodeId> {
    tree.preorder(tree.root())
        .into_iter()
        .find(|id| tree[*id].text == text)
}
