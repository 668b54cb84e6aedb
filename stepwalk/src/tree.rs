//! Step node arena.
//!
//! Nodes are owned by a [`StepTree`] and addressed by [`NodeId`]. Ownership
//! flows strictly through the parent's child list (and the owner's attached
//! list); parent, owner and sibling links are plain non-owning lookups.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::Flag;
use crate::walker::StepContext;

/// Stable handle of a node inside its [`StepTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a step came from. Opaque to the execution core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
}

/// Effect of a resolved step, supplied by the external resolver.
pub trait StepAction: Send + Sync {
    /// Human-readable name of the matched definition.
    fn name(&self) -> &str;

    /// Perform the step. Errors are classified by the failure state machine.
    fn run(&self, ctx: &mut StepContext<'_>) -> anyhow::Result<()>;
}

/// Result of matching a step's text against known actions.
#[derive(Clone, Default)]
pub enum Resolution {
    /// Structural node with no effect (scenario roots, grouping steps).
    #[default]
    Noop,
    Resolved(Arc<dyn StepAction>),
    Undefined,
    /// Names of every matching candidate.
    Ambiguous(Vec<String>),
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Noop => f.write_str("Noop"),
            Resolution::Resolved(action) => f.debug_tuple("Resolved").field(&action.name()).finish(),
            Resolution::Undefined => f.write_str("Undefined"),
            Resolution::Ambiguous(candidates) => f.debug_tuple("Ambiguous").field(candidates).finish(),
        }
    }
}

/// One executable unit of test behavior.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub text: String,
    pub location: SourceLocation,
    /// Nesting level decoded from the step's annotation, relative to the
    /// scenario root's top-level steps.
    pub raw_depth: usize,
    /// Absolute nesting level, assigned by the tree builder.
    pub depth: usize,
    pub flags: Vec<Flag>,
    pub tags: Vec<Arc<str>>,
    pub bookmarks: Vec<Arc<str>>,
    pub is_flag_step: bool,
    pub skipped: bool,
    pub hard_fail: bool,
    pub soft_fail: bool,
    /// Data-driven variants of this step's phrase.
    pub branches: Vec<Arc<str>>,
    /// Branch value this node was cloned for, if any.
    pub branch: Option<Arc<str>>,
    pub resolution: Resolution,
    clone_of: Option<NodeId>,
    parent: Option<NodeId>,
    owner: Option<NodeId>,
    children: Vec<NodeId>,
    attached: Vec<NodeId>,
    previous_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl StepNode {
    pub fn new(text: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            text: text.into(),
            location: SourceLocation::default(),
            raw_depth: 0,
            depth: 0,
            flags: Vec::new(),
            tags: Vec::new(),
            bookmarks: Vec::new(),
            is_flag_step: false,
            skipped: false,
            hard_fail: false,
            soft_fail: false,
            branches: Vec::new(),
            branch: None,
            resolution,
            clone_of: None,
            parent: None,
            owner: None,
            children: Vec::new(),
            attached: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// True for nodes outside any nesting or attachment relationship.
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.owner.is_none()
    }

    pub fn is_clone(&self) -> bool {
        self.clone_of.is_some()
    }

    pub fn clone_of(&self) -> Option<NodeId> {
        self.clone_of
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Node this one is attached to, for attached steps.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn attached(&self) -> &[NodeId] {
        &self.attached
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.previous_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    /// Copy of the node's data with every graph link cleared.
    ///
    /// List fields become new `Vec`s holding the same `Arc` elements.
    pub(crate) fn detached_copy(&self) -> StepNode {
        StepNode {
            clone_of: None,
            parent: None,
            owner: None,
            children: Vec::new(),
            attached: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            ..self.clone()
        }
    }
}

/// Arena owning every node of one scenario execution.
///
/// Entries are never removed. Nodes replaced by their branch clones stay in
/// the arena unlinked, so [`StepTree::len`] counts them;
/// walk from [`StepTree::root`] to see only the assembled scenario.
#[derive(Debug, Clone)]
pub struct StepTree {
    name: String,
    nodes: Vec<StepNode>,
    root: NodeId,
    lineage: BTreeMap<NodeId, Vec<NodeId>>,
}

impl StepTree {
    /// Create a tree whose root is a structural scenario node at depth 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_root_depth(name, 0)
    }

    /// Create a tree rooted at `depth`, for component scenarios launched
    /// from inside another scenario.
    pub fn with_root_depth(name: impl Into<String>, depth: usize) -> Self {
        let name = name.into();
        let mut root = StepNode::new(name.clone(), Resolution::Noop);
        root.depth = depth;
        Self {
            name,
            nodes: vec![root],
            root: NodeId(0),
            lineage: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node to the arena.
    pub fn insert(&mut self, node: StepNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Add `node` as an attached step of `owner`, after any existing ones.
    pub fn attach(&mut self, owner: NodeId, node: StepNode) -> NodeId {
        let id = self.insert(node);
        self.link_attached(owner, id);
        id
    }

    /// Clones registered against `original`, in creation order.
    pub fn clones_of(&self, original: NodeId) -> &[NodeId] {
        self.lineage.get(&original).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pre-order ids starting at `start`: the node, its attached steps, then
    /// its children. Siblings of `start` are not included.
    pub fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.preorder_inner(start, &mut out);
        out
    }

    fn preorder_inner(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        let node = &self[id];
        for &attached in &node.attached {
            self.preorder_inner(attached, out);
        }
        for &child in &node.children {
            self.preorder_inner(child, out);
        }
    }

    /// Nesting descendants of `under` in pre-order, each paired with its depth
    /// relative to `under`'s top-level children (0 for direct children).
    ///
    /// Feeding these depths back to the builder reproduces the same tree.
    pub fn flatten(&self, under: NodeId) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        for &child in &self[under].children {
            self.flatten_inner(child, 0, &mut out);
        }
        out
    }

    fn flatten_inner(&self, id: NodeId, level: usize, out: &mut Vec<(NodeId, usize)>) {
        out.push((id, level));
        for &child in &self[id].children {
            self.flatten_inner(child, level + 1, out);
        }
    }

    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub(crate) fn link_siblings(&mut self, previous: NodeId, next: NodeId) {
        self.nodes[previous.0].next_sibling = Some(next);
        self.nodes[next.0].previous_sibling = Some(previous);
    }

    pub(crate) fn link_attached(&mut self, owner: NodeId, attached: NodeId) {
        self.nodes[owner.0].attached.push(attached);
        self.nodes[attached.0].owner = Some(owner);
    }

    pub(crate) fn record_clone(&mut self, original: NodeId, clone: NodeId) {
        self.nodes[clone.0].clone_of = Some(original);
        self.lineage.entry(original).or_default().push(clone);
    }
}

impl Index<NodeId> for StepTree {
    type Output = StepNode;

    fn index(&self, id: NodeId) -> &StepNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for StepTree {
    fn index_mut(&mut self, id: NodeId) -> &mut StepNode {
        &mut self.nodes[id.0]
    }
}
