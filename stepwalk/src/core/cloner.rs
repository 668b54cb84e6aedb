//! Deep cloning of step subtrees for data-driven branching.
//!
//! Clones never alias graph structure with their originals: every child and
//! attached list is rebuilt with freshly inserted nodes. Flag, tag and bookmark
//! lists are new `Vec`s holding the same shared elements. Every clone is
//! registered against the node it was copied from.
//!
//! The structure is assumed to be a forest; there is no cycle detection.

use std::sync::Arc;

use tracing::debug;

use crate::tree::{NodeId, StepTree};

/// Deep-copy `node`, its attached steps and children, without its siblings.
///
/// The returned copy is detached: it has no parent, owner or siblings.
pub fn clone_subtree(tree: &mut StepTree, node: NodeId) -> NodeId {
    let data = tree[node].detached_copy();
    let copy = tree.insert(data);
    tree.record_clone(node, copy);

    let attached = tree[node].attached().to_vec();
    for original in attached {
        let cloned = clone_subtree(tree, original);
        tree.link_attached(copy, cloned);
    }

    let children = tree[node].children().to_vec();
    let mut previous = None;
    for original in children {
        let cloned = clone_subtree(tree, original);
        tree.link_child(copy, cloned);
        if let Some(previous) = previous {
            tree.link_siblings(previous, cloned);
        }
        previous = Some(cloned);
    }

    copy
}

/// Deep-copy `node` and every sibling after it, relinking the copied chain.
///
/// Returns the head of the new chain. The copies are not added to any parent.
pub fn clone_forest(tree: &mut StepTree, node: NodeId) -> NodeId {
    let head = clone_subtree(tree, node);
    let mut previous = head;
    let mut cursor = tree[node].next_sibling();
    while let Some(original) = cursor {
        let cloned = clone_subtree(tree, original);
        tree.link_siblings(previous, cloned);
        previous = cloned;
        cursor = tree[original].next_sibling();
    }
    head
}

/// One clone of the forest at `node` per branch value.
///
/// A node without branches yields a single clone. Each branch clone carries
/// its branch value and no further branches.
pub fn clone_variants(tree: &mut StepTree, node: NodeId) -> Vec<NodeId> {
    let branches = tree[node].branches.clone();
    if branches.is_empty() {
        return vec![clone_forest(tree, node)];
    }

    let variants: Vec<NodeId> = branches
        .into_iter()
        .map(|branch| {
            let head = clone_forest(tree, node);
            tag_branch(tree, head, branch);
            head
        })
        .collect();
    debug!(node = %node, variants = variants.len(), "cloned branch variants");
    variants
}

/// Expand a flat, not yet assembled sequence so every branched step appears
/// once per branch value.
///
/// A branched step is copied together with its nested run (the following
/// steps with a greater raw depth), so each branch becomes an independent
/// subtree once the sequence is built. Nested branches expand first.
pub fn expand_branches(tree: &mut StepTree, sequence: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(sequence.len());
    let mut index = 0;

    while index < sequence.len() {
        let head = sequence[index];
        let depth = tree[head].raw_depth;
        let nested_len = sequence[index + 1..]
            .iter()
            .take_while(|id| tree[**id].raw_depth > depth)
            .count();
        let end = index + 1 + nested_len;

        if tree[head].branches.is_empty() {
            out.push(head);
            index += 1;
            continue;
        }

        let nested = expand_branches(tree, &sequence[index + 1..end]);
        let branches = tree[head].branches.clone();
        for branch in branches {
            let cloned_head = clone_subtree(tree, head);
            tag_branch(tree, cloned_head, branch);
            out.push(cloned_head);
            for &original in &nested {
                out.push(clone_subtree(tree, original));
            }
        }
        index = end;
    }

    out
}

fn tag_branch(tree: &mut StepTree, head: NodeId, branch: Arc<str>) {
    let node = &mut tree[head];
    node.branch = Some(branch);
    node.branches.clear();
}
