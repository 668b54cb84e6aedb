//! Tree assembly from a flat, depth-annotated step sequence.
//!
//! Single pass, O(n). `open[k]` holds the last node seen at absolute depth
//! `root.depth + k`; entries deeper than the current node are dropped as soon as
//! it is placed, so lookups only ever find real ancestors and same-parent
//! siblings.

use thiserror::Error;
use tracing::{debug, warn};

use crate::tree::{NodeId, StepTree};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("step {node} at depth {depth} skips a level (deepest open ancestor is at depth {available})")]
    DepthJump {
        node: NodeId,
        depth: usize,
        available: usize,
    },
    #[error("step {0} is already linked into the tree")]
    AlreadyLinked(NodeId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Reject depth jumps greater than one instead of attaching to the
    /// deepest available ancestor.
    pub strict_depth: bool,
}

/// Link `sequence` under `root` as parent/child/sibling relations.
///
/// Each node's `raw_depth` is relative to `root`'s top-level steps: raw depth 0
/// becomes a direct child of `root`. Absolute depths are written back to the
/// nodes. When `root` already has children, the sequence continues after the
/// last one.
pub fn build_tree(
    tree: &mut StepTree,
    root: NodeId,
    sequence: &[NodeId],
    options: BuildOptions,
) -> Result<(), BuildError> {
    let base = tree[root].depth;
    let mut open = vec![root];
    if let Some(&last) = tree[root].children().last() {
        open.push(last);
    }

    for &id in sequence {
        if id == root || !tree[id].is_root() {
            return Err(BuildError::AlreadyLinked(id));
        }

        let mut level = tree[id].raw_depth + 1;
        if level > open.len() {
            let available = base + open.len() - 1;
            let depth = base + level;
            if options.strict_depth {
                return Err(BuildError::DepthJump {
                    node: id,
                    depth,
                    available,
                });
            }
            warn!(node = %id, depth, available, "depth jump; attaching to deepest open ancestor");
            level = open.len();
        }

        let parent = open[level - 1];
        let previous = open.get(level).copied();
        open.truncate(level);

        tree[id].depth = base + level;
        tree.link_child(parent, id);
        if let Some(previous) = previous {
            tree.link_siblings(previous, id);
        }
        open.push(id);
    }

    debug!(root = %root, steps = sequence.len(), "tree assembled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Resolution, StepNode};

    fn insert_all(tree: &mut StepTree, depths: &[(&str, usize)]) -> Vec<NodeId> {
        depths
            .iter()
            .map(|(text, depth)| {
                let mut node = StepNode::new(*text, Resolution::Noop);
                node.raw_depth = *depth;
                tree.insert(node)
            })
            .collect()
    }

    fn texts(tree: &StepTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree[*id].text.clone()).collect()
    }

    #[test]
    fn builds_nesting_and_sibling_links() {
        let mut tree = StepTree::new("s");
        let ids = insert_all(
            &mut tree,
            &[("a", 0), ("a1", 1), ("a2", 1), ("a2x", 2), ("b", 0), ("b1", 1)],
        );
        let root = tree.root();
        build_tree(&mut tree, root, &ids, BuildOptions::default()).expect("build");

        assert_eq!(texts(&tree, tree[root].children()), vec!["a", "b"]);
        assert_eq!(texts(&tree, tree[ids[0]].children()), vec!["a1", "a2"]);
        assert_eq!(texts(&tree, tree[ids[2]].children()), vec!["a2x"]);
        assert_eq!(texts(&tree, tree[ids[4]].children()), vec!["b1"]);

        assert_eq!(tree[ids[0]].next_sibling(), Some(ids[4]));
        assert_eq!(tree[ids[4]].previous_sibling(), Some(ids[0]));
        assert_eq!(tree[ids[1]].next_sibling(), Some(ids[2]));
        assert_eq!(tree[ids[2]].next_sibling(), None);
        // b1 starts a new level under b; a2x is not its sibling.
        assert_eq!(tree[ids[5]].previous_sibling(), None);

        assert_eq!(tree[ids[3]].depth, 3);
        assert_eq!(tree[ids[3]].parent(), Some(ids[2]));
    }

    #[test]
    fn depth_jump_attaches_to_deepest_open_ancestor() {
        let mut tree = StepTree::new("s");
        let ids = insert_all(&mut tree, &[("a", 0), ("deep", 3), ("b", 0)]);
        let root = tree.root();
        build_tree(&mut tree, root, &ids, BuildOptions::default()).expect("build");

        assert_eq!(tree[ids[1]].parent(), Some(ids[0]));
        assert_eq!(tree[ids[1]].depth, tree[ids[0]].depth + 1);
        assert_eq!(tree[ids[0]].next_sibling(), Some(ids[2]));
    }

    #[test]
    fn strict_mode_rejects_depth_jumps() {
        let mut tree = StepTree::new("s");
        let ids = insert_all(&mut tree, &[("a", 0), ("deep", 2)]);
        let root = tree.root();
        let err = build_tree(
            &mut tree,
            root,
            &ids,
            BuildOptions { strict_depth: true },
        )
        .expect_err("jump");
        assert_eq!(
            err,
            BuildError::DepthJump {
                node: ids[1],
                depth: 3,
                available: 1,
            }
        );
    }

    #[test]
    fn offsets_depths_by_component_root() {
        let mut tree = StepTree::with_root_depth("component", 2);
        let ids = insert_all(&mut tree, &[("a", 0), ("a1", 1)]);
        let root = tree.root();
        build_tree(&mut tree, root, &ids, BuildOptions::default()).expect("build");
        assert_eq!(tree[ids[0]].depth, 3);
        assert_eq!(tree[ids[1]].depth, 4);
        assert_eq!(tree[ids[0]].parent(), Some(tree.root()));
    }

    #[test]
    fn appending_continues_the_sibling_chain() {
        let mut tree = StepTree::new("s");
        let first = insert_all(&mut tree, &[("a", 0)]);
        let root = tree.root();
        build_tree(&mut tree, root, &first, BuildOptions::default()).expect("build");
        let second = insert_all(&mut tree, &[("b", 0)]);
        build_tree(&mut tree, root, &second, BuildOptions::default()).expect("build");

        assert_eq!(tree[first[0]].next_sibling(), Some(second[0]));
        assert_eq!(tree[tree.root()].children().len(), 2);
    }

    #[test]
    fn rejects_nodes_that_are_already_linked() {
        let mut tree = StepTree::new("s");
        let ids = insert_all(&mut tree, &[("a", 0)]);
        let root = tree.root();
        build_tree(&mut tree, root, &ids, BuildOptions::default()).expect("build");
        let err = build_tree(&mut tree, root, &ids, BuildOptions::default())
            .expect_err("relink");
        assert_eq!(err, BuildError::AlreadyLinked(ids[0]));
    }
}
