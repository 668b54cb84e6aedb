//! Helpers for rendering deterministic node paths.
//!
//! Paths are positional: `root/2/1` is the first child of the second top-level
//! step. Attached steps use `+n` for their position in the owner's list, so
//! `root/2+1` is the first step attached to `root/2`.

use crate::tree::{NodeId, StepTree};

/// Return the positional path of `target`, rooted at its tree root.
pub fn node_path(tree: &StepTree, target: NodeId) -> String {
    let mut segments = Vec::new();
    let mut cursor = target;
    loop {
        let node = &tree[cursor];
        if let Some(parent) = node.parent() {
            let position = position_of(tree[parent].children(), cursor);
            segments.push(format!("/{position}"));
            cursor = parent;
        } else if let Some(owner) = node.owner() {
            let position = position_of(tree[owner].attached(), cursor);
            segments.push(format!("+{position}"));
            cursor = owner;
        } else {
            break;
        }
    }

    let mut path = if cursor == tree.root() {
        "root".to_string()
    } else {
        format!("detached{cursor}")
    };
    for segment in segments.iter().rev() {
        path.push_str(segment);
    }
    path
}

fn position_of(list: &[NodeId], id: NodeId) -> usize {
    list.iter().position(|candidate| *candidate == id).map_or(0, |index| index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{BuildOptions, build_tree};
    use crate::tree::{Resolution, StepNode};

    #[test]
    fn node_path_renders_positions_and_attachments() {
        let mut tree = StepTree::new("s");
        let ids: Vec<NodeId> = [("a", 0), ("b", 0), ("b1", 1)]
            .iter()
            .map(|(text, depth)| {
                let mut node = StepNode::new(*text, Resolution::Noop);
                node.raw_depth = *depth;
                tree.insert(node)
            })
            .collect();
        let root = tree.root();
        build_tree(&mut tree, root, &ids, BuildOptions::default()).expect("build");
        let attached = tree.attach(ids[2], StepNode::new("log", Resolution::Noop));

        assert_eq!(node_path(&tree, tree.root()), "root");
        assert_eq!(node_path(&tree, ids[0]), "root/1");
        assert_eq!(node_path(&tree, ids[2]), "root/2/1");
        assert_eq!(node_path(&tree, attached), "root/2/1+1");
    }

    #[test]
    fn detached_nodes_are_labelled_by_id() {
        let mut tree = StepTree::new("s");
        let id = tree.insert(StepNode::new("orphan", Resolution::Noop));
        assert_eq!(node_path(&tree, id), "detached#1");
    }
}
