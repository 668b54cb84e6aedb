//! Structural invariants of an assembled step forest.

use std::collections::HashSet;

use crate::core::path::node_path;
use crate::tree::{NodeId, StepTree};

/// Check structural invariants for everything reachable from the tree root:
/// - Each node is reachable exactly once
/// - Children point back at their parent and sit one level deeper
/// - Sibling links follow the parent's child order
/// - Attached steps point back at their owner and have no parent
///
/// Returns a list of stable error messages in pre-order.
pub fn validate_invariants(tree: &StepTree) -> Vec<String> {
    let mut errors = Vec::new();
    let root = tree.root();
    if !tree[root].is_root() {
        errors.push("root: must not have a parent or owner".to_string());
    }
    let mut seen = HashSet::new();
    validate_node(tree, root, &mut seen, &mut errors);
    errors
}

fn validate_node(tree: &StepTree, id: NodeId, seen: &mut HashSet<NodeId>, errors: &mut Vec<String>) {
    let path = node_path(tree, id);
    if !seen.insert(id) {
        errors.push(format!("{path}: node {id} reachable more than once"));
        return;
    }

    let node = &tree[id];
    for &attached in node.attached() {
        let step = &tree[attached];
        if step.owner() != Some(id) {
            errors.push(format!("{path}: attached step {attached} does not point back at its owner"));
        }
        if step.parent().is_some() {
            errors.push(format!("{path}: attached step {attached} must not have a parent"));
        }
        validate_node(tree, attached, seen, errors);
    }

    let children = node.children();
    for (index, &child) in children.iter().enumerate() {
        let step = &tree[child];
        if step.parent() != Some(id) {
            errors.push(format!("{path}: child {child} does not point back at its parent"));
        }
        if step.depth != node.depth + 1 {
            errors.push(format!(
                "{path}: child {child} has depth {} (expected {})",
                step.depth,
                node.depth + 1
            ));
        }
        let expected_previous = index.checked_sub(1).map(|prev| children[prev]);
        if step.previous_sibling() != expected_previous {
            errors.push(format!("{path}: child {child} has wrong previous sibling"));
        }
        let expected_next = children.get(index + 1).copied();
        if step.next_sibling() != expected_next {
            errors.push(format!("{path}: child {child} has wrong next sibling"));
        }
        validate_node(tree, child, seen, errors);
    }
}
