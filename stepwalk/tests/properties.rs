//! Property tests for assembly, run policy, severity and cloning.

use anyhow::anyhow;
use proptest::prelude::*;

use stepwalk::core::builder::{BuildOptions, build_tree};
use stepwalk::core::cloner::clone_variants;
use stepwalk::core::failure::{ScenarioState, SoftFailure};
use stepwalk::core::invariants::validate_invariants;
use stepwalk::core::policy::should_run;
use stepwalk::core::types::{Flag, Severity, StepStatus};
use stepwalk::test_support::{scenario, step};
use stepwalk::tree::{NodeId, Resolution, StepNode, StepTree};

// ===== Strategy definitions =====

/// Raw depths where each step nests at most one level below the previous one.
fn well_formed_depths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..5, 1..40).prop_map(|raw| {
        let mut previous: Option<usize> = None;
        raw.into_iter()
            .map(|wanted| {
                let depth = match previous {
                    None => 0,
                    Some(prev) => wanted.min(prev + 1),
                };
                previous = Some(depth);
                depth
            })
            .collect()
    })
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::None),
        Just(Severity::Soft),
        Just(Severity::Hard),
    ]
}

fn flags_strategy() -> impl Strategy<Value = Vec<Flag>> {
    prop::sample::subsequence(Flag::ALL.to_vec(), 0..=Flag::ALL.len())
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Passed,
    Soft,
    Hard,
    Undefined,
    Skipped,
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Passed),
        Just(Outcome::Soft),
        Just(Outcome::Hard),
        Just(Outcome::Undefined),
        Just(Outcome::Skipped),
    ]
}

fn record(state: &mut ScenarioState, outcome: Outcome) {
    match outcome {
        Outcome::Passed => state.record_outcome(StepStatus::Passed, None),
        Outcome::Soft => {
            let err: anyhow::Error = SoftFailure::new("soft").into();
            state.record_outcome(StepStatus::SoftFailed, Some(&err));
        }
        Outcome::Hard => state.record_outcome(StepStatus::Failed, Some(&anyhow!("hard"))),
        Outcome::Undefined => state.record_outcome(StepStatus::Undefined, None),
        Outcome::Skipped => state.record_outcome(StepStatus::Skipped, None),
    }
}

fn build(depths: &[usize]) -> (StepTree, Vec<NodeId>) {
    let steps = depths
        .iter()
        .enumerate()
        .map(|(index, depth)| step(&format!("s{index}"), *depth, &[], Resolution::Noop))
        .collect();
    scenario("prop", steps)
}

/// A non-root node carrying `flags`, as the policy sees it inside a tree.
fn nested_node(flags: &[Flag], skipped: bool) -> StepNode {
    let (tree, ids) = scenario("policy", vec![step("s", 0, flags, Resolution::Noop)]);
    let mut node = tree[ids[0]].clone();
    node.skipped = skipped;
    node
}

/// Child counts and depths in pre-order, for structural comparison.
fn shape(tree: &StepTree, id: NodeId, out: &mut Vec<(usize, usize)>) {
    out.push((tree[id].depth, tree[id].children().len()));
    for &child in tree[id].children() {
        shape(tree, child, out);
    }
}

// ===== Properties =====

proptest! {
    /// Assembled trees keep depth = parent depth + 1 and input order per level.
    #[test]
    fn prop_builder_links_are_consistent(depths in well_formed_depths()) {
        let (tree, ids) = build(&depths);
        prop_assert!(validate_invariants(&tree).is_empty());

        let flattened = tree.flatten(tree.root());
        let expected: Vec<(NodeId, usize)> = ids.iter().copied().zip(depths.iter().copied()).collect();
        prop_assert_eq!(flattened, expected);
    }

    /// Rebuilding from the builder's own flattening reproduces the tree.
    #[test]
    fn prop_rebuild_from_flatten_is_idempotent(depths in well_formed_depths()) {
        let (tree, _) = build(&depths);
        let levels: Vec<usize> = tree.flatten(tree.root()).into_iter().map(|(_, level)| level).collect();
        let (rebuilt, _) = build(&levels);

        let mut before = Vec::new();
        shape(&tree, tree.root(), &mut before);
        let mut after = Vec::new();
        shape(&rebuilt, rebuilt.root(), &mut after);
        prop_assert_eq!(before, after);
    }

    /// `ALWAYS_RUN` wins over every other flag, severity and the skipped mark.
    #[test]
    fn prop_always_run_always_runs(
        flags in flags_strategy(),
        severity in severity_strategy(),
        skipped in any::<bool>(),
    ) {
        let mut flags = flags;
        if !flags.contains(&Flag::AlwaysRun) {
            flags.push(Flag::AlwaysRun);
        }
        let node = nested_node(&flags, skipped);
        prop_assert!(should_run(&node, &ScenarioState::with_severity(severity)));
    }

    /// Unflagged nodes that are not marked skipped run at every severity.
    #[test]
    fn prop_default_policy_ignores_severity(severity in severity_strategy()) {
        let node = nested_node(&[], false);
        prop_assert!(should_run(&node, &ScenarioState::with_severity(severity)));
        let skipped = nested_node(&[], true);
        prop_assert!(!should_run(&skipped, &ScenarioState::with_severity(severity)));
    }

    /// Severity never decreases, and once hard it stays hard.
    #[test]
    fn prop_severity_is_monotonic(outcomes in prop::collection::vec(outcome_strategy(), 0..30)) {
        let mut state = ScenarioState::default();
        let mut previous = state.severity();
        for outcome in outcomes {
            record(&mut state, outcome);
            prop_assert!(state.severity() >= previous);
            if previous == Severity::Hard {
                prop_assert_eq!(state.severity(), Severity::Hard);
                prop_assert!(state.is_complete());
            }
            previous = state.severity();
        }
    }

    /// N branches yield N structurally identical clones that share no lists.
    #[test]
    fn prop_clone_variants_are_independent(
        depths in well_formed_depths(),
        branch_count in 1usize..6,
    ) {
        let mut tree = StepTree::new("clone");
        let mut head = StepNode::new("head", Resolution::Noop);
        head.depth = 1;
        head.flags = vec![Flag::RunIfScenarioFailed];
        head.branches = (0..branch_count).map(|index| format!("b{index}").into()).collect();
        let head = tree.insert(head);
        let nested: Vec<NodeId> = depths
            .iter()
            .map(|depth| {
                let mut node = StepNode::new("nested", Resolution::Noop);
                node.raw_depth = *depth;
                node.flags = vec![Flag::AlwaysRun];
                tree.insert(node)
            })
            .collect();
        build_tree(&mut tree, head, &nested, BuildOptions::default()).expect("build");

        let mut original_shape = Vec::new();
        shape(&tree, head, &mut original_shape);

        let variants = clone_variants(&mut tree, head);
        prop_assert_eq!(variants.len(), branch_count);
        for (index, &variant) in variants.iter().enumerate() {
            let mut variant_shape = Vec::new();
            shape(&tree, variant, &mut variant_shape);
            prop_assert_eq!(&variant_shape, &original_shape);
            let expected_branch = format!("b{index}");
            prop_assert_eq!(tree[variant].branch.as_deref(), Some(expected_branch.as_str()));

            let mut pending = vec![(variant, head)];
            while let Some((copy, source)) = pending.pop() {
                prop_assert_ne!(copy, source);
                prop_assert_eq!(tree[copy].clone_of(), Some(source));
                prop_assert_ne!(tree[copy].flags.as_ptr(), tree[source].flags.as_ptr());
                if !tree[source].children().is_empty() {
                    prop_assert_ne!(tree[copy].children().as_ptr(), tree[source].children().as_ptr());
                }
                for (&a, &b) in tree[copy].children().iter().zip(tree[source].children()) {
                    pending.push((a, b));
                }
            }
        }
    }
}
