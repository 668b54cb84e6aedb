//! Scenario assembly: raw annotated steps become an executable tree.
//!
//! Pipeline: lex each annotation, resolve each text through a
//! [`StepResolver`], attach attached steps, expand branched steps, then build
//! the nesting under a fresh scenario root.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::builder::{BuildError, BuildOptions, build_tree};
use crate::core::cloner::expand_branches;
use crate::core::markers::{MarkerError, lex_annotation};
use crate::tree::{NodeId, Resolution, SourceLocation, StepNode, StepTree};

/// Step as produced by the feature parser, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStep {
    pub text: String,
    /// Marker prefix carrying depth, flags and tags (e.g. `::[@:ALWAYS_RUN]`).
    pub annotation: String,
    pub line: u32,
    /// Data-driven values; the step and its nested run repeat once per value.
    pub branches: Vec<String>,
    /// Steps attached to this one. Their annotation depth is ignored.
    pub attached: Vec<RawStep>,
}

impl RawStep {
    pub fn new(annotation: &str, text: &str) -> Self {
        Self {
            text: text.to_string(),
            annotation: annotation.to_string(),
            ..Self::default()
        }
    }
}

/// Abstraction over step-definition lookup.
pub trait StepResolver {
    fn resolve(&self, text: &str) -> Resolution;
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("step {index} ('{text}'): {source}")]
    Marker {
        index: usize,
        text: String,
        #[source]
        source: MarkerError,
    },
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Assemble `steps` into a tree named `name`.
pub fn prepare_scenario<R: StepResolver + ?Sized>(
    name: &str,
    file: Option<&str>,
    steps: &[RawStep],
    resolver: &R,
    options: BuildOptions,
) -> Result<StepTree, PrepareError> {
    let mut tree = StepTree::new(name);
    let mut sequence = Vec::with_capacity(steps.len());
    for (index, raw) in steps.iter().enumerate() {
        let id = insert_step(&mut tree, file, index, raw, resolver)?;
        for attached in &raw.attached {
            let node = lex_step(file, index, attached, resolver)?;
            tree.attach(id, node);
        }
        sequence.push(id);
    }

    let expanded = expand_branches(&mut tree, &sequence);
    let root = tree.root();
    build_tree(&mut tree, root, &expanded, options)?;
    debug!(scenario = name, steps = steps.len(), nodes = tree.len(), "scenario prepared");
    Ok(tree)
}

fn insert_step<R: StepResolver + ?Sized>(
    tree: &mut StepTree,
    file: Option<&str>,
    index: usize,
    raw: &RawStep,
    resolver: &R,
) -> Result<NodeId, PrepareError> {
    let mut node = lex_step(file, index, raw, resolver)?;
    node.branches = raw.branches.iter().map(|value| Arc::from(value.as_str())).collect();
    Ok(tree.insert(node))
}

fn lex_step<R: StepResolver + ?Sized>(
    file: Option<&str>,
    index: usize,
    raw: &RawStep,
    resolver: &R,
) -> Result<StepNode, PrepareError> {
    let annotation = lex_annotation(&raw.annotation).map_err(|source| PrepareError::Marker {
        index,
        text: raw.text.clone(),
        source,
    })?;
    let mut node = StepNode::new(raw.text.clone(), resolver.resolve(&raw.text));
    annotation.apply(&mut node);
    node.location = SourceLocation {
        file: file.map(str::to_string),
        line: raw.line,
    };
    Ok(node)
}
