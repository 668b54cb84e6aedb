//! Execution core of a behavior-driven test runner.
//!
//! Annotated steps are assembled into a tree of [`tree::StepNode`]s and
//! walked depth-first. Conditional flags decide which steps run given the
//! scenario's failure severity, and a hard failure prunes everything the
//! flags do not explicitly ask for. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (markers, assembly, run policy,
//!   failure state, cloning, mode gating). No I/O.
//! - **[`io`]**: Side effects (config, step plans, report files).
//!
//! [`scenario`], [`hooks`] and [`walker`] compose the core into an executable
//! scenario; [`simulate`] drives them from a step plan for the CLI.

pub mod core;
pub mod exit_codes;
pub mod hooks;
pub mod io;
pub mod logging;
pub mod scenario;
pub mod simulate;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
pub mod walker;
