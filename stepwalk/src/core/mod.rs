//! Deterministic, pure logic of the execution core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod builder;
pub mod cloner;
pub mod failure;
pub mod invariants;
pub mod markers;
pub mod mode;
pub mod path;
pub mod policy;
pub mod types;
