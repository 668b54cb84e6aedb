//! I/O helpers for stepwalk commands.

pub mod config;
pub mod plan;
pub mod report_log;
