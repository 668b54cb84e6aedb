//! Stable exit codes for stepwalk CLI commands.

use crate::core::types::ScenarioStatus;

/// Command succeeded or the scenario passed.
pub const OK: i32 = 0;
/// Invalid plan, config, markers or tree, or any other error.
pub const INVALID: i32 = 1;
/// The scenario ended hard-failed.
pub const FAILED: i32 = 2;
/// The scenario ended soft-failed.
pub const SOFT_FAILED: i32 = 3;
/// The scenario was aborted before completing.
pub const ABORTED: i32 = 4;

pub fn for_status(status: ScenarioStatus) -> i32 {
    match status {
        ScenarioStatus::Passed => OK,
        ScenarioStatus::SoftFailed => SOFT_FAILED,
        ScenarioStatus::Failed => FAILED,
        ScenarioStatus::Aborted => ABORTED,
    }
}
