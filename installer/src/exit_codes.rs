//! Stable exit codes for installer CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid input, configuration, or any other error.
pub const INVALID: i32 = 1;
/// The transcript carried nothing the command could act on.
pub const NOTHING_TO_DO: i32 = 2;
/// The run completed but at least one item failed.
pub const FAILURES: i32 = 3;
/// The user declined the confirmation prompt.
pub const CANCELLED: i32 = 4;
