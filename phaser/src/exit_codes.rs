//! Stable exit codes for phaser CLI commands.

/// Command succeeded, or the cycle completed its phase.
pub const OK: i32 = 0;
/// Invalid document, config, or arguments, or another unexpected failure.
pub const INVALID: i32 = 1;
/// No phase could be selected (all done, missing, or already finished).
pub const NOTHING_TO_RUN: i32 = 2;
/// The cycle ended `blocked`, including user interrupts.
pub const BLOCKED: i32 = 3;
/// The cycle ended `error` (executor failed or exited non-zero).
pub const ERROR: i32 = 4;
