//! Deterministic classification of captured executor output.

use crate::core::types::{CycleResult, ExecOutput, Outcome};

/// Line prefix an agent uses to report that it cannot proceed.
pub const BLOCKED_PREFIX: &str = "BLOCKED:";
pub const INTERRUPTED_REASON: &str = "interrupted by user";
pub const NO_MARKER_REASON: &str = "finished without completion marker";

/// Marker an agent prints once every task in `phase` is done.
pub fn completion_marker(phase: u32) -> String {
    format!("PHASE {phase} COMPLETE")
}

/// Classify a finished executor run.
///
/// Priority: user interrupt, completion marker, `BLOCKED:` line, non-zero
/// exit, then a default `Blocked`.
pub fn classify(exec: &ExecOutput, phase: u32) -> (Outcome, String) {
    if exec.interrupted {
        return (Outcome::Blocked, INTERRUPTED_REASON.to_string());
    }
    if exec.output.contains(&completion_marker(phase)) {
        return (Outcome::Complete, String::new());
    }
    if let Some(reason) = exec
        .output
        .lines()
        .find_map(|line| line.strip_prefix(BLOCKED_PREFIX))
    {
        return (Outcome::Blocked, reason.trim().to_string());
    }
    match exec.exit_code {
        Some(0) => (Outcome::Blocked, NO_MARKER_REASON.to_string()),
        Some(code) => (Outcome::Error, format!("executor exited with code {code}")),
        None => (Outcome::Error, "executor terminated by signal".to_string()),
    }
}

/// Classify and keep the captured output alongside the outcome.
pub fn into_cycle_result(exec: ExecOutput, phase: u32) -> CycleResult {
    let (outcome, reason) = classify(&exec, phase);
    CycleResult {
        outcome,
        reason,
        output: exec.output,
    }
}
