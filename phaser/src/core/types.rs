//! Shared deterministic types for cycle classification.

use serde::{Deserialize, Serialize};

/// Classification of one execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The agent printed the phase completion marker.
    Complete,
    /// The agent stopped without finishing (explicitly or otherwise).
    Blocked,
    /// The executor process failed.
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Blocked => "blocked",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw result of one executor invocation, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr text.
    pub output: String,
    /// The user interrupted the run.
    pub interrupted: bool,
}

/// Classified result of one execution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    pub outcome: Outcome,
    /// Empty for `Complete`.
    pub reason: String,
    /// Captured executor output.
    pub output: String,
}
