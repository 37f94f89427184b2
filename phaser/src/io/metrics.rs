//! Per-cycle run metrics and their on-disk artifacts.
//!
//! Each cycle gets one directory under the runs dir:
//!
//! ```text
//! <runs_dir>/<YYYYmmdd-HHMMSS>-phase-<NN>/
//!   metrics.json   structured record
//!   prompt.md      compiled prompt
//!   output.txt     captured executor output (when there is any)
//!   tasks.md       document snapshot taken at cycle start
//!   summary.txt    human-readable rendering of the record
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::selector::phase_status;
use crate::core::types::{CycleResult, Outcome};
use crate::document::{Phase, TaskDocument};

pub const METRICS_FILE: &str = "metrics.json";
pub const PROMPT_FILE: &str = "prompt.md";
pub const OUTPUT_FILE: &str = "output.txt";
pub const SNAPSHOT_FILE: &str = "tasks.md";
pub const SUMMARY_FILE: &str = "summary.txt";

/// Coarse characters-per-token ratio for prompt size estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Measurements for one execution cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetrics {
    pub phase: u32,
    pub phase_title: String,
    pub total_tasks: usize,
    /// Tasks not yet done when the cycle started.
    pub pending_tasks: usize,
    /// Tasks of this phase already done when the cycle started.
    pub completed_before: usize,
    /// Done tasks across all lower-numbered phases.
    pub completed_previous_phases: usize,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: f64,
    pub prompt_chars: usize,
    pub prompt_lines: usize,
    pub prompt_tokens: usize,
    pub output_chars: usize,
    pub output_lines: usize,
    pub outcome: Option<Outcome>,
    pub reason: String,
    pub dry_run: bool,
}

impl RunMetrics {
    /// Record everything known before the executor runs.
    pub fn begin(document: &TaskDocument, phase: &Phase, prompt: &str) -> Self {
        let status = phase_status(phase);
        let prompt_chars = prompt.chars().count();
        Self {
            phase: phase.number,
            phase_title: phase.title.clone(),
            total_tasks: status.total(),
            pending_tasks: status.pending.len() + status.in_progress.len(),
            completed_before: status.completed.len(),
            completed_previous_phases: document.completed_before(phase.number),
            prompt_chars,
            prompt_lines: prompt.lines().count(),
            prompt_tokens: prompt_chars / CHARS_PER_TOKEN,
            ..Self::default()
        }
    }

    /// Fill timing, output size, and the classified outcome.
    pub fn finish(&mut self, started: DateTime<Utc>, ended: DateTime<Utc>, result: &CycleResult) {
        let duration = ended - started;
        self.started_at = Some(started.to_rfc3339());
        self.ended_at = Some(ended.to_rfc3339());
        self.duration_seconds = duration.num_milliseconds().max(0) as f64 / 1000.0;
        self.output_chars = result.output.chars().count();
        self.output_lines = result.output.lines().count();
        self.outcome = Some(result.outcome);
        self.reason = result.reason.clone();
    }

    /// Render the short human-readable summary written to `summary.txt`.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Phase {}: {}\n", self.phase, self.phase_title));
        let outcome = match (self.dry_run, self.outcome) {
            (true, _) => "dry run",
            (false, Some(outcome)) => outcome.as_str(),
            (false, None) => "unknown",
        };
        out.push_str(&format!("Outcome: {outcome}\n"));
        if !self.reason.is_empty() {
            out.push_str(&format!("Reason: {}\n", self.reason));
        }
        out.push_str(&format!(
            "Tasks: {} total, {} pending at start, {} completed before\n",
            self.total_tasks, self.pending_tasks, self.completed_before
        ));
        out.push_str(&format!(
            "Completed in previous phases: {}\n",
            self.completed_previous_phases
        ));
        if let Some(started) = &self.started_at {
            out.push_str(&format!("Started: {started}\n"));
            out.push_str(&format!("Duration: {:.1}s\n", self.duration_seconds));
        }
        out.push_str(&format!(
            "Prompt: {} chars, {} lines, ~{} tokens\n",
            self.prompt_chars, self.prompt_lines, self.prompt_tokens
        ));
        if !self.dry_run {
            out.push_str(&format!(
                "Output: {} chars, {} lines\n",
                self.output_chars, self.output_lines
            ));
        }
        out
    }
}

/// Everything persisted for one cycle.
#[derive(Debug)]
pub struct RunArtifacts<'a> {
    pub metrics: &'a RunMetrics,
    pub prompt: &'a str,
    /// Captured executor output; skipped when `None` or empty.
    pub output: Option<&'a str>,
    /// Raw document text at cycle start.
    pub snapshot: &'a str,
}

/// Where a cycle was recorded, and which artifacts failed to write.
#[derive(Debug)]
pub struct RecordedRun {
    pub dir: PathBuf,
    pub errors: Vec<String>,
}

/// Directory name for a cycle: `<YYYYmmdd-HHMMSS>-phase-<NN>`.
pub fn run_dir_name(started: DateTime<Utc>, phase: u32) -> String {
    format!("{}-phase-{phase:02}", started.format("%Y%m%d-%H%M%S"))
}

/// Create a fresh run directory, suffixing `-2`, `-3`, ... on collision.
fn create_run_dir(runs_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(runs_dir)
        .with_context(|| format!("create runs dir {}", runs_dir.display()))?;
    let mut candidate = runs_dir.join(name);
    let mut n = 2;
    while candidate.exists() {
        candidate = runs_dir.join(format!("{name}-{n}"));
        n += 1;
    }
    fs::create_dir(&candidate)
        .with_context(|| format!("create run dir {}", candidate.display()))?;
    Ok(candidate)
}

/// Persist the cycle's artifacts.
///
/// Only failing to create the run directory is an error. Each artifact is
/// written independently; failures are collected and logged.
#[instrument(skip_all, fields(phase = artifacts.metrics.phase, runs_dir = %runs_dir.display()))]
pub fn write_run_artifacts(
    runs_dir: &Path,
    started: DateTime<Utc>,
    artifacts: &RunArtifacts<'_>,
) -> Result<RecordedRun> {
    let dir = create_run_dir(runs_dir, &run_dir_name(started, artifacts.metrics.phase))?;
    let mut errors = Vec::new();

    match serde_json::to_string_pretty(artifacts.metrics) {
        Ok(json) => write_artifact(&dir, METRICS_FILE, &format!("{json}\n"), &mut errors),
        Err(err) => errors.push(format!("{METRICS_FILE}: {err}")),
    }
    write_artifact(&dir, PROMPT_FILE, artifacts.prompt, &mut errors);
    if let Some(output) = artifacts.output.filter(|output| !output.is_empty()) {
        write_artifact(&dir, OUTPUT_FILE, output, &mut errors);
    }
    write_artifact(&dir, SNAPSHOT_FILE, artifacts.snapshot, &mut errors);
    write_artifact(
        &dir,
        SUMMARY_FILE,
        &artifacts.metrics.render_summary(),
        &mut errors,
    );

    if !errors.is_empty() {
        warn!(errors = ?errors, "artifact write had errors");
    }
    debug!(dir = %dir.display(), "run recorded");
    Ok(RecordedRun { dir, errors })
}

fn write_artifact(dir: &Path, name: &str, contents: &str, errors: &mut Vec<String>) {
    let path = dir.join(name);
    if let Err(err) = fs::write(&path, contents) {
        errors.push(format!("{name}: {err}"));
    }
}

/// Load a recorded `metrics.json`.
pub fn read_metrics(path: &Path) -> Result<RunMetrics> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
