//! Aggregation over a directory of recorded cycles.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::types::Outcome;
use crate::io::metrics::{METRICS_FILE, RunMetrics, read_metrics};

/// One row of the per-run table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub name: String,
    pub metrics: RunMetrics,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Rows in discovery order (run dir names sort chronologically).
    pub runs: Vec<RunRow>,
    pub total_duration_seconds: f64,
    /// Tasks that were not done when their cycle started.
    pub total_attempted_tasks: usize,
    pub total_prompt_tokens: usize,
    pub total_output_chars: usize,
    pub complete: usize,
    pub blocked: usize,
    pub error: usize,
    /// Dry runs and records without an outcome.
    pub other: usize,
}

impl RunReport {
    pub fn avg_seconds_per_task(&self) -> f64 {
        ratio(self.total_duration_seconds, self.total_attempted_tasks)
    }

    pub fn avg_tokens_per_phase(&self) -> f64 {
        ratio(self.total_prompt_tokens as f64, self.runs.len())
    }

    /// Blocked runs with their reasons, in discovery order.
    pub fn blocked_runs(&self) -> impl Iterator<Item = &RunRow> {
        self.runs
            .iter()
            .filter(|row| row.metrics.outcome == Some(Outcome::Blocked))
    }

    fn add(&mut self, name: String, metrics: RunMetrics) {
        self.total_duration_seconds += metrics.duration_seconds;
        self.total_attempted_tasks += metrics.pending_tasks;
        self.total_prompt_tokens += metrics.prompt_tokens;
        self.total_output_chars += metrics.output_chars;
        match metrics.outcome {
            Some(Outcome::Complete) if !metrics.dry_run => self.complete += 1,
            Some(Outcome::Blocked) if !metrics.dry_run => self.blocked += 1,
            Some(Outcome::Error) if !metrics.dry_run => self.error += 1,
            _ => self.other += 1,
        }
        self.runs.push(RunRow { name, metrics });
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 || total == 0.0 {
        0.0
    } else {
        total / count as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    NoRuns,
    Summary(RunReport),
}

/// Subdirectories of `runs_dir` holding a metrics record, sorted by name.
pub fn load_run_dirs(runs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in
        fs::read_dir(runs_dir).with_context(|| format!("read {}", runs_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if path.is_dir() && path.join(METRICS_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Load every record under `runs_dir`. Unreadable records become warnings.
pub fn aggregate(runs_dir: &Path) -> Result<(ReportOutcome, Vec<String>)> {
    let mut report = RunReport::default();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(runs_dir)? {
        let metrics = match read_metrics(&run_dir.join(METRICS_FILE)) {
            Ok(metrics) => metrics,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: {METRICS_FILE} invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };
        let name = run_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        report.add(name, metrics);
    }

    if report.runs.is_empty() {
        return Ok((ReportOutcome::NoRuns, warnings));
    }
    Ok((ReportOutcome::Summary(report), warnings))
}

/// Plain-text rendering of an aggregation result.
pub fn render_report(outcome: &ReportOutcome) -> String {
    let report = match outcome {
        ReportOutcome::NoRuns => return "no runs found\n".to_string(),
        ReportOutcome::Summary(report) => report,
    };

    let mut out = String::new();
    out.push_str(&format!(
        "{:<28} {:>5} {:<9} {:>5} {:>9} {:>8} {:>8}\n",
        "run", "phase", "outcome", "tasks", "secs", "tokens", "output"
    ));
    for row in &report.runs {
        let m = &row.metrics;
        let outcome = if m.dry_run {
            "dry-run"
        } else {
            m.outcome.map_or("-", Outcome::as_str)
        };
        out.push_str(&format!(
            "{:<28} {:>5} {:<9} {:>5} {:>9.1} {:>8} {:>8}\n",
            row.name,
            m.phase,
            outcome,
            m.pending_tasks,
            m.duration_seconds,
            m.prompt_tokens,
            m.output_chars
        ));
    }

    out.push('\n');
    out.push_str(&format!(
        "runs: {} (complete {}, blocked {}, error {}, other {})\n",
        report.runs.len(),
        report.complete,
        report.blocked,
        report.error,
        report.other
    ));
    out.push_str(&format!(
        "total: {:.1}s, {} tasks attempted, {} prompt tokens, {} output chars\n",
        report.total_duration_seconds,
        report.total_attempted_tasks,
        report.total_prompt_tokens,
        report.total_output_chars
    ));
    out.push_str(&format!(
        "average: {:.1}s per task, {:.0} tokens per phase\n",
        report.avg_seconds_per_task(),
        report.avg_tokens_per_phase()
    ));

    let mut blocked = report.blocked_runs().peekable();
    if blocked.peek().is_some() {
        out.push('\n');
        out.push_str("blocked:\n");
        for row in blocked {
            out.push_str(&format!(
                "  phase {} ({}): {}\n",
                row.metrics.phase, row.name, row.metrics.reason
            ));
        }
    }
    out
}
