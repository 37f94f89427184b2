//! Orchestration for a single `phaser run` cycle.
//!
//! Parse → select → compile → execute → record, once per invocation. The
//! document is re-read on every call; nothing is cached between cycles.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::core::types::{CycleResult, Outcome};
use crate::document::{Phase, TaskStatus};
use crate::io::document::load_document;
use crate::io::executor::{ExecRequest, Executor, run_cycle};
use crate::io::metrics::{RunArtifacts, RunMetrics, write_run_artifacts};
use crate::io::prompt::{PromptCompiler, PromptPack};
use crate::io::task_store::TaskStore;
use crate::select::{SelectOutcome, select_phase};

/// Inputs for one cycle.
#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub document_path: PathBuf,
    /// Explicit phase; `None` selects the next phase with outstanding work.
    pub phase: Option<u32>,
    /// Compile and record without executing or mutating.
    pub dry_run: bool,
    pub allow_writes: bool,
    /// Working directory for the executor.
    pub workdir: PathBuf,
    /// Parent directory for recorded cycles.
    pub runs_dir: PathBuf,
}

/// Result of one cycle.
#[derive(Debug)]
pub enum CycleReport {
    /// No phase could be selected.
    NothingToRun(SelectOutcome),
    DryRun {
        phase: u32,
        prompt: PromptPack,
        run_dir: Option<PathBuf>,
        warnings: Vec<String>,
    },
    Executed {
        phase: u32,
        result: CycleResult,
        metrics: RunMetrics,
        run_dir: Option<PathBuf>,
        /// Store and artifact failures. None of them stop the cycle.
        warnings: Vec<String>,
    },
}

/// Run one cycle against the document at `request.document_path`.
///
/// Errors only when the document cannot be read or violates an invariant.
/// Execution failures are classified outcomes; store and artifact failures
/// are collected as warnings.
#[instrument(skip_all, fields(doc = %request.document_path.display(), phase = ?request.phase, dry_run = request.dry_run))]
pub fn run_phase<E: Executor, S: TaskStore + ?Sized>(
    executor: &E,
    store: &S,
    request: &CycleRequest,
) -> Result<CycleReport> {
    let loaded = load_document(&request.document_path)?;
    let number = match select_phase(&loaded.document, request.phase) {
        SelectOutcome::Open(number) => number,
        other => {
            info!(outcome = ?other, "nothing to run");
            return Ok(CycleReport::NothingToRun(other));
        }
    };
    let phase = loaded
        .document
        .phase(number)
        .ok_or_else(|| anyhow!("selected phase {number} missing from document"))?;

    let prompt = PromptCompiler::new().compile(&loaded, number)?;
    let mut metrics = RunMetrics::begin(&loaded.document, phase, prompt.as_str());
    let mut warnings = Vec::new();

    if request.dry_run {
        metrics.dry_run = true;
        let run_dir = record(
            &request.runs_dir,
            &RunArtifacts {
                metrics: &metrics,
                prompt: prompt.as_str(),
                output: None,
                snapshot: &loaded.raw,
            },
            &mut warnings,
        );
        return Ok(CycleReport::DryRun {
            phase: number,
            prompt,
            run_dir,
            warnings,
        });
    }

    for id in task_ids(phase, |status| status == TaskStatus::Pending) {
        if let Err(err) = store.mark_picked(id) {
            warn!(id, err = %format!("{err:#}"), "mark picked failed");
            warnings.push(format!("mark picked {id}: {err:#}"));
        }
    }

    let started = Utc::now();
    let result = run_cycle(
        executor,
        &ExecRequest {
            workdir: request.workdir.clone(),
            prompt: prompt.as_str().to_string(),
            phase: number,
            allow_writes: request.allow_writes,
        },
    );
    let ended = Utc::now();
    metrics.finish(started, ended, &result);

    if result.outcome == Outcome::Complete {
        for id in task_ids(phase, TaskStatus::is_open) {
            if let Err(err) = store.mark_done(id) {
                warn!(id, err = %format!("{err:#}"), "mark done failed");
                warnings.push(format!("mark done {id}: {err:#}"));
            }
        }
    }

    let run_dir = record(
        &request.runs_dir,
        &RunArtifacts {
            metrics: &metrics,
            prompt: prompt.as_str(),
            output: Some(&result.output),
            snapshot: &loaded.raw,
        },
        &mut warnings,
    );

    info!(phase = number, outcome = %result.outcome, "cycle finished");
    Ok(CycleReport::Executed {
        phase: number,
        result,
        metrics,
        run_dir,
        warnings,
    })
}

/// Ids of the phase's tasks whose status at cycle start matches `filter`.
fn task_ids(phase: &Phase, filter: impl Fn(TaskStatus) -> bool) -> Vec<&str> {
    phase
        .tasks
        .iter()
        .filter(|task| filter(task.status))
        .filter_map(|task| task.id.as_deref())
        .collect()
}

fn record(
    runs_dir: &Path,
    artifacts: &RunArtifacts<'_>,
    warnings: &mut Vec<String>,
) -> Option<PathBuf> {
    match write_run_artifacts(runs_dir, Utc::now(), artifacts) {
        Ok(recorded) => {
            warnings.extend(recorded.errors.into_iter().map(|err| format!("artifact {err}")));
            Some(recorded.dir)
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "recording run failed");
            warnings.push(format!("record run: {err:#}"));
            None
        }
    }
}
