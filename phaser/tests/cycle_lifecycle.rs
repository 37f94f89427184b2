//! Multi-cycle lifecycle tests.
//!
//! These tests drive `run_phase` through several invocations against a real
//! document store to verify forward progress across phases, that blocked
//! cycles leave the document untouched, and that each cycle re-reads the
//! document.

use std::fs;
use std::path::Path;

use phaser::core::parser::parse_document;
use phaser::core::types::{ExecOutput, Outcome};
use phaser::cycle::{CycleReport, CycleRequest, run_phase};
use phaser::document::TaskStatus;
use phaser::io::report::{ReportOutcome, aggregate};
use phaser::io::task_store::DocumentStore;
use phaser::select::SelectOutcome;
use phaser::test_support::ScriptedExecutor;

const DOCUMENT: &str = "\
## Phase 1: Setup
- [ ] Create crate [id:: setup-crate]
- [ ] Add CI [id:: setup-ci]

## Phase 2: Core
- [ ] Parser [id:: core-parser]
    Single pass, line oriented.
";

fn exec(output: &str) -> ExecOutput {
    ExecOutput {
        exit_code: Some(0),
        output: output.to_string(),
        interrupted: false,
    }
}

fn request(root: &Path) -> CycleRequest {
    CycleRequest {
        document_path: root.join("TASKS.md"),
        phase: None,
        dry_run: false,
        allow_writes: true,
        workdir: root.to_path_buf(),
        runs_dir: root.join(".phaser/runs"),
    }
}

fn outcome_of(report: &CycleReport) -> (u32, Outcome) {
    match report {
        CycleReport::Executed { phase, result, .. } => (*phase, result.outcome),
        other => panic!("expected executed cycle, got {other:?}"),
    }
}

fn statuses(root: &Path) -> Vec<(String, TaskStatus)> {
    let raw = fs::read_to_string(root.join("TASKS.md")).expect("read doc");
    parse_document(&raw)
        .tasks()
        .filter_map(|task| task.id.clone().map(|id| (id, task.status)))
        .collect()
}

/// Execution sequence:
/// 1. Phase 1 blocked: tasks picked, nothing marked done.
/// 2. Phase 1 complete: both tasks done.
/// 3. Phase 2 complete: parser done.
/// 4. Nothing left to run.
#[test]
fn cycles_progress_through_phases() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("TASKS.md"), DOCUMENT).expect("write doc");
    let store = DocumentStore::new(root.join("TASKS.md"));
    let executor = ScriptedExecutor::new([
        exec("BLOCKED: CI token missing\n"),
        exec("PHASE 1 COMPLETE\n"),
        exec("PHASE 2 COMPLETE\n"),
    ]);

    let first = run_phase(&executor, &store, &request(root)).expect("cycle 1");
    assert_eq!(outcome_of(&first), (1, Outcome::Blocked));
    assert_eq!(
        statuses(root),
        vec![
            ("setup-crate".to_string(), TaskStatus::InProgress),
            ("setup-ci".to_string(), TaskStatus::InProgress),
            ("core-parser".to_string(), TaskStatus::Pending),
        ]
    );

    let second = run_phase(&executor, &store, &request(root)).expect("cycle 2");
    assert_eq!(outcome_of(&second), (1, Outcome::Complete));
    // Retried phase shows its tasks as in progress.
    assert!(executor.prompts()[1].contains("- [/] Create crate (setup-crate) (in progress)"));

    let third = run_phase(&executor, &store, &request(root)).expect("cycle 3");
    assert_eq!(outcome_of(&third), (2, Outcome::Complete));
    assert!(executor.prompts()[2].contains("Phase 1 (Setup): 2 tasks completed"));
    assert!(executor.prompts()[2].contains("Single pass, line oriented."));

    let fourth = run_phase(&executor, &store, &request(root)).expect("cycle 4");
    assert!(matches!(
        fourth,
        CycleReport::NothingToRun(SelectOutcome::Complete)
    ));
    assert!(
        statuses(root)
            .iter()
            .all(|(_, status)| *status == TaskStatus::Done)
    );
    assert_eq!(executor.calls(), 3);

    let (outcome, warnings) = aggregate(&root.join(".phaser/runs")).expect("aggregate");
    assert!(warnings.is_empty());
    let ReportOutcome::Summary(report) = outcome else {
        panic!("expected recorded runs");
    };
    assert_eq!(report.runs.len(), 3);
    assert_eq!((report.complete, report.blocked, report.error), (2, 1, 0));
}

#[test]
fn interrupted_cycle_is_blocked_and_leaves_no_done_marks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("TASKS.md"), DOCUMENT).expect("write doc");
    let store = DocumentStore::new(root.join("TASKS.md"));
    let executor = ScriptedExecutor::new([ExecOutput {
        exit_code: None,
        output: "PHASE 1 COMPLETE\n".to_string(),
        interrupted: true,
    }]);

    let report = run_phase(&executor, &store, &request(root)).expect("cycle");
    let CycleReport::Executed { result, .. } = report else {
        panic!("expected executed cycle");
    };
    assert_eq!(result.outcome, Outcome::Blocked);
    assert_eq!(result.reason, "interrupted by user");
    assert!(
        statuses(root)
            .iter()
            .all(|(_, status)| *status != TaskStatus::Done)
    );
}

#[test]
fn edits_between_cycles_are_observed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("TASKS.md"), DOCUMENT).expect("write doc");
    let store = DocumentStore::new(root.join("TASKS.md"));
    let executor = ScriptedExecutor::new([exec("PHASE 2 COMPLETE\n")]);

    let edited = DOCUMENT
        .replace("- [ ] Create crate", "- [x] Create crate")
        .replace("- [ ] Add CI", "- [x] Add CI");
    fs::write(root.join("TASKS.md"), edited).expect("edit doc");

    let report = run_phase(&executor, &store, &request(root)).expect("cycle");
    assert_eq!(outcome_of(&report), (2, Outcome::Complete));
}

#[test]
fn blocked_task_is_retried_and_completed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let raw = "\
---
title: Retry
description: Blocked work comes back
---

## Phase 1: Storage
- [x] Schema [id:: schema]
- [!] Wire db [id:: db] [deps:: schema] [blocked:: no creds]
";
    fs::write(root.join("TASKS.md"), raw).expect("write doc");
    let store = DocumentStore::new(root.join("TASKS.md"));
    let executor = ScriptedExecutor::new([exec("PHASE 1 COMPLETE\n")]);

    let report = run_phase(&executor, &store, &request(root)).expect("cycle");
    assert_eq!(outcome_of(&report), (1, Outcome::Complete));
    let prompt = &executor.prompts()[0];
    assert!(prompt.contains("- [ ] Wire db (db) (previously blocked: no creds)"));
    assert!(prompt.contains("Plan: Blocked work comes back"));

    let updated = fs::read_to_string(root.join("TASKS.md")).expect("read doc");
    assert!(updated.contains("- [x] Wire db [id:: db] [deps:: schema]\n"));
    assert!(!updated.contains("blocked::"));
}
