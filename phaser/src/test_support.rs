//! Test-only fixtures: a sample document, task builders, a scripted executor
//! and a recording store.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::ExecOutput;
use crate::document::{Task, TaskStatus};
use crate::io::executor::{ExecRequest, Executor};
use crate::io::task_store::TaskStore;

/// Document exercising metadata, sections, spec bodies, a display-only task,
/// a phase gap and a conventions section.
pub const SAMPLE_DOCUMENT: &str = "---
title: Sample project
description: A small crate built in phases.
verify: cargo test
tdd: true
context_files:
  - docs/design.md
---

# Sample project

## Phase 1: Scaffolding
Set up the crate layout.
Keep it small.

### 1.1 Layout
- [x] Create crate [id:: p1-crate]
- [/] Wire logging [id:: p1-log] [deps:: p1-crate]
    Use tracing with an env filter.

### 1.2 Config
- [ ] Add config loader [id:: p1-config]
    Load `config.toml` with defaults.

    Reject empty program names.

## Phase 2: Engine
- [ ] Parse documents [id:: p2-parse]
- [ ] Note the edge cases

## Phase 4: Release
- [x] Tag release [id:: p4-tag]

## Conventions
Use snake_case for files.
Prefer small modules.
";

/// Create a deterministic task with an id and no body.
pub fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: Some(id.to_string()),
        content: format!("{id} content"),
        status,
        spec: String::new(),
        section: None,
        dependencies: Vec::new(),
        blocked: false,
        blocked_reason: None,
        line: 0,
    }
}

/// Executor that replays queued outputs and records every prompt it sees.
///
/// An exhausted queue is reported as an executor failure.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outputs: RefCell<VecDeque<ExecOutput>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(outputs: impl IntoIterator<Item = ExecOutput>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Executor whose single run exits 0 with `output`.
    pub fn printing(output: &str) -> Self {
        Self::new([ExecOutput {
            exit_code: Some(0),
            output: output.to_string(),
            interrupted: false,
        }])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor has no output left"))
    }
}

/// One recorded store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Picked(String),
    Done(String),
    Blocked(String, String),
}

/// Store that records calls in order and fails for selected ids.
#[derive(Debug, Default)]
pub struct RecordingStore {
    calls: RefCell<Vec<StoreCall>>,
    failing: Vec<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose mutations fail for every id in `ids`. Failed calls are
    /// still recorded.
    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, id: &str, call: StoreCall) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.failing.iter().any(|failing| failing == id) {
            return Err(anyhow!("store rejected '{id}'"));
        }
        Ok(())
    }
}

impl TaskStore for RecordingStore {
    fn mark_picked(&self, id: &str) -> Result<()> {
        self.record(id, StoreCall::Picked(id.to_string()))
    }

    fn mark_done(&self, id: &str) -> Result<()> {
        self.record(id, StoreCall::Done(id.to_string()))
    }

    fn mark_blocked(&self, id: &str, reason: &str) -> Result<()> {
        self.record(id, StoreCall::Blocked(id.to_string(), reason.to_string()))
    }
}
