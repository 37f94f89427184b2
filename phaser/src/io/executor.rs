//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples cycle orchestration from the actual agent
//! backend. [`AgentExecutor`] spawns the configured program; tests use
//! scripted executors that return predetermined output without spawning
//! processes.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::classifier::into_cycle_result;
use crate::core::types::{CycleResult, ExecOutput, Outcome};
use crate::io::config::{ExecutorConfig, PromptInput};
use crate::io::process::run_command_captured;

/// Parameters for an executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the executor process.
    pub workdir: PathBuf,
    /// Compiled prompt.
    pub prompt: String,
    /// Phase the prompt targets.
    pub phase: u32,
    /// Waive write-approval prompts in the agent.
    pub allow_writes: bool,
}

/// Abstraction over agent execution backends.
pub trait Executor {
    /// Run the agent once and return its exit status and full output.
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutput>;
}

/// Executor that spawns the configured agent program.
#[derive(Debug, Clone)]
pub struct AgentExecutor {
    config: ExecutorConfig,
    interrupt: Arc<AtomicBool>,
}

impl AgentExecutor {
    pub fn new(config: ExecutorConfig, interrupt: Arc<AtomicBool>) -> Self {
        Self { config, interrupt }
    }

    fn command(&self, request: &ExecRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        if request.allow_writes
            && let Some(flag) = &self.config.write_flag
        {
            cmd.arg(flag);
        }
        if self.config.prompt_input == PromptInput::Argument {
            cmd.arg(&request.prompt);
        }
        cmd.current_dir(&request.workdir);
        cmd
    }
}

impl Executor for AgentExecutor {
    #[instrument(skip_all, fields(program = %self.config.program, phase = request.phase, allow_writes = request.allow_writes))]
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        info!(workdir = %request.workdir.display(), "starting agent");
        let stdin = match self.config.prompt_input {
            PromptInput::Stdin => Some(request.prompt.as_bytes()),
            PromptInput::Argument => None,
        };
        let output = run_command_captured(self.command(request), stdin, &self.interrupt)
            .with_context(|| format!("run {}", self.config.program))?;
        Ok(ExecOutput {
            exit_code: output.status.code(),
            output: output.output_lossy(),
            interrupted: output.interrupted,
        })
    }
}

/// Run one execution cycle and classify the result.
///
/// Executor failures (e.g. the program cannot be spawned) are reported as an
/// `Error` outcome rather than propagated.
#[instrument(skip_all, fields(phase = request.phase))]
pub fn run_cycle<E: Executor>(executor: &E, request: &ExecRequest) -> CycleResult {
    match executor.exec(request) {
        Ok(exec) => {
            let result = into_cycle_result(exec, request.phase);
            info!(outcome = %result.outcome, reason = %result.reason, "cycle classified");
            result
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "executor failed");
            CycleResult {
                outcome: Outcome::Error,
                reason: format!("{err:#}"),
                output: String::new(),
            }
        }
    }
}
