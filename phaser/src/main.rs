//! Phase-based task orchestration CLI.
//!
//! Reads a Markdown task document, runs one agent cycle for the next phase
//! with outstanding work, and records metrics under `.phaser/runs/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use phaser::core::selector::phase_status;
use phaser::core::types::Outcome;
use phaser::cycle::{CycleReport, CycleRequest, run_phase};
use phaser::exit_codes;
use phaser::io::config::{PhaserConfig, StoreKind, default_config_path, load_config};
use phaser::io::document::load_document;
use phaser::io::executor::AgentExecutor;
use phaser::io::git::repo_root_for;
use phaser::io::report::{aggregate, render_report};
use phaser::io::task_store::{CommandStore, DocumentStore, TaskStore};
use phaser::logging;
use phaser::select::{SelectOutcome, select_phase};

const DEFAULT_DOCUMENT: &str = "TASKS.md";

#[derive(Parser)]
#[command(
    name = "phaser",
    version,
    about = "Phase-based task orchestration for agent work cycles"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one agent cycle for the next phase with outstanding tasks.
    Run {
        #[arg(default_value = DEFAULT_DOCUMENT)]
        document: PathBuf,
        /// Run this phase instead of the next outstanding one.
        #[arg(long)]
        phase: Option<u32>,
        /// Compile and record the prompt without executing or marking tasks.
        #[arg(long)]
        dry_run: bool,
        /// Let the agent write without approval prompts.
        #[arg(long)]
        allow_writes: bool,
        /// Record the cycle under DIR instead of the configured runs dir.
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
        /// Config file (default: `<repo root>/.phaser/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the number of the next phase with outstanding tasks.
    Next {
        #[arg(default_value = DEFAULT_DOCUMENT)]
        document: PathBuf,
    },
    /// Print per-phase task counts.
    Status {
        #[arg(default_value = DEFAULT_DOCUMENT)]
        document: PathBuf,
    },
    /// Summarize a directory of recorded cycles.
    Summarize { dir: PathBuf },
    /// Apply one status change to a task through the configured store.
    Mark {
        document: PathBuf,
        id: String,
        state: MarkState,
        /// Reason recorded with `blocked`.
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MarkState {
    Picked,
    Done,
    Blocked,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("phaser: {err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            document,
            phase,
            dry_run,
            allow_writes,
            export,
            config,
        } => cmd_run(RunArgs {
            document,
            phase,
            dry_run,
            allow_writes,
            export,
            config,
        }),
        Command::Next { document } => cmd_next(&document),
        Command::Status { document } => cmd_status(&document),
        Command::Summarize { dir } => cmd_summarize(&dir),
        Command::Mark {
            document,
            id,
            state,
            reason,
            config,
        } => cmd_mark(&document, &id, state, reason.as_deref(), config.as_deref()),
    }
}

struct RunArgs {
    document: PathBuf,
    phase: Option<u32>,
    dry_run: bool,
    allow_writes: bool,
    export: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let root = repo_root_for(&args.document);
    let cfg = load_cli_config(&root, args.config.as_deref())?;

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("install interrupt handler")?;

    let executor = AgentExecutor::new(cfg.executor.clone(), interrupt);
    let store = build_store(&cfg, &args.document, &root);
    let request = CycleRequest {
        document_path: args.document,
        phase: args.phase,
        dry_run: args.dry_run,
        allow_writes: args.allow_writes,
        runs_dir: args.export.unwrap_or_else(|| root.join(&cfg.runs_dir)),
        workdir: root,
    };

    let report = run_phase(&executor, store.as_ref(), &request)?;
    Ok(print_report(&report))
}

/// Print the cycle's status line and return the exit code.
fn print_report(report: &CycleReport) -> i32 {
    match report {
        CycleReport::NothingToRun(outcome) => {
            println!("nothing to run: {}", outcome.describe());
            exit_codes::NOTHING_TO_RUN
        }
        CycleReport::DryRun {
            phase,
            prompt,
            run_dir,
            warnings,
        } => {
            println!("{}", prompt.as_str());
            print_warnings(warnings);
            println!("dry run: phase {phase} prompt compiled{}", recorded_in(run_dir));
            exit_codes::OK
        }
        CycleReport::Executed {
            phase,
            result,
            metrics,
            run_dir,
            warnings,
        } => {
            print_warnings(warnings);
            let reason = if result.reason.is_empty() {
                String::new()
            } else {
                format!(" ({})", result.reason)
            };
            println!(
                "phase {phase}: {}{reason} in {:.1}s{}",
                result.outcome,
                metrics.duration_seconds,
                recorded_in(run_dir)
            );
            match result.outcome {
                Outcome::Complete => exit_codes::OK,
                Outcome::Blocked => exit_codes::BLOCKED,
                Outcome::Error => exit_codes::ERROR,
            }
        }
    }
}

fn recorded_in(run_dir: &Option<PathBuf>) -> String {
    run_dir
        .as_ref()
        .map(|dir| format!(", recorded in {}", dir.display()))
        .unwrap_or_default()
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn cmd_next(document: &Path) -> Result<i32> {
    let loaded = load_document(document)?;
    match select_phase(&loaded.document, None) {
        SelectOutcome::Open(number) => {
            println!("{number}");
            Ok(exit_codes::OK)
        }
        other => {
            println!("{}", other.describe());
            Ok(exit_codes::NOTHING_TO_RUN)
        }
    }
}

fn cmd_status(document: &Path) -> Result<i32> {
    let loaded = load_document(document)?;
    for phase in loaded.document.phases.values() {
        let status = phase_status(phase);
        println!(
            "phase {}: {} ({} done, {} in progress, {} pending)",
            phase.number,
            phase.title,
            status.completed.len(),
            status.in_progress.len(),
            status.pending.len()
        );
    }
    let next = select_phase(&loaded.document, None);
    match next.phase() {
        Some(number) => println!("next: phase {number}"),
        None => println!("next: {}", next.describe()),
    }
    Ok(exit_codes::OK)
}

fn cmd_summarize(dir: &Path) -> Result<i32> {
    let (outcome, warnings) = aggregate(dir)?;
    print_warnings(&warnings);
    print!("{}", render_report(&outcome));
    Ok(exit_codes::OK)
}

fn cmd_mark(
    document: &Path,
    id: &str,
    state: MarkState,
    reason: Option<&str>,
    config: Option<&Path>,
) -> Result<i32> {
    let root = repo_root_for(document);
    let cfg = load_cli_config(&root, config)?;
    let store = build_store(&cfg, document, &root);
    match state {
        MarkState::Picked => store.mark_picked(id)?,
        MarkState::Done => store.mark_done(id)?,
        MarkState::Blocked => store.mark_blocked(id, reason.unwrap_or("blocked"))?,
    }
    println!("{id}: {}", state_label(state));
    Ok(exit_codes::OK)
}

fn state_label(state: MarkState) -> &'static str {
    match state {
        MarkState::Picked => "in progress",
        MarkState::Done => "done",
        MarkState::Blocked => "blocked",
    }
}

fn load_cli_config(root: &Path, explicit: Option<&Path>) -> Result<PhaserConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_config_path(root));
    load_config(&path).with_context(|| format!("load config {}", path.display()))
}

fn build_store(cfg: &PhaserConfig, document: &Path, root: &Path) -> Box<dyn TaskStore> {
    match cfg.store.kind {
        StoreKind::Document => Box::new(DocumentStore::new(document)),
        StoreKind::Command => Box::new(CommandStore::new(cfg.store.command.clone(), root)),
    }
}
