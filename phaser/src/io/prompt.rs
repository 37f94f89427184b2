//! Prompt compilation for one phase.
//!
//! Every part of the prompt degrades to a placeholder instead of failing:
//! missing context files, an empty history, or an absent conventions section
//! never abort compilation. The only error is asking for a phase the
//! document does not contain.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::classifier::completion_marker;
use crate::core::selector::phase_status;
use crate::document::{Phase, Task, TaskDocument};
use crate::io::document::LoadedDocument;
use crate::io::git::{repo_root_for, resolve_in_root};

const PHASE_TEMPLATE: &str = include_str!("prompts/phase.md");

/// Maximum characters inlined per context file.
pub const CONTEXT_CHAR_LIMIT: usize = 5000;
pub const TRUNCATION_MARKER: &str = "\n[... truncated]";
/// Shown when no earlier phase has completed tasks.
pub const NO_PREVIOUS_PHASES: &str = "None.";

static CONVENTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#{1,2}\s+conventions\s*$").expect("conventions header regex")
});
static TOP_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,2}\s").expect("header regex"));

#[derive(Debug, Clone, Serialize)]
struct PhaseContext<'a> {
    number: u32,
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ContextFile {
    path: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct SpecContext {
    heading: String,
    body: String,
}

/// A rendered prompt ready to send to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    pub phase: u32,
    content: String,
}

impl PromptPack {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

/// Compiles phase prompts from a single minijinja template.
pub struct PromptCompiler {
    env: Environment<'static>,
}

impl Default for PromptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptCompiler {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("phase", PHASE_TEMPLATE)
            .expect("phase template should be valid");
        Self { env }
    }

    /// Compile the prompt for `phase` of a loaded document.
    #[instrument(skip_all, fields(phase = phase, path = %loaded.path.display()))]
    pub fn compile(&self, loaded: &LoadedDocument, phase: u32) -> Result<PromptPack> {
        let document = &loaded.document;
        let target = document
            .phase(phase)
            .ok_or_else(|| anyhow!("phase {phase} not found in document"))?;
        let meta = &document.meta;

        let root = repo_root_for(&loaded.path);
        let context_files: Vec<ContextFile> = meta
            .context_files
            .iter()
            .map(|reference| ContextFile {
                path: reference.clone(),
                content: read_context_file(&root, reference),
            })
            .collect();

        let template = self.env.get_template("phase")?;
        let content = template.render(context! {
            title => meta.title.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            summary => meta.description(),
            verify_command => meta.verify_command(),
            tdd => meta.tdd,
            marker => completion_marker(phase),
            phase => PhaseContext {
                number: target.number,
                title: &target.title,
                description: &target.description,
            },
            context_files => context_files,
            previous => previous_phase_summary(document, phase),
            no_previous => NO_PREVIOUS_PHASES,
            tasks => task_lines(target),
            specs => open_task_specs(target),
            conventions => extract_conventions(&loaded.raw),
        })?;

        debug!(chars = content.chars().count(), "prompt compiled");
        Ok(PromptPack { phase, content })
    }
}

/// Read a context file relative to `root`, truncated to [`CONTEXT_CHAR_LIMIT`].
fn read_context_file(root: &Path, reference: &str) -> String {
    let path = resolve_in_root(root, reference);
    match fs::read(&path) {
        Ok(bytes) => truncate_chars(&String::from_utf8_lossy(&bytes), CONTEXT_CHAR_LIMIT),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "context file missing");
            format!("(file not found: {reference})")
        }
        Err(err) => {
            warn!(path = %path.display(), err = %err, "context file unreadable");
            format!("(file unreadable: {reference}: {err})")
        }
    }
}

/// Keep the first `limit` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

fn previous_phase_summary(document: &TaskDocument, phase: u32) -> Vec<String> {
    document
        .phases
        .range(..phase)
        .filter_map(|(number, earlier)| {
            let done = earlier.done_count();
            (done > 0).then(|| {
                let noun = if done == 1 { "task" } else { "tasks" };
                format!("Phase {number} ({}): {done} {noun} completed", earlier.title)
            })
        })
        .collect()
}

fn task_line(task: &Task, suffix: &str) -> String {
    match &task.id {
        Some(id) => format!("- {} {} ({id}){suffix}", task.status.checkbox(), task.content),
        None => format!("- {} {}{suffix}", task.status.checkbox(), task.content),
    }
}

/// Done, in-progress, then pending tasks, each band in document order.
fn task_lines(phase: &Phase) -> Vec<String> {
    let status = phase_status(phase);
    let done = status.completed.iter().map(|task| task_line(task, ""));
    let active = status
        .in_progress
        .iter()
        .map(|task| task_line(task, " (in progress)"));
    let pending = status.pending.iter().map(|task| {
        let suffix = match (task.blocked, task.blocked_reason.as_deref()) {
            (_, Some(reason)) => format!(" (previously blocked: {reason})"),
            (true, None) => " (previously blocked)".to_string(),
            (false, None) => String::new(),
        };
        task_line(task, &suffix)
    });
    done.chain(active).chain(pending).collect()
}

fn open_task_specs(phase: &Phase) -> Vec<SpecContext> {
    phase
        .tasks
        .iter()
        .filter(|task| task.is_open() && !task.spec.trim().is_empty())
        .map(|task| SpecContext {
            heading: match &task.id {
                Some(id) => format!("{} ({id})", task.content),
                None => task.content.clone(),
            },
            body: task.spec.clone(),
        })
        .collect()
}

/// The `Conventions` section, verbatim from its header up to the next
/// top-level header or the end of the document.
pub fn extract_conventions(raw: &str) -> Option<String> {
    let mut lines = raw.lines().skip_while(|line| !CONVENTIONS_RE.is_match(line));
    let header = lines.next()?;
    let body: Vec<&str> = lines.take_while(|line| !TOP_HEADER_RE.is_match(line)).collect();
    let section = std::iter::once(header)
        .chain(body)
        .collect::<Vec<_>>()
        .join("\n");
    Some(section.trim_end().to_string())
}
