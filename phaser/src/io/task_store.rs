//! Task status persistence.
//!
//! Every mutation is one isolated call keyed by task id. Callers issue them
//! serially and treat each failure independently; there is no batching and
//! no rollback.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tracing::{debug, instrument};

use crate::core::parser::parse_document;
use crate::document::{BLOCKED_MARKER, TaskStatus};

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-*]\s+)\[(.)\](\s+.*)$").expect("checkbox regex"));
static BLOCKED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[blocked::?[^\]]*\]").expect("blocked annotation regex")
});

/// Mutating operations on task status.
pub trait TaskStore {
    /// `pending → in_progress`. Started tasks are left alone; done tasks are
    /// refused.
    fn mark_picked(&self, id: &str) -> Result<()>;
    /// Any status to `done`.
    fn mark_done(&self, id: &str) -> Result<()>;
    /// Record that the task cannot proceed, with a reason. Done tasks are
    /// refused.
    fn mark_blocked(&self, id: &str, reason: &str) -> Result<()>;
}

/// Store that rewrites checkbox markers in the task document itself.
///
/// Blocked tasks get the `[!]` marker and a `[blocked:: reason]` field;
/// `mark_done` clears the field again. Only lines the parser reads as phase
/// tasks are ever rewritten.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

/// One checkbox line split around its marker.
struct CheckboxLine<'a> {
    status: TaskStatus,
    /// Text after the closing bracket, leading whitespace included.
    rest: &'a str,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `edit` to the task line carrying `id`. `Ok(None)` leaves the
    /// document untouched.
    fn update(
        &self,
        id: &str,
        edit: impl Fn(CheckboxLine<'_>) -> Result<Option<String>>,
    ) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let index = parse_document(&contents)
            .find_task(id)
            .map(|task| task.line)
            .ok_or_else(|| anyhow!("task '{id}' not found in {}", self.path.display()))?;

        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        let line = lines
            .get(index)
            .ok_or_else(|| anyhow!("task '{id}' points past the end of the document"))?;
        let caps = CHECKBOX_RE
            .captures(line)
            .ok_or_else(|| anyhow!("task '{id}' is not on a checkbox line"))?;
        let status = caps[2]
            .chars()
            .next()
            .and_then(TaskStatus::from_marker)
            .ok_or_else(|| anyhow!("task '{id}' has an unknown checkbox marker"))?;

        let Some(rest) = edit(CheckboxLine {
            status,
            rest: caps.get(3).map_or("", |m| m.as_str()),
        })
        .with_context(|| format!("task '{id}'"))?
        else {
            debug!(id, "task already in requested state");
            return Ok(());
        };
        let updated = format!("{}{}", &caps[1], rest);
        lines[index] = updated;

        let mut buf = lines.join("\n");
        if contents.ends_with('\n') {
            buf.push('\n');
        }
        write_atomic(&self.path, &buf)
    }
}

impl TaskStore for DocumentStore {
    #[instrument(skip_all, fields(id = %id))]
    fn mark_picked(&self, id: &str) -> Result<()> {
        self.update(id, |line| match line.status {
            TaskStatus::Done => bail!("already done"),
            TaskStatus::InProgress => Ok(None),
            TaskStatus::Pending => Ok(Some(format!(
                "{}{}",
                TaskStatus::InProgress.checkbox(),
                line.rest
            ))),
        })
    }

    #[instrument(skip_all, fields(id = %id))]
    fn mark_done(&self, id: &str) -> Result<()> {
        self.update(id, |line| {
            let cleaned = BLOCKED_RE.replace_all(line.rest, "");
            Ok((line.status != TaskStatus::Done || cleaned != line.rest)
                .then(|| format!("{}{}", TaskStatus::Done.checkbox(), cleaned)))
        })
    }

    #[instrument(skip_all, fields(id = %id))]
    fn mark_blocked(&self, id: &str, reason: &str) -> Result<()> {
        let reason = reason.replace([']', '\n'], " ");
        let reason = reason.trim();
        self.update(id, |line| {
            if line.status == TaskStatus::Done {
                bail!("already done");
            }
            let cleaned = BLOCKED_RE.replace_all(line.rest, "");
            Ok(Some(format!(
                "[{BLOCKED_MARKER}]{} [blocked:: {reason}]",
                cleaned.trim_end()
            )))
        })
    }
}

/// Store that delegates each mutation to an external command:
/// `<command...> <pick|done|blocked> <id> [reason]`.
#[derive(Debug, Clone)]
pub struct CommandStore {
    command: Vec<String>,
    workdir: PathBuf,
}

impl CommandStore {
    pub fn new(command: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            workdir: workdir.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        let (program, base) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("store command is empty"))?;
        let output = Command::new(program)
            .args(base)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn {program} {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{program} {} failed ({:?}): {}",
                args.join(" "),
                output.status.code(),
                stderr.trim()
            ));
        }
        Ok(())
    }
}

impl TaskStore for CommandStore {
    #[instrument(skip_all, fields(id = %id))]
    fn mark_picked(&self, id: &str) -> Result<()> {
        self.run(&["pick", id])
    }

    #[instrument(skip_all, fields(id = %id))]
    fn mark_done(&self, id: &str) -> Result<()> {
        self.run(&["done", id])
    }

    #[instrument(skip_all, fields(id = %id))]
    fn mark_blocked(&self, id: &str, reason: &str) -> Result<()> {
        self.run(&["blocked", id, reason])
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("md.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp document {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace document {}", path.display()))?;
    Ok(())
}
