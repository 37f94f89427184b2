//! In-memory model of a parsed task document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Verification command used when the metadata block does not name one.
pub const DEFAULT_VERIFY_COMMAND: &str = "make test";

/// Checkbox marker the store writes for a blocked task. It parses as
/// [`TaskStatus::Pending`] so the task stays outstanding.
pub const BLOCKED_MARKER: char = '!';

/// Tri-state task status, written in the document as a checkbox marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Parse the character between the checkbox brackets.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' | BLOCKED_MARKER => Some(Self::Pending),
            '/' => Some(Self::InProgress),
            'x' | 'X' => Some(Self::Done),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Pending => ' ',
            Self::InProgress => '/',
            Self::Done => 'x',
        }
    }

    pub fn checkbox(self) -> String {
        format!("[{}]", self.marker())
    }

    pub fn is_open(self) -> bool {
        self != Self::Done
    }
}

/// Typed view of the leading metadata block.
///
/// Every recognized key has a default, so a missing or malformed block is
/// equivalent to an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMeta {
    /// Human-readable document title.
    pub title: Option<String>,
    /// One-line summary of the whole plan, shown in the prompt header.
    pub description: Option<String>,
    /// Command the agent runs to verify its work.
    #[serde(alias = "verification", alias = "test_command")]
    #[serde(rename = "verify")]
    pub verify_command: Option<String>,
    /// Append the test-driven-development workflow to the prompt.
    pub tdd: bool,
    /// Files inlined into the prompt, relative to the repository root.
    #[serde(alias = "context")]
    pub context_files: Vec<String>,
}

impl DocumentMeta {
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn verify_command(&self) -> &str {
        self.verify_command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .unwrap_or(DEFAULT_VERIFY_COMMAND)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Identifier from the `[id:: ...]` annotation. `None` marks a display-only task.
    pub id: Option<String>,
    pub content: String,
    pub status: TaskStatus,
    /// Indented/blank lines following the task line.
    pub spec: String,
    /// Dotted id of the owning section, if any.
    pub section: Option<String>,
    /// Ids from a `[deps:: ...]` annotation. Not used for ordering.
    pub dependencies: Vec<String>,
    /// Written with the `[!]` marker.
    pub blocked: bool,
    /// Reason from a `[blocked:: ...]` annotation.
    pub blocked_reason: Option<String>,
    /// Zero-based line index of the task line in the raw document.
    pub line: usize,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Dotted numeric id, e.g. `2.3`.
    pub id: String,
    pub title: String,
    /// Indices into the owning phase's `tasks`.
    pub tasks: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub number: u32,
    pub title: String,
    pub description: String,
    pub tasks: Vec<Task>,
    pub sections: Vec<Section>,
}

impl Phase {
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            description: String::new(),
            tasks: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    /// Tasks belonging to `section_id`, in document order.
    pub fn section_tasks<'a>(&'a self, section_id: &str) -> impl Iterator<Item = &'a Task> + 'a {
        self.section(section_id)
            .into_iter()
            .flat_map(|section| section.tasks.iter())
            .filter_map(|&idx| self.tasks.get(idx))
    }

    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_open()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDocument {
    pub meta: DocumentMeta,
    pub phases: BTreeMap<u32, Phase>,
}

impl TaskDocument {
    pub fn phase(&self, number: u32) -> Option<&Phase> {
        self.phases.get(&number)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.values().flat_map(|phase| phase.tasks.iter())
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks().find(|task| task.id.as_deref() == Some(id))
    }

    /// Done tasks across all phases numbered strictly below `number`.
    pub fn completed_before(&self, number: u32) -> usize {
        self.phases
            .range(..number)
            .map(|(_, phase)| phase.done_count())
            .sum()
    }
}
