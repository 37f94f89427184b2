//! Single-pass, line-oriented parser for task documents.
//!
//! The parser is an explicit state value moved through [`ParserState::step`]
//! once per physical line. Each line is classified in priority order:
//! metadata delimiter, phase header, section header, task line. Lines that are
//! blank or indented directly after a task line form that task's spec body.
//!
//! Task lines use the checkbox markers `[ ]`, `[/]`, `[x]` and `[!]` with
//! inline fields such as `[id:: parse-doc]` and `[deps:: a, b]`. A single
//! colon is accepted as well.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::{
    BLOCKED_MARKER, DocumentMeta, Phase, Section, Task, TaskDocument, TaskStatus,
};

const META_DELIMITER: &str = "---";

static PHASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,2}\s+Phase\s+(\d+)\s*:\s*(.*?)\s*$").expect("phase header regex")
});
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{3,4}\s+(\d+(?:\.\d+)+)\.?\s+(.*?)\s*$").expect("section header regex")
});
static TOP_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,2}\s").expect("header regex"));
static ANY_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s").expect("header regex"));
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s+\[(.)\]\s+(.*)$").expect("task line regex"));
static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[id::?\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*\]").expect("id annotation regex")
});
static DEPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[deps?::?\s*([^\]]*)\]").expect("deps annotation regex"));
static BLOCKED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[blocked::?\s*([^\]]*)\]").expect("blocked annotation regex"));
static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[(?:id|deps?|blocked):[^\]]*\]").expect("annotation regex")
});

/// Parse raw document text. Never fails; malformed pieces degrade to text.
pub fn parse_document(raw: &str) -> TaskDocument {
    raw.lines()
        .fold(ParserState::new(), ParserState::step)
        .finish()
}

/// Classification of one body line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Phase { number: u32, title: &'a str },
    Section { id: &'a str, title: &'a str },
    Task(ParsedTask),
    /// A top-level header that is not a phase header. Closes the open phase.
    Header,
    /// A lower-level header that is neither a section nor a phase.
    SubHeader,
    Text(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTask {
    id: Option<String>,
    content: String,
    status: TaskStatus,
    dependencies: Vec<String>,
    blocked: bool,
    blocked_reason: Option<String>,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(caps) = PHASE_RE.captures(line)
        && let Ok(number) = caps[1].parse::<u32>()
    {
        let title = caps.get(2).map_or("", |m| m.as_str());
        return Line::Phase { number, title };
    }
    if let Some(caps) = SECTION_RE.captures(line) {
        let id = caps.get(1).map_or("", |m| m.as_str());
        let title = caps.get(2).map_or("", |m| m.as_str());
        return Line::Section { id, title };
    }
    if let Some(task) = parse_task_line(line) {
        return Line::Task(task);
    }
    if TOP_HEADER_RE.is_match(line) {
        return Line::Header;
    }
    if ANY_HEADER_RE.is_match(line) {
        return Line::SubHeader;
    }
    Line::Text(line)
}

/// Parse a checkbox line. Returns `None` for plain text, including lines
/// whose `[id:: ...]` annotation is malformed.
fn parse_task_line(line: &str) -> Option<ParsedTask> {
    let caps = TASK_RE.captures(line)?;
    let marker = caps[1].chars().next()?;
    let status = TaskStatus::from_marker(marker)?;
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let id = match ID_RE.captures(rest) {
        Some(id_caps) => Some(id_caps[1].to_string()),
        None if rest.contains("[id:") => return None,
        None => None,
    };
    let dependencies = DEPS_RE
        .captures(rest)
        .map(|deps| {
            deps[1]
                .split(',')
                .map(str::trim)
                .filter(|dep| !dep.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let blocked_reason = BLOCKED_RE
        .captures(rest)
        .map(|blocked| blocked[1].trim().to_string())
        .filter(|reason| !reason.is_empty());
    let content = ANNOTATION_RE.replace_all(rest, "").trim().to_string();

    Some(ParsedTask {
        id,
        content,
        status,
        dependencies,
        blocked: marker == BLOCKED_MARKER,
        blocked_reason,
    })
}

/// Where the parser is within the document.
#[derive(Debug)]
enum Cursor {
    /// No line consumed yet; a delimiter here opens the metadata block.
    Start,
    /// Inside the metadata block, collecting raw lines.
    Metadata(Vec<String>),
    /// Regular document body.
    Body,
}

/// The phase currently receiving lines.
#[derive(Debug)]
struct OpenPhase {
    number: u32,
    section: Option<String>,
    task: Option<OpenTask>,
}

/// A task whose spec body is still being collected.
#[derive(Debug)]
struct OpenTask {
    index: usize,
    body: Vec<String>,
}

#[derive(Debug)]
pub struct ParserState {
    meta: DocumentMeta,
    phases: BTreeMap<u32, Phase>,
    cursor: Cursor,
    open: Option<OpenPhase>,
    /// Zero-based index of the line being consumed.
    line: usize,
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserState {
    pub fn new() -> Self {
        Self {
            meta: DocumentMeta::default(),
            phases: BTreeMap::new(),
            cursor: Cursor::Start,
            open: None,
            line: 0,
        }
    }

    /// Consume one physical line.
    pub fn step(self, line: &str) -> Self {
        let mut next = self.consume(line);
        next.line += 1;
        next
    }

    fn consume(mut self, line: &str) -> Self {
        match std::mem::replace(&mut self.cursor, Cursor::Body) {
            Cursor::Start if line.trim_end() == META_DELIMITER => {
                self.cursor = Cursor::Metadata(Vec::new());
                self
            }
            Cursor::Start | Cursor::Body => self.body_line(line),
            Cursor::Metadata(lines) if line.trim_end() == META_DELIMITER => {
                self.meta = parse_meta(&lines.join("\n"));
                self
            }
            Cursor::Metadata(mut lines) => {
                lines.push(line.to_string());
                self.cursor = Cursor::Metadata(lines);
                self
            }
        }
    }

    /// Close any open task and produce the document.
    pub fn finish(mut self) -> TaskDocument {
        if let Cursor::Metadata(lines) = &self.cursor {
            debug!(lines = lines.len(), "unterminated metadata block ignored");
        }
        self.close_task();
        TaskDocument {
            meta: self.meta,
            phases: self.phases,
        }
    }

    fn body_line(mut self, line: &str) -> Self {
        if self.collecting_spec() && is_spec_line(line) {
            if let Some(task) = self.open.as_mut().and_then(|open| open.task.as_mut()) {
                task.body.push(line.to_string());
            }
            return self;
        }
        self.close_task();

        match classify(line) {
            Line::Phase { number, title } => self.open_phase(number, title),
            Line::Section { id, title } => self.open_section(id, title),
            Line::Task(task) => self.push_task(task),
            Line::Header => self.open = None,
            Line::SubHeader => {}
            Line::Text(text) => self.push_description(text),
        }
        self
    }

    fn collecting_spec(&self) -> bool {
        self.open.as_ref().is_some_and(|open| open.task.is_some())
    }

    fn open_phase(&mut self, number: u32, title: &str) {
        self.phases
            .entry(number)
            .or_insert_with(|| Phase::new(number, title));
        self.open = Some(OpenPhase {
            number,
            section: None,
            task: None,
        });
    }

    fn open_section(&mut self, id: &str, title: &str) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let Some(phase) = self.phases.get_mut(&open.number) else {
            return;
        };
        if phase.section(id).is_none() {
            phase.sections.push(Section {
                id: id.to_string(),
                title: title.to_string(),
                tasks: Vec::new(),
            });
        }
        open.section = Some(id.to_string());
    }

    fn push_task(&mut self, parsed: ParsedTask) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let Some(phase) = self.phases.get_mut(&open.number) else {
            return;
        };
        let index = phase.tasks.len();
        phase.tasks.push(Task {
            id: parsed.id,
            content: parsed.content,
            status: parsed.status,
            spec: String::new(),
            section: open.section.clone(),
            dependencies: parsed.dependencies,
            blocked: parsed.blocked,
            blocked_reason: parsed.blocked_reason,
            line: self.line,
        });
        if let Some(section_id) = &open.section
            && let Some(section) = phase.sections.iter_mut().find(|s| &s.id == section_id)
        {
            section.tasks.push(index);
        }
        open.task = Some(OpenTask {
            index,
            body: Vec::new(),
        });
    }

    fn push_description(&mut self, text: &str) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        if open.section.is_some() || text.trim().is_empty() {
            return;
        }
        let Some(phase) = self.phases.get_mut(&open.number) else {
            return;
        };
        if !phase.description.is_empty() {
            phase.description.push('\n');
        }
        phase.description.push_str(text.trim_end());
    }

    fn close_task(&mut self) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let Some(task) = open.task.take() else {
            return;
        };
        if let Some(target) = self
            .phases
            .get_mut(&open.number)
            .and_then(|phase| phase.tasks.get_mut(task.index))
        {
            target.spec = render_spec(&task.body);
        }
    }
}

fn is_spec_line(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with([' ', '\t'])
}

/// Join spec lines, dropping surrounding blank lines and common indentation.
fn render_spec(lines: &[String]) -> String {
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let body = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(indent..).unwrap_or(line.trim_start()).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    body.trim_matches('\n').to_string()
}

fn parse_meta(block: &str) -> DocumentMeta {
    if block.trim().is_empty() {
        return DocumentMeta::default();
    }
    match serde_yaml::from_str::<DocumentMeta>(block) {
        Ok(meta) => meta,
        Err(err) => {
            debug!(err = %err, "metadata block invalid, using defaults");
            DocumentMeta::default()
        }
    }
}
