//! Loading task documents from disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::invariants::validate_invariants;
use crate::core::parser::parse_document;
use crate::document::TaskDocument;

/// A parsed document together with the raw text it came from.
///
/// The raw text is kept for the conventions extraction and the per-cycle
/// snapshot; the parsed view is never reused across cycles.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub raw: String,
    pub document: TaskDocument,
}

/// Read, parse, and check a task document.
///
/// Fails when the file cannot be read or the parsed document violates an
/// invariant (duplicate task ids, phase 0).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let document = parse_document(&raw);
    let errors = validate_invariants(&document);
    if !errors.is_empty() {
        return Err(anyhow!(
            "document invariants failed for {}:\n- {}",
            path.display(),
            errors.join("\n- ")
        ));
    }
    debug!(
        phases = document.phases.len(),
        tasks = document.tasks().count(),
        "document loaded"
    );
    Ok(LoadedDocument {
        path: path.to_path_buf(),
        raw,
        document,
    })
}
