//! Repository root discovery.
//!
//! Relative paths in a task document (context files, config, run records)
//! resolve against the repository root: the nearest ancestor of the document
//! that holds a `.git` marker, or the document's own directory if none does.

use std::path::{Path, PathBuf};

use tracing::debug;

const VCS_MARKER: &str = ".git";

/// Walk upward from `start` looking for a version-control marker directory.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(VCS_MARKER).exists())
        .map(Path::to_path_buf)
}

/// Directory containing `document_path`, or `.` for a bare file name.
pub fn document_dir(document_path: &Path) -> PathBuf {
    match document_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Repository root for a document, falling back to the document's directory.
pub fn repo_root_for(document_path: &Path) -> PathBuf {
    let dir = document_dir(document_path);
    let start = dir.canonicalize().unwrap_or_else(|_| dir.clone());
    match find_repo_root(&start) {
        Some(root) => {
            debug!(root = %root.display(), "found repository root");
            root
        }
        None => {
            debug!(dir = %dir.display(), "no repository marker, using document dir");
            dir
        }
    }
}

/// Resolve `reference` against `root` unless it is already absolute.
pub fn resolve_in_root(root: &Path, reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
