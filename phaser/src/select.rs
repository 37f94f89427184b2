//! Phase selection for `phaser run` and `phaser next`.

use crate::core::selector::{next_phase, phase_status};
use crate::document::TaskDocument;

/// Structured selection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Phase with outstanding tasks.
    Open(u32),
    /// Every task in every phase is done.
    Complete,
    /// The requested phase does not exist.
    Missing(u32),
    /// The requested phase has no outstanding tasks.
    Finished(u32),
}

impl SelectOutcome {
    pub fn phase(self) -> Option<u32> {
        match self {
            Self::Open(number) => Some(number),
            _ => None,
        }
    }

    /// Operator-facing explanation for outcomes with nothing to run.
    pub fn describe(self) -> String {
        match self {
            Self::Open(number) => format!("phase {number} has outstanding tasks"),
            Self::Complete => "all phases complete".to_string(),
            Self::Missing(number) => format!("phase {number} not found"),
            Self::Finished(number) => format!("phase {number} has no outstanding tasks"),
        }
    }
}

/// Select `requested`, or the lowest-numbered phase with outstanding work.
pub fn select_phase(document: &TaskDocument, requested: Option<u32>) -> SelectOutcome {
    let Some(number) = requested else {
        return next_phase(document).map_or(SelectOutcome::Complete, SelectOutcome::Open);
    };
    match document.phase(number) {
        None => SelectOutcome::Missing(number),
        Some(phase) if phase_status(phase).has_outstanding() => SelectOutcome::Open(number),
        Some(_) => SelectOutcome::Finished(number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_document;
    use crate::test_support::SAMPLE_DOCUMENT;

    #[test]
    fn selects_lowest_outstanding_phase() {
        let doc = parse_document(SAMPLE_DOCUMENT);
        assert_eq!(select_phase(&doc, None), SelectOutcome::Open(1));
    }

    #[test]
    fn requested_phase_outcomes() {
        let doc = parse_document(SAMPLE_DOCUMENT);
        assert_eq!(select_phase(&doc, Some(2)), SelectOutcome::Open(2));
        assert_eq!(select_phase(&doc, Some(3)), SelectOutcome::Missing(3));
        assert_eq!(select_phase(&doc, Some(4)), SelectOutcome::Finished(4));
    }

    #[test]
    fn all_done_is_complete() {
        let doc = parse_document("## Phase 1: A\n- [x] a [id:: a]\n## Phase 2: Empty\n");
        assert_eq!(select_phase(&doc, None), SelectOutcome::Complete);
        assert_eq!(select_phase(&doc, None).phase(), None);
    }
}
