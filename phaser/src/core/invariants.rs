use std::collections::BTreeMap;

use crate::document::TaskDocument;

/// Validate semantic invariants of a parsed document.
///
/// Returns human-readable violations, empty when the document is valid.
pub fn validate_invariants(document: &TaskDocument) -> Vec<String> {
    let mut errors = Vec::new();

    if document.phases.contains_key(&0) {
        errors.push("phase numbers must be positive (found phase 0)".to_string());
    }

    let mut seen: BTreeMap<&str, u32> = BTreeMap::new();
    for phase in document.phases.values() {
        for task in &phase.tasks {
            let Some(id) = task.id.as_deref() else {
                continue;
            };
            if let Some(first) = seen.insert(id, phase.number) {
                errors.push(format!(
                    "duplicate task id '{id}' (phase {first} and phase {})",
                    phase.number
                ));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_document;
    use crate::test_support::SAMPLE_DOCUMENT;

    #[test]
    fn sample_document_is_valid() {
        assert!(validate_invariants(&parse_document(SAMPLE_DOCUMENT)).is_empty());
    }

    #[test]
    fn reports_duplicate_ids_across_phases() {
        let doc = parse_document("## Phase 1: A\n- [ ] a [id:: dup]\n## Phase 2: B\n- [ ] b [id:: dup]\n");
        let errors = validate_invariants(&doc);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("duplicate task id 'dup'"));
    }

    #[test]
    fn reports_phase_zero() {
        let doc = parse_document("## Phase 0: Zero\n- [ ] a [id:: a]\n");
        let errors = validate_invariants(&doc);
        assert!(errors.iter().any(|err| err.contains("positive")));
    }
}
