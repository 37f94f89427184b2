//! Deterministic phase selection.

use crate::document::{Phase, Task, TaskDocument, TaskStatus};

/// Partition of a phase's tasks by status, each in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStatus<'a> {
    pub completed: Vec<&'a Task>,
    pub pending: Vec<&'a Task>,
    pub in_progress: Vec<&'a Task>,
}

impl PhaseStatus<'_> {
    /// True when the phase still has pending or in-progress tasks.
    pub fn has_outstanding(&self) -> bool {
        !self.pending.is_empty() || !self.in_progress.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.pending.len() + self.in_progress.len()
    }
}

pub fn phase_status(phase: &Phase) -> PhaseStatus<'_> {
    let mut status = PhaseStatus {
        completed: Vec::new(),
        pending: Vec::new(),
        in_progress: Vec::new(),
    };
    for task in &phase.tasks {
        match task.status {
            TaskStatus::Done => status.completed.push(task),
            TaskStatus::Pending => status.pending.push(task),
            TaskStatus::InProgress => status.in_progress.push(task),
        }
    }
    status
}

/// Lowest-numbered phase with outstanding work.
///
/// Returns `None` when every task in every phase is done. Phases without
/// tasks are skipped.
pub fn next_phase(document: &TaskDocument) -> Option<u32> {
    document
        .phases
        .values()
        .find(|phase| phase_status(phase).has_outstanding())
        .map(|phase| phase.number)
}
