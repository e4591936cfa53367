//! Detects when every tracked upload has finished and raises the
//! all-complete event once per contiguous set of uploads.
//!
//! A set starts with the first task added after the previous firing and grows
//! with every task added before it finishes.

use stratus_core::models::CompletedUpload;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CompletionSignaler {
    fired: bool,
    members: usize,
    completed: Vec<CompletedUpload>,
}

impl CompletionSignaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// New non-terminal tasks joined the tracker.
    pub fn tasks_added(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        if self.fired {
            self.fired = false;
            self.completed.clear();
        }
        self.members += count;
    }

    pub fn record_completed(&mut self, task_id: Uuid, file_name: &str) {
        self.completed.push(CompletedUpload {
            task_id,
            file_name: file_name.to_string(),
        });
    }

    /// Returns the successes of the current set the first time it is seen fully
    /// terminal, `None` otherwise.
    pub fn check(&mut self, all_terminal: bool) -> Option<Vec<CompletedUpload>> {
        if self.fired || self.members == 0 || !all_terminal {
            return None;
        }
        self.fired = true;
        self.members = 0;
        Some(std::mem::take(&mut self.completed))
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
