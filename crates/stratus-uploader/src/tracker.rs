//! Authoritative list of upload tasks and their state machine.
//!
//! `pending -> uploading -> {completed | error}`; terminal states are final.

use stratus_core::models::{TaskStatus, UploadResult, UploadTask};
use uuid::Uuid;

/// Progress ceiling while a task is still running; 100 is reserved for `completed`.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Unknown upload task: {0}")]
    UnknownTask(Uuid),

    #[error("Illegal transition for task {task_id}: {from} -> {to}")]
    Illegal {
        task_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },
}

#[derive(Debug, Default)]
pub struct StateTracker {
    tasks: Vec<UploadTask>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new tasks. They must be `pending`.
    pub fn insert(&mut self, tasks: impl IntoIterator<Item = UploadTask>) {
        self.tasks.extend(tasks.into_iter().inspect(|t| {
            debug_assert_eq!(t.status, TaskStatus::Pending);
        }));
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn get(&self, task_id: Uuid) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    fn get_mut(&mut self, task_id: Uuid) -> Result<&mut UploadTask, TransitionError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(TransitionError::UnknownTask(task_id))
    }

    fn transition(
        &mut self,
        task_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<&mut UploadTask, TransitionError> {
        let task = self.get_mut(task_id)?;
        if task.status != from {
            return Err(TransitionError::Illegal {
                task_id,
                from: task.status,
                to,
            });
        }
        task.status = to;
        Ok(task)
    }

    /// `pending -> uploading`
    pub fn start(&mut self, task_id: Uuid) -> Result<(), TransitionError> {
        self.transition(task_id, TaskStatus::Pending, TaskStatus::Uploading)?;
        Ok(())
    }

    /// Raise the progress of an uploading task. Returns the new value, or `None`
    /// when nothing changed (lower value, task not uploading, unknown task).
    pub fn update_progress(&mut self, task_id: Uuid, progress: u8) -> Option<u8> {
        let task = self.get_mut(task_id).ok()?;
        if task.status != TaskStatus::Uploading {
            return None;
        }
        let progress = progress.min(MAX_RUNNING_PROGRESS);
        if progress <= task.progress {
            return None;
        }
        task.progress = progress;
        Some(progress)
    }

    /// `uploading -> completed`, progress forced to 100.
    pub fn complete(&mut self, task_id: Uuid, result: UploadResult) -> Result<(), TransitionError> {
        let task = self.transition(task_id, TaskStatus::Uploading, TaskStatus::Completed)?;
        task.progress = 100;
        task.result = Some(result);
        Ok(())
    }

    /// `uploading -> error`, progress left where it was.
    pub fn fail(&mut self, task_id: Uuid, error: String) -> Result<(), TransitionError> {
        let task = self.transition(task_id, TaskStatus::Uploading, TaskStatus::Error)?;
        task.error = Some(error);
        Ok(())
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn is_uploading(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| t.status == TaskStatus::Uploading)
    }

    /// True when no task is pending or uploading (vacuously true when empty).
    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(UploadTask::is_terminal)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Drop every finished task; returns how many were removed.
    pub fn remove_terminal(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.is_terminal());
        before - self.tasks.len()
    }
}
