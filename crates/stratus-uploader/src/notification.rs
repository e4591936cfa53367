//! Data model of the upload notification: aggregate status, summary message and
//! the first few items. Rendering is left to the caller.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use stratus_core::models::{TaskStatus, UploadTask};
use uuid::Uuid;

/// Number of uploads listed individually.
pub const MAX_LISTED_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Idle,
    Uploading,
    Completed,
    PartialError,
    AllError,
}

impl AggregateStatus {
    pub fn from_tasks(tasks: &[UploadTask]) -> Self {
        let counts = Counts::of(tasks);
        if counts.error > 0 && counts.completed + counts.error == counts.total {
            if counts.error == counts.total {
                return AggregateStatus::AllError;
            }
            return AggregateStatus::PartialError;
        }
        if counts.total > 0 && counts.completed == counts.total {
            return AggregateStatus::Completed;
        }
        if counts.uploading > 0 || counts.pending > 0 {
            return AggregateStatus::Uploading;
        }
        AggregateStatus::Idle
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    total: usize,
    pending: usize,
    uploading: usize,
    completed: usize,
    error: usize,
}

impl Counts {
    fn of(tasks: &[UploadTask]) -> Self {
        tasks.iter().fold(
            Counts {
                total: tasks.len(),
                ..Default::default()
            },
            |mut c, t| {
                match t.status {
                    TaskStatus::Pending => c.pending += 1,
                    TaskStatus::Uploading => c.uploading += 1,
                    TaskStatus::Completed => c.completed += 1,
                    TaskStatus::Error => c.error += 1,
                }
                c
            },
        )
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationItem {
    pub task_id: Uuid,
    pub file_name: String,
    pub status: TaskStatus,
    pub progress: u8,
    /// `42%` while uploading, `✓` / `✗` when finished, `...` while waiting.
    pub label: String,
}

impl NotificationItem {
    fn of(task: &UploadTask) -> Self {
        let label = match task.status {
            TaskStatus::Uploading => format!("{}%", task.progress),
            TaskStatus::Completed => "✓".to_string(),
            TaskStatus::Error => "✗".to_string(),
            TaskStatus::Pending => "...".to_string(),
        };
        Self {
            task_id: task.id,
            file_name: task.file.name.clone(),
            status: task.status,
            progress: task.progress,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadNotification {
    pub status: AggregateStatus,
    pub message: String,
    pub visible: bool,
    pub items: Vec<NotificationItem>,
    /// Uploads beyond the listed items.
    pub more_files: usize,
}

impl UploadNotification {
    pub fn from_tasks(tasks: &[UploadTask], visible: bool) -> Self {
        let counts = Counts::of(tasks);
        let status = AggregateStatus::from_tasks(tasks);
        let message = match status {
            AggregateStatus::Uploading => format!(
                "Uploading {} of {} files...",
                counts.uploading, counts.total
            ),
            AggregateStatus::Completed => format!(
                "Successfully uploaded {} file{}",
                counts.total,
                plural(counts.total)
            ),
            AggregateStatus::AllError => format!(
                "Failed to upload {} file{}",
                counts.total,
                plural(counts.total)
            ),
            AggregateStatus::PartialError => format!(
                "{} uploaded, {} failed",
                counts.completed, counts.error
            ),
            AggregateStatus::Idle => "Ready to upload".to_string(),
        };

        Self {
            status,
            message,
            visible,
            items: tasks
                .iter()
                .take(MAX_LISTED_ITEMS)
                .map(NotificationItem::of)
                .collect(),
            more_files: tasks.len().saturating_sub(MAX_LISTED_ITEMS),
        }
    }

    /// Hidden notifications and empty lists render nothing.
    pub fn should_render(&self) -> bool {
        self.visible && !self.items.is_empty()
    }
}

impl Display for UploadNotification {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)?;
        for item in &self.items {
            write!(f, "\n  {} {}", item.file_name, item.label)?;
        }
        if self.more_files > 0 {
            write!(f, "\n  +{} more files", self.more_files)?;
        }
        Ok(())
    }
}
