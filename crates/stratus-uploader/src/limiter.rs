//! FIFO admission of tasks into a bounded number of pipeline slots.

use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    queue: VecDeque<Uuid>,
    running: usize,
    max_running: usize,
}

impl ConcurrencyLimiter {
    /// A limit of zero is raised to one so the queue can always drain.
    pub fn new(max_running: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            running: 0,
            max_running: max_running.max(1),
        }
    }

    pub fn enqueue(&mut self, task_id: Uuid) {
        self.queue.push_back(task_id);
    }

    /// Take the oldest waiting task if a slot is free, occupying the slot.
    pub fn try_start(&mut self) -> Option<Uuid> {
        if self.running >= self.max_running {
            return None;
        }
        let task_id = self.queue.pop_front()?;
        self.running += 1;
        Some(task_id)
    }

    /// Free the slot of a finished pipeline.
    pub fn release(&mut self) {
        if self.running == 0 {
            tracing::warn!("Released an upload slot that was not held");
            return;
        }
        self.running -= 1;
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }
}
