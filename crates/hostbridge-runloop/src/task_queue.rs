//! FIFO hand-off between submitters and the execution pump.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::command::{Command, TaskId};
use crate::error::{BridgeError, BridgeResult};

/// A command waiting for the next drain.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub task_id: TaskId,
    pub command: Command,

    /// Result store slot to publish the outcome into, if a blocking
    /// caller is waiting for it.
    pub result_key: Option<String>,
}

impl QueuedCommand {
    pub fn new(task_id: TaskId, command: Command) -> Self {
        Self {
            task_id,
            command,
            result_key: None,
        }
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }
}

/// Unbounded-by-default FIFO queue, safe for any thread to push into.
pub struct TaskQueue {
    /// Maximum number of pending commands (0 = unlimited).
    max_pending: usize,

    pending: Mutex<VecDeque<QueuedCommand>>,
}

impl TaskQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a command at the tail.
    pub fn enqueue(&self, item: QueuedCommand) -> BridgeResult<()> {
        let mut pending = self.pending.lock();
        if self.max_pending > 0 && pending.len() >= self.max_pending {
            return Err(BridgeError::QueueFull(pending.len()));
        }
        debug!("Task {} enqueued ({})", item.task_id, item.command.name);
        pending.push_back(item);
        Ok(())
    }

    /// Take everything currently queued, oldest first.
    ///
    /// Items enqueued after this returns belong to the next drain.
    pub fn dequeue_all(&self) -> Vec<QueuedCommand> {
        let drained = std::mem::take(&mut *self.pending.lock());
        drained.into()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(0)
    }
}
