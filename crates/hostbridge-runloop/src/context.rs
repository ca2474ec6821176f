//! Context handed to handlers that ask for it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::command::TaskId;
use crate::error::TaskCancelled;
use crate::lifecycle::TaskLifecycleManager;
use crate::snapshot::HostSnapshot;

/// Per-task context: progress reporting, cancellation and the snapshot
/// taken at the start of the current drain.
#[derive(Clone)]
pub struct TaskContext {
    task_id: TaskId,
    lifecycle: Arc<TaskLifecycleManager>,
    token: CancellationToken,
    snapshot: Arc<HostSnapshot>,
}

impl TaskContext {
    pub fn new(
        task_id: TaskId,
        lifecycle: Arc<TaskLifecycleManager>,
        token: CancellationToken,
        snapshot: Arc<HostSnapshot>,
    ) -> Self {
        Self {
            task_id,
            lifecycle,
            token,
            snapshot,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Report progress. Returns `false` when the report was dropped because
    /// the task is no longer running.
    pub fn progress(&self, percent: f64, message: &str) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.lifecycle.report_progress(&self.task_id, percent, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(TaskCancelled)` once cancellation was requested, for use with `?`.
    pub fn check_cancelled(&self) -> Result<(), TaskCancelled> {
        if self.is_cancelled() {
            Err(TaskCancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn snapshot(&self) -> &HostSnapshot {
        &self.snapshot
    }
}
