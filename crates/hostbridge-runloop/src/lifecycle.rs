//! Task lifecycle tracking.
//!
//! Every task moves `Queued -> Running -> {Completed | Failed | Cancelled}`,
//! or `Queued -> {Cancelled | Failed}` without running. Each transition is
//! broadcast while the task table is locked, so subscribers see a task's
//! events in transition order. Transitions that do not apply to the
//! current status are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcaster::EventBroadcaster;
use crate::command::TaskId;
use crate::error::HandlerError;
use crate::event::TaskEvent;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time copy of a task record, safe to hand to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub task_name: String,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Counts of tracked tasks by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.completed + self.failed + self.cancelled
    }
}

struct TaskRecord {
    view: TaskView,
    token: CancellationToken,
    finished: Option<Instant>,
}

impl TaskRecord {
    fn finish(&mut self, status: TaskStatus) {
        self.view.status = status;
        self.view.completed_at = Some(Utc::now());
        self.finished = Some(Instant::now());
    }
}

/// Owns every task record and emits lifecycle events.
pub struct TaskLifecycleManager {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
    broadcaster: Arc<EventBroadcaster>,
}

impl TaskLifecycleManager {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Register a new task in `Queued` and announce it.
    pub fn create(&self, name: &str) -> TaskId {
        let mut tasks = self.tasks.write();
        let mut id = TaskId::generate();
        while tasks.contains_key(&id) {
            id = TaskId::generate();
        }

        let record = TaskRecord {
            view: TaskView {
                task_id: id.clone(),
                task_name: name.to_string(),
                status: TaskStatus::Queued,
                progress: 0.0,
                message: String::new(),
                result: None,
                error: None,
                cancel_requested: false,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            },
            token: CancellationToken::new(),
            finished: None,
        };
        tasks.insert(id.clone(), record);

        debug!("Task {} created ({})", id, name);
        self.broadcaster.publish(&TaskEvent::TaskCreated {
            task_id: id.clone(),
            task_name: name.to_string(),
            status: TaskStatus::Queued,
        });
        id
    }

    /// Apply `apply` if the task is in one of `allowed`, then broadcast the
    /// event it returns.
    fn transition(
        &self,
        id: &TaskId,
        allowed: &[TaskStatus],
        apply: impl FnOnce(&mut TaskRecord) -> TaskEvent,
    ) -> bool {
        let mut tasks = self.tasks.write();
        let Some(record) = tasks.get_mut(id) else {
            debug!("Ignoring transition for unknown task {}", id);
            return false;
        };
        if !allowed.contains(&record.view.status) {
            debug!(
                "Ignoring transition for task {} in status {}",
                id,
                record.view.status.as_str()
            );
            return false;
        }
        let event = apply(record);
        self.broadcaster.publish(&event);
        true
    }

    /// `Queued -> Running`. Returns the task's cancellation token.
    pub fn start(&self, id: &TaskId) -> Option<CancellationToken> {
        let mut token = None;
        let started = self.transition(id, &[TaskStatus::Queued], |record| {
            record.view.status = TaskStatus::Running;
            record.view.started_at = Some(Utc::now());
            token = Some(record.token.clone());
            TaskEvent::TaskStarted {
                task_id: id.clone(),
                status: TaskStatus::Running,
            }
        });
        if started {
            debug!("Task {} started", id);
        }
        token
    }

    /// Record progress for a running task. `percent` is clamped to 0..=100.
    pub fn report_progress(&self, id: &TaskId, percent: f64, message: &str) -> bool {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.transition(id, &[TaskStatus::Running], |record| {
            record.view.progress = percent;
            record.view.message = message.to_string();
            TaskEvent::TaskProgress {
                task_id: id.clone(),
                progress: percent,
                message: message.to_string(),
            }
        })
    }

    /// `Running -> Completed`.
    pub fn complete(&self, id: &TaskId, result: Value) -> bool {
        let completed = self.transition(id, &[TaskStatus::Running], |record| {
            record.finish(TaskStatus::Completed);
            record.view.progress = 100.0;
            record.view.result = Some(result.clone());
            TaskEvent::TaskCompleted {
                task_id: id.clone(),
                status: TaskStatus::Completed,
                result,
            }
        });
        if completed {
            info!("Task {} completed", id);
        } else {
            debug!("Discarding late result for task {}", id);
        }
        completed
    }

    /// `Running -> Failed`.
    pub fn fail(&self, id: &TaskId, error: HandlerError) -> bool {
        self.terminate_with_error(id, TaskStatus::Running, error)
    }

    /// `Queued -> Failed`, for tasks rejected before they could run.
    pub fn reject(&self, id: &TaskId, error: HandlerError) -> bool {
        self.terminate_with_error(id, TaskStatus::Queued, error)
    }

    fn terminate_with_error(&self, id: &TaskId, from: TaskStatus, error: HandlerError) -> bool {
        let message = error.message.clone();
        let failed = self.transition(id, &[from], |record| {
            record.finish(TaskStatus::Failed);
            record.view.error = Some(error.message.clone());
            TaskEvent::TaskFailed {
                task_id: id.clone(),
                status: TaskStatus::Failed,
                error: error.message,
                trace: error.trace,
            }
        });
        if failed {
            warn!("Task {} failed: {}", id, message);
        }
        failed
    }

    /// Cancel a queued or running task.
    ///
    /// The task becomes `Cancelled` immediately. A running handler is told
    /// through its cancellation token and whatever it produces afterwards
    /// is dropped. Returns `false` for unknown or already finished tasks.
    pub fn cancel(&self, id: &TaskId) -> bool {
        self.cancel_with_reason(id, None)
    }

    /// Cancel with a reason attached to the event, used when the bridge
    /// discards work at shutdown.
    pub fn cancel_with_reason(&self, id: &TaskId, reason: Option<&str>) -> bool {
        let cancelled = self.transition(
            id,
            &[TaskStatus::Queued, TaskStatus::Running],
            |record| {
                record.view.cancel_requested = true;
                record.token.cancel();
                record.finish(TaskStatus::Cancelled);
                if let Some(reason) = reason {
                    record.view.message = reason.to_string();
                }
                TaskEvent::TaskCancelled {
                    task_id: id.clone(),
                    status: TaskStatus::Cancelled,
                    reason: reason.map(str::to_string),
                }
            },
        );
        if cancelled {
            info!("Task {} cancelled", id);
        }
        cancelled
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskView> {
        self.tasks.read().get(id).map(|record| record.view.clone())
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks.read().get(id).map(|record| record.view.status)
    }

    pub fn is_cancel_requested(&self, id: &TaskId) -> bool {
        self.tasks
            .read()
            .get(id)
            .is_some_and(|record| record.view.cancel_requested)
    }

    /// Id of the task currently marked running, if any.
    pub fn running_task(&self) -> Option<TaskId> {
        self.tasks
            .read()
            .values()
            .find(|record| record.view.status == TaskStatus::Running)
            .map(|record| record.view.task_id.clone())
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.tasks.read().values() {
            match record.view.status {
                TaskStatus::Queued => counts.queued += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Forget terminal tasks that finished more than `retention` ago.
    /// Queued and running tasks are never removed.
    pub fn cleanup(&self, retention: Duration) -> Vec<TaskId> {
        let mut tasks = self.tasks.write();
        let expired: Vec<TaskId> = tasks
            .values()
            .filter(|record| {
                record
                    .finished
                    .is_some_and(|finished| finished.elapsed() >= retention)
            })
            .map(|record| record.view.task_id.clone())
            .collect();
        for id in &expired {
            tasks.remove(id);
        }
        if !expired.is_empty() {
            debug!("Swept {} finished tasks", expired.len());
        }
        expired
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.read().contains_key(id)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
