//! Task lifecycle events delivered to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::TaskId;
use crate::lifecycle::TaskStatus;

/// One event on the broadcast stream.
///
/// Serializes as `{"event": "<name>", "data": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// First event on every stream.
    Connected { subscriber_id: String },

    TaskCreated {
        task_id: TaskId,
        task_name: String,
        status: TaskStatus,
    },

    TaskStarted { task_id: TaskId, status: TaskStatus },

    TaskProgress {
        task_id: TaskId,
        progress: f64,
        message: String,
    },

    TaskCompleted {
        task_id: TaskId,
        status: TaskStatus,
        result: Value,
    },

    TaskFailed {
        task_id: TaskId,
        status: TaskStatus,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },

    TaskCancelled {
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Emitted by the delivery loop when the stream is idle.
    Keepalive {},
}

impl TaskEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskProgress { .. } => "task_progress",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskCancelled { .. } => "task_cancelled",
            Self::Keepalive {} => "keepalive",
        }
    }

    /// Task this event belongs to, if any.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskStarted { task_id, .. }
            | Self::TaskProgress { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskCancelled { task_id, .. } => Some(task_id),
            Self::Connected { .. } | Self::Keepalive {} => None,
        }
    }

    /// Whether no further events follow for this task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TaskCompleted { .. } | Self::TaskFailed { .. } | Self::TaskCancelled { .. }
        )
    }

    /// Whether a stream filtered to `filter` should carry this event.
    pub fn passes(&self, filter: Option<&TaskId>) -> bool {
        match (filter, self.task_id()) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(wanted), Some(id)) => wanted == id,
        }
    }

    /// The `data` object alone.
    pub fn data(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Rebuild an event from a wire name and its `data` object.
    pub fn from_parts(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        let data = if data.is_null() {
            Value::Object(Default::default())
        } else {
            data
        };
        serde_json::from_value(serde_json::json!({"event": name, "data": data}))
    }
}
