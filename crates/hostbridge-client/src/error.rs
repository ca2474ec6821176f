//! Client error types.

use std::time::Duration;

use thiserror::Error;

use hostbridge_runloop::{BridgeError, TaskId};

/// Errors from the submit-and-wait client and its transports.
///
/// A handler that fails is not an error here: it resolves to
/// [`TaskOutcome::Failed`](crate::TaskOutcome::Failed).
#[derive(Debug, Error)]
pub enum ClientError {
    /// No terminal event arrived in time. The task may still finish.
    #[error("Timed out after {after:?} waiting for task {}", waited_on(.task_id))]
    Timeout {
        task_id: Option<TaskId>,
        after: Duration,
    },

    /// Connection or stream failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command name not registered on the bridge.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Submission refused by the bridge.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Task id unknown to the bridge.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Response or event did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

fn waited_on(task_id: &Option<TaskId>) -> &str {
    task_id.as_ref().map(TaskId::as_str).unwrap_or("<unsubmitted>")
}

impl From<BridgeError> for ClientError {
    fn from(err: BridgeError) -> Self {
        let message = err.to_string();
        match err {
            BridgeError::UnknownCommand(name) => Self::UnknownCommand(name),
            BridgeError::TaskNotFound(id) => Self::TaskNotFound(id),
            BridgeError::Timeout { task_id, after } => Self::Timeout { task_id, after },
            BridgeError::QueueFull(_) | BridgeError::ShuttingDown => Self::Rejected {
                status: 503,
                message,
            },
            _ => Self::Rejected {
                status: 400,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ClientError::Timeout {
            task_id: Some(TaskId::from("abc")),
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "Timed out after 2s waiting for task abc");

        let err = ClientError::Timeout {
            task_id: None,
            after: Duration::from_millis(50),
        };
        assert!(err.to_string().contains("<unsubmitted>"));
    }

    #[test]
    fn test_rejected_display() {
        let err = ClientError::Rejected {
            status: 503,
            message: "Bridge is shutting down".to_string(),
        };
        assert_eq!(err.to_string(), "Request rejected (503): Bridge is shutting down");
    }
}
