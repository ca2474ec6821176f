//! Error types for the bridge core.

use std::any::Any;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::TaskId;

/// Errors surfaced to callers of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Command name is not in the registry.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Arguments could not be shaped to the handler's parameters.
    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },

    /// Request body is not a command.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Task queue reached its pending limit.
    #[error("Task queue is full ({0} pending)")]
    QueueFull(usize),

    /// Bridge no longer accepts work.
    #[error("Bridge is shutting down")]
    ShuttingDown,

    /// Task id was never issued or has been swept.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Blocking submission gave up waiting. The task may still complete.
    /// `task_id` is `None` when the deadline passed before anything was queued.
    #[error("Task {} did not finish within {after:?}", waited_on(.task_id))]
    Timeout {
        task_id: Option<TaskId>,
        after: Duration,
    },

    /// Pump thread could not be started.
    #[error("Failed to start pump thread: {0}")]
    PumpStart(#[from] std::io::Error),

    /// Host factory failed on the pump thread.
    #[error("Host initialization failed: {0}")]
    HostInit(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

fn waited_on(task_id: &Option<TaskId>) -> &str {
    task_id.as_ref().map(TaskId::as_str).unwrap_or("<unsubmitted>")
}

/// Failure captured at the pump boundary and reported for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human readable message.
    pub message: String,

    /// Error chain or panic location, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Error for a command name the registry does not know.
    pub fn unknown_command(name: &str) -> Self {
        Self::new(format!("Unknown command: {}", name))
    }

    /// Convert a handler's `anyhow` error, keeping the cause chain as trace.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let chain: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
        let error = Self::new(err.to_string());
        if chain.is_empty() {
            error
        } else {
            error.with_trace(format!("Caused by:\n    {}", chain.join("\n    ")))
        }
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("Handler panicked: {}", detail)).with_trace("panic")
    }
}

/// Marker error a handler returns when it stops because its task was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Task was cancelled")]
pub struct TaskCancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::UnknownCommand("nope".to_string());
        assert_eq!(err.to_string(), "Unknown command: nope");

        let err = BridgeError::QueueFull(3);
        assert!(err.to_string().contains("3 pending"));

        let err = BridgeError::Timeout {
            task_id: None,
            after: std::time::Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "Task <unsubmitted> did not finish within 300ms");
    }

    #[test]
    fn test_handler_error_from_anyhow_keeps_chain() {
        let err = anyhow::anyhow!("disk unplugged").context("write failed");
        let handler = HandlerError::from_anyhow(&err);
        assert_eq!(handler.message, "write failed");
        assert!(handler.trace.unwrap().contains("disk unplugged"));
    }

    #[test]
    fn test_handler_error_without_chain_has_no_trace() {
        let err = anyhow::anyhow!("bad input");
        let handler = HandlerError::from_anyhow(&err);
        assert_eq!(handler.message, "bad input");
        assert!(handler.trace.is_none());
    }

    #[test]
    fn test_handler_error_from_panic() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let handler = HandlerError::from_panic(payload.as_ref());
        assert_eq!(handler.message, "Handler panicked: boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let handler = HandlerError::from_panic(payload.as_ref());
        assert!(handler.message.contains("owned boom"));
    }

    #[test]
    fn test_handler_error_serde_skips_empty_trace() {
        let json = serde_json::to_value(HandlerError::new("x")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "x"}));
    }
}
