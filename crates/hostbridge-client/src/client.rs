//! Submit-and-wait client.

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use hostbridge_runloop::{CommandRequest, TaskEvent, TaskId, TaskView};

use crate::error::ClientError;
use crate::transport::BridgeTransport;

const CANCELLED_MESSAGE: &str = "Task was cancelled";

/// How a submitted task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed {
        task_id: TaskId,
        result: Value,
    },
    Failed {
        task_id: TaskId,
        error: String,
        trace: Option<String>,
    },
    Cancelled {
        task_id: TaskId,
        reason: String,
    },
}

impl TaskOutcome {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::Cancelled { task_id, .. } => task_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    fn from_event(event: TaskEvent) -> Option<Self> {
        match event {
            TaskEvent::TaskCompleted {
                task_id, result, ..
            } => Some(Self::Completed { task_id, result }),
            TaskEvent::TaskFailed {
                task_id,
                error,
                trace,
                ..
            } => Some(Self::Failed {
                task_id,
                error,
                trace,
            }),
            TaskEvent::TaskCancelled {
                task_id, reason, ..
            } => Some(Self::Cancelled {
                task_id,
                reason: reason.unwrap_or_else(|| CANCELLED_MESSAGE.to_string()),
            }),
            _ => None,
        }
    }
}

/// Submits commands and waits for their terminal event.
///
/// The event subscription is opened before the command is submitted, so a
/// task that finishes immediately cannot be missed.
pub struct SubmitAndWaitClient<T> {
    transport: T,
}

impl<T: BridgeTransport> SubmitAndWaitClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn submit_and_wait(
        &self,
        request: CommandRequest,
        timeout: Duration,
    ) -> Result<TaskOutcome, ClientError> {
        self.submit_and_wait_with_progress(request, timeout, |_, _| {})
            .await
    }

    /// Like [`submit_and_wait`](Self::submit_and_wait), calling
    /// `on_progress(percent, message)` for each progress event.
    ///
    /// `timeout` covers subscription, submission and the wait. Expiry yields
    /// [`ClientError::Timeout`]; the task itself is left running.
    pub async fn submit_and_wait_with_progress<F>(
        &self,
        request: CommandRequest,
        timeout: Duration,
        mut on_progress: F,
    ) -> Result<TaskOutcome, ClientError>
    where
        F: FnMut(f64, &str),
    {
        let deadline = Instant::now() + timeout;
        let expired = |task_id: Option<TaskId>| ClientError::Timeout {
            task_id,
            after: timeout,
        };

        let mut events = tokio::time::timeout_at(deadline, self.transport.subscribe())
            .await
            .map_err(|_| expired(None))??;
        let submission = tokio::time::timeout_at(deadline, self.transport.submit(&request))
            .await
            .map_err(|_| expired(None))??;
        let task_id = submission.task_id;
        debug!("Submitted {} as task {}", request.name, task_id);

        loop {
            let next = tokio::time::timeout_at(deadline, events.next())
                .await
                .map_err(|_| expired(Some(task_id.clone())))?;
            let event = match next {
                Some(event) => event?,
                None => {
                    return Err(ClientError::Transport(format!(
                        "event stream closed while waiting for task {}",
                        task_id
                    )));
                }
            };

            if event.task_id() != Some(&task_id) {
                continue;
            }
            if let TaskEvent::TaskProgress {
                progress, message, ..
            } = &event
            {
                on_progress(*progress, message);
                continue;
            }
            if let Some(outcome) = TaskOutcome::from_event(event) {
                info!("Task {} finished (success: {})", task_id, outcome.is_success());
                return Ok(outcome);
            }
        }
    }

    /// Ask the bridge to cancel a task. The pending wait, if any, resolves
    /// when the cancellation event arrives.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<bool, ClientError> {
        self.transport.cancel(task_id).await
    }

    pub async fn get_status(&self, task_id: &TaskId) -> Result<TaskView, ClientError> {
        self.transport.status(task_id).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
