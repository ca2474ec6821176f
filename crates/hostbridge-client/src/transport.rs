//! Transport abstraction between the client and a bridge.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use hostbridge_runloop::{CommandRequest, Submission, TaskEvent, TaskId, TaskView};

use crate::error::ClientError;

/// Live stream of task events from one subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<TaskEvent, ClientError>> + Send>>;

/// Operations the submit-and-wait client needs from a bridge.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Open an unfiltered event subscription.
    ///
    /// Must not return before the subscription is registered on the
    /// bridge, so that every event published afterwards is delivered.
    async fn subscribe(&self) -> Result<EventStream, ClientError>;

    async fn submit(&self, request: &CommandRequest) -> Result<Submission, ClientError>;

    /// Request cancellation. `Ok(false)` when the task already finished.
    async fn cancel(&self, task_id: &TaskId) -> Result<bool, ClientError>;

    async fn status(&self, task_id: &TaskId) -> Result<TaskView, ClientError>;
}
