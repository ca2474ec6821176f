//! In-process transport over a [`Bridge`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use hostbridge_runloop::{Bridge, CommandRequest, Submission, TaskId, TaskView};

use crate::error::ClientError;
use crate::transport::{BridgeTransport, EventStream};

/// Talks to a bridge living in the same process.
#[derive(Clone)]
pub struct LocalTransport {
    bridge: Arc<Bridge>,
}

impl LocalTransport {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl BridgeTransport for LocalTransport {
    async fn subscribe(&self) -> Result<EventStream, ClientError> {
        let subscription = self.bridge.subscribe();
        let options = self.bridge.delivery_options(None);
        Ok(subscription.into_stream(options).map(Ok).boxed())
    }

    async fn submit(&self, request: &CommandRequest) -> Result<Submission, ClientError> {
        Ok(self.bridge.submit(request.clone())?)
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<bool, ClientError> {
        if !self.bridge.lifecycle().contains(task_id) {
            return Err(ClientError::TaskNotFound(task_id.clone()));
        }
        Ok(self.bridge.cancel(task_id))
    }

    async fn status(&self, task_id: &TaskId) -> Result<TaskView, ClientError> {
        self.bridge
            .status(task_id)
            .ok_or_else(|| ClientError::TaskNotFound(task_id.clone()))
    }
}
