//! HTTP transport: JSON requests plus a server-sent event subscription.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use hostbridge_runloop::{CommandRequest, Submission, TaskEvent, TaskId, TaskView};

use crate::error::ClientError;
use crate::sse::SseDecoder;
use crate::transport::{BridgeTransport, EventStream};

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// Bridge base URL, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,

    /// Timeout for plain requests and for the stream handshake, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_seconds: default_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Talks to a bridge over its HTTP API.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ClientError> {
        // No overall timeout: it would also cut long-lived event streams.
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Map a non-success response onto a [`ClientError`].
    async fn rejection(response: Response) -> ClientError {
        let status = response.status();
        let message = match response.json::<Value>().await {
            Ok(body) => body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => status.to_string(),
        };
        if status == StatusCode::BAD_REQUEST {
            if let Some(name) = message.strip_prefix("Unknown command: ") {
                return ClientError::UnknownCommand(name.to_string());
            }
        }
        ClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl BridgeTransport for HttpTransport {
    async fn subscribe(&self) -> Result<EventStream, ClientError> {
        let response = self
            .client
            .get(self.url("/events"))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut backlog = VecDeque::new();

        // The subscription is live once the server says so.
        let handshake = async {
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => backlog.extend(decoder.feed(&chunk)),
                    Some(Err(e)) => return Err(ClientError::from(e)),
                    None => {
                        return Err(ClientError::Transport(
                            "event stream closed before connect".to_string(),
                        ));
                    }
                }
                if let Some(pos) = backlog.iter().position(|f| f.event == "connected") {
                    backlog.drain(..=pos);
                    return Ok(());
                }
            }
        };
        tokio::time::timeout(self.config.timeout(), handshake)
            .await
            .map_err(|_| ClientError::Timeout {
                task_id: None,
                after: self.config.timeout(),
            })??;
        debug!("Event stream connected");

        let stream = async_stream::stream! {
            for frame in backlog {
                yield frame.into_task_event();
            }
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in decoder.feed(&chunk) {
                            yield frame.into_task_event();
                        }
                    }
                    Err(e) => {
                        warn!("Event stream error: {}", e);
                        yield Err::<TaskEvent, _>(ClientError::from(e));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn submit(&self, request: &CommandRequest) -> Result<Submission, ClientError> {
        let response = self
            .client
            .post(self.url("/execute"))
            .timeout(self.config.timeout())
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json().await?)
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<bool, ClientError> {
        let response = self
            .client
            .post(self.url("/cancel_task"))
            .timeout(self.config.timeout())
            .json(&json!({ "task_id": task_id }))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::TaskNotFound(task_id.clone())),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                body.get("success")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| ClientError::Protocol("cancel reply lacks 'success'".to_string()))
            }
            _ => Err(Self::rejection(response).await),
        }
    }

    async fn status(&self, task_id: &TaskId) -> Result<TaskView, ClientError> {
        let response = self
            .client
            .get(self.url("/task_status"))
            .timeout(self.config.timeout())
            .query(&[("task_id", task_id.as_str())])
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::TaskNotFound(task_id.clone())),
            status if status.is_success() => Ok(response.json().await?),
            _ => Err(Self::rejection(response).await),
        }
    }
}
