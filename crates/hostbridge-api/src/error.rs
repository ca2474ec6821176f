//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use hostbridge_runloop::BridgeError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error raised by the bridge.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Request could not be understood.
    #[error("{0}")]
    BadRequest(String),

    /// Task id unknown or already swept.
    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
            Self::Bridge(err) => match err {
                BridgeError::UnknownCommand(_)
                | BridgeError::InvalidArguments { .. }
                | BridgeError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
                BridgeError::TaskNotFound(_) => StatusCode::NOT_FOUND,
                BridgeError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
                BridgeError::QueueFull(_) | BridgeError::ShuttingDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                BridgeError::PumpStart(_) | BridgeError::HostInit(_) | BridgeError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Self::Bridge(BridgeError::Timeout {
            task_id: Some(task_id),
            ..
        }) = &self
        {
            body["task_id"] = json!(task_id);
        }
        (status, Json(body)).into_response()
    }
}
