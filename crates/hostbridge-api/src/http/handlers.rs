//! Command submission, cancellation and status handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{FromRequest, Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use hostbridge_runloop::{CommandRequest, Outcome, TaskId, TaskView};

use crate::error::ApiError;
use crate::state::AppState;

/// JSON body extractor that reports parse failures in the bridge's envelope.
pub struct CommandBody(pub Value);

impl<S> FromRequest<S> for CommandBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(invalid_json(rejection))
            }
        }
    }
}

fn invalid_json(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::BadRequest("Expected application/json body".to_string())
        }
        _ => ApiError::BadRequest("Invalid JSON".to_string()),
    }
}

/// Optional wait budget for blocking submissions.
#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    pub timeout_ms: Option<u64>,
}

/// Task id carried in a query string or body.
#[derive(Debug, Deserialize)]
pub struct TaskIdParam {
    pub task_id: Option<String>,
}

/// Submit a command for asynchronous execution.
///
/// `POST /execute`
pub async fn execute(
    State(state): State<Arc<AppState>>,
    CommandBody(body): CommandBody,
) -> Result<impl IntoResponse, ApiError> {
    state.increment_requests();
    let request = CommandRequest::from_json(body)?;
    let submission = state.bridge.submit(request)?;
    info!("Queued task {}", submission.task_id);
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// Submit a command and wait for its result.
///
/// `POST /execute_sync` and the legacy `POST /`
pub async fn execute_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
    CommandBody(body): CommandBody,
) -> Result<impl IntoResponse, ApiError> {
    state.increment_requests();
    let request = CommandRequest::from_json(body)?;
    let timeout = query.timeout_ms.map(Duration::from_millis);
    let blocking = state.bridge.submit_blocking(request, timeout).await?;

    let mut body = blocking.outcome.envelope();
    body["task_id"] = json!(blocking.task_id);
    let status = match &blocking.outcome {
        Outcome::Completed(payload) => {
            body["result"] = payload.get("value").cloned().unwrap_or(Value::Null);
            StatusCode::OK
        }
        Outcome::Failed(_) | Outcome::Cancelled(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(body)))
}

/// `DELETE /task/{task_id}`
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    cancel(&state, task_id)
}

/// `POST /cancel_task` with `{"task_id": ...}`
pub async fn cancel_task_post(
    State(state): State<Arc<AppState>>,
    CommandBody(body): CommandBody,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = body
        .get("task_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("Missing task_id".to_string()))?;
    cancel(&state, task_id.to_string())
}

fn cancel(state: &AppState, task_id: String) -> Result<Json<Value>, ApiError> {
    let id = TaskId::from(task_id);
    if !state.bridge.lifecycle().contains(&id) {
        return Err(ApiError::TaskNotFound(id.to_string()));
    }
    let success = state.bridge.cancel(&id);
    if success {
        info!("Cancelled task {}", id);
    }
    Ok(Json(json!({ "success": success, "task_id": id })))
}

/// `GET /task_status?task_id=...`
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Query(param): Query<TaskIdParam>,
) -> Result<Json<TaskView>, ApiError> {
    let task_id = param
        .task_id
        .ok_or_else(|| ApiError::BadRequest("Missing task_id".to_string()))?;
    lookup(&state, task_id)
}

/// `GET /task/{task_id}`
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    lookup(&state, task_id)
}

fn lookup(state: &AppState, task_id: String) -> Result<Json<TaskView>, ApiError> {
    let id = TaskId::from(task_id);
    state
        .bridge
        .status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::TaskNotFound(id.to_string()))
}

/// `GET /status`
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.bridge.stats();
    let running = if stats.accepting { "running" } else { "stopping" };
    Json(json!({
        "status": running,
        "uptime_secs": state.uptime().as_secs(),
        "requests": state.request_count(),
        "bridge": stats,
    }))
}

/// `GET /parameters`
pub async fn parameters(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.bridge.snapshot();
    Json(json!({
        "parameters": snapshot.data,
        "version": snapshot.version,
        "taken_at": snapshot.taken_at,
    }))
}

/// `GET /commands`
pub async fn commands(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "commands": state.bridge.commands() }))
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Not found" })),
    )
}
