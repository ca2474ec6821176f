//! HTTP route definitions.
//!
//! ```text
//! POST   /execute             - Queue a command, returns {task_id, status}
//! POST   /execute_sync        - Queue a command and wait for its result
//! POST   /                    - Legacy alias of /execute_sync
//! GET    /events              - SSE task event stream (?task_id= filter)
//! POST   /cancel_task         - Cancel by {"task_id": ...}
//! GET    /task_status         - Poll a task (?task_id=)
//! GET    /task/{task_id}      - Poll a task
//! DELETE /task/{task_id}      - Cancel a task
//! GET    /status              - Bridge status and metrics
//! GET    /parameters          - Latest host snapshot
//! GET    /commands            - Registered commands
//! ```

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::http::handlers::{
    cancel_task, cancel_task_post, commands, execute, execute_sync, get_task, not_found,
    parameters, status, task_status,
};
use crate::http::sse::events;
use crate::state::AppState;

/// Create the router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let command_routes = Router::new()
        .route("/", post(execute_sync))
        .route("/execute", post(execute))
        .route("/execute_sync", post(execute_sync));

    let task_routes = Router::new()
        .route("/events", get(events))
        .route("/cancel_task", post(cancel_task_post))
        .route("/task_status", get(task_status))
        .route("/task/{task_id}", get(get_task).delete(cancel_task));

    let info_routes = Router::new()
        .route("/status", get(status))
        .route("/parameters", get(parameters))
        .route("/commands", get(commands));

    Router::new()
        .merge(command_routes)
        .merge(task_routes)
        .merge(info_routes)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
