//! Server-sent event stream of task events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use tracing::debug;

use hostbridge_runloop::{TaskEvent, TaskId};

use super::handlers::TaskIdParam;
use crate::state::AppState;

/// `GET /events[?task_id=...]`
///
/// The first event is always `connected`. Idle periods are filled with
/// `keepalive` events; a filtered stream ends after its task's terminal event.
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(param): Query<TaskIdParam>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = param.task_id.map(TaskId::from);
    let subscription = state.bridge.subscribe();
    debug!(
        "SSE subscriber {} connected (filter: {:?})",
        subscription.id(),
        filter
    );
    let options = state.bridge.delivery_options(filter);
    let stream = subscription
        .into_stream(options)
        .map(|event| Ok(to_sse(&event)));
    Sse::new(stream)
}

pub fn to_sse(event: &TaskEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}
