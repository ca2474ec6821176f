//! Fan-out of task events to independent subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never blocks: a full
//! queue loses that one event for that one subscriber, and a subscriber
//! whose receiving side is gone is pruned on the next publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::command::TaskId;
use crate::event::TaskEvent;

/// Event broadcaster.
pub struct EventBroadcaster {
    /// Queue length per subscriber.
    capacity: usize,

    subscribers: DashMap<String, mpsc::Sender<TaskEvent>>,

    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: DashMap::new(),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber. It receives only events published from
    /// now on.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(id.clone(), tx);
        info!(
            "Subscriber {} connected ({} active)",
            id,
            self.subscribers.len()
        );
        Subscription {
            id,
            receiver: rx,
            broadcaster: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            info!(
                "Subscriber {} disconnected ({} active)",
                id,
                self.subscribers.len()
            );
        }
        removed
    }

    /// Deliver `event` to every current subscriber without blocking.
    ///
    /// Returns how many subscribers accepted it.
    pub fn publish(&self, event: &TaskEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Subscriber {} queue full, dropping {}",
                        entry.key(),
                        event.name()
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(entry.key().clone()),
            }
        }

        for id in closed {
            debug!("Pruning closed subscriber {}", id);
            self.subscribers.remove(&id);
        }
        delivered
    }

    /// Drop every subscriber. Their streams end after draining what was
    /// already queued.
    pub fn close_all(&self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        if count > 0 {
            info!("Closed {} subscribers", count);
        }
        count
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn published_events(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// How a subscription is turned into an outbound stream.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Idle time after which a keepalive is emitted.
    pub keepalive: Duration,

    /// Only forward events of this task.
    pub task_filter: Option<TaskId>,

    /// Close the stream after this long.
    pub max_duration: Option<Duration>,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(1),
            task_filter: None,
            max_duration: None,
        }
    }
}

impl DeliveryOptions {
    pub fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_filter = Some(task_id);
        self
    }
}

/// Receiving half of a subscriber. Unsubscribes itself when dropped.
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<TaskEvent>,
    broadcaster: Weak<EventBroadcaster>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event, or `None` once the subscriber was removed.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        self.receiver.recv().await
    }

    /// Next event, substituting a keepalive after `idle` of silence.
    pub async fn next_event(&mut self, idle: Duration) -> Option<TaskEvent> {
        match tokio::time::timeout(idle, self.receiver.recv()).await {
            Ok(event) => event,
            Err(_) => Some(TaskEvent::Keepalive {}),
        }
    }

    /// Turn the subscription into a delivery stream.
    ///
    /// The stream starts with a `connected` event. When filtered to a task
    /// it ends right after that task's terminal event.
    pub fn into_stream(self, options: DeliveryOptions) -> impl Stream<Item = TaskEvent> + Send {
        async_stream::stream! {
            let mut subscription = self;
            let DeliveryOptions { keepalive, task_filter, max_duration } = options;
            let deadline = max_duration.map(|d| tokio::time::Instant::now() + d);

            yield TaskEvent::Connected { subscriber_id: subscription.id.clone() };

            loop {
                let next = match deadline {
                    Some(deadline) => tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {
                            debug!("Stream {} reached its time limit", subscription.id);
                            break;
                        }
                        event = subscription.next_event(keepalive) => event,
                    },
                    None => subscription.next_event(keepalive).await,
                };
                let Some(event) = next else {
                    break;
                };
                if !event.passes(task_filter.as_ref()) {
                    continue;
                }
                let finished = task_filter.is_some() && event.is_terminal();
                yield event;
                if finished {
                    break;
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(&self.id);
        }
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
