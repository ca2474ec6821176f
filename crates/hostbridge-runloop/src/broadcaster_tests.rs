use super::*;
use crate::lifecycle::TaskStatus;
use futures::StreamExt;

fn started(id: &str) -> TaskEvent {
    TaskEvent::TaskStarted {
        task_id: TaskId::from(id),
        status: TaskStatus::Running,
    }
}

fn completed(id: &str) -> TaskEvent {
    TaskEvent::TaskCompleted {
        task_id: TaskId::from(id),
        status: TaskStatus::Completed,
        result: serde_json::json!({"success": true}),
    }
}

#[tokio::test]
async fn test_every_subscriber_gets_every_event() {
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let mut a = broadcaster.subscribe();
    let mut b = broadcaster.subscribe();

    assert_eq!(broadcaster.publish(&started("t1")), 2);
    assert_eq!(broadcaster.publish(&completed("t1")), 2);

    assert_eq!(a.recv().await, Some(started("t1")));
    assert_eq!(a.recv().await, Some(completed("t1")));
    assert_eq!(b.recv().await, Some(started("t1")));
    assert_eq!(b.recv().await, Some(completed("t1")));
}

#[tokio::test]
async fn test_late_subscriber_misses_earlier_events() {
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    broadcaster.publish(&started("t1"));
    let mut late = broadcaster.subscribe();
    broadcaster.publish(&completed("t1"));

    assert_eq!(late.recv().await, Some(completed("t1")));
}

#[tokio::test]
async fn test_full_queue_drops_for_that_subscriber_only() {
    let broadcaster = Arc::new(EventBroadcaster::new(1));
    let mut slow = broadcaster.subscribe();
    let mut fast = broadcaster.subscribe();

    broadcaster.publish(&started("t1"));
    assert_eq!(fast.recv().await, Some(started("t1")));

    // slow still holds the first event, so the second is dropped for it
    assert_eq!(broadcaster.publish(&completed("t1")), 1);
    assert_eq!(broadcaster.dropped_events(), 1);

    assert_eq!(slow.recv().await, Some(started("t1")));
    assert_eq!(fast.recv().await, Some(completed("t1")));
}

#[tokio::test]
async fn test_drop_unsubscribes() {
    let broadcaster = Arc::new(EventBroadcaster::new(4));
    let sub = broadcaster.subscribe();
    assert_eq!(broadcaster.subscriber_count(), 1);
    drop(sub);
    assert_eq!(broadcaster.subscriber_count(), 0);
    assert_eq!(broadcaster.publish(&started("t1")), 0);
}

#[tokio::test]
async fn test_unsubscribe_unknown_is_noop() {
    let broadcaster = EventBroadcaster::new(4);
    assert!(!broadcaster.unsubscribe("missing"));
}

#[tokio::test(start_paused = true)]
async fn test_next_event_yields_keepalive_when_idle() {
    let broadcaster = Arc::new(EventBroadcaster::new(4));
    let mut sub = broadcaster.subscribe();
    let event = sub.next_event(Duration::from_secs(1)).await;
    assert_eq!(event, Some(TaskEvent::Keepalive {}));
}

#[tokio::test]
async fn test_stream_starts_with_connected_and_filters() {
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let sub = broadcaster.subscribe();
    let id = sub.id().to_string();

    broadcaster.publish(&started("other"));
    broadcaster.publish(&started("mine"));
    broadcaster.publish(&completed("other"));
    broadcaster.publish(&completed("mine"));
    broadcaster.publish(&started("after"));

    let options = DeliveryOptions::default().for_task(TaskId::from("mine"));
    let events: Vec<TaskEvent> = sub.into_stream(options).collect().await;

    assert_eq!(
        events,
        vec![
            TaskEvent::Connected { subscriber_id: id },
            started("mine"),
            completed("mine"),
        ]
    );
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stream_respects_max_duration() {
    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let sub = broadcaster.subscribe();
    let options = DeliveryOptions {
        keepalive: Duration::from_secs(1),
        task_filter: None,
        max_duration: Some(Duration::from_millis(2500)),
    };

    let events: Vec<TaskEvent> = sub.into_stream(options).collect().await;
    assert!(matches!(events[0], TaskEvent::Connected { .. }));
    assert!(events[1..].iter().all(|e| *e == TaskEvent::Keepalive {}));
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn test_close_all_ends_streams_after_backlog() {
    let broadcaster = Arc::new(EventBroadcaster::new(8));
    let stream = broadcaster.subscribe().into_stream(DeliveryOptions::default());
    broadcaster.publish(&started("t1"));

    assert_eq!(broadcaster.close_all(), 1);
    assert_eq!(broadcaster.subscriber_count(), 0);

    let events: Vec<TaskEvent> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "connected");
    assert_eq!(events[1], started("t1"));
}
