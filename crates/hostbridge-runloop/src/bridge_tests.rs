use super::*;
use serde_json::{Value, json};

use crate::context::TaskContext;
use crate::pump::DrainReport;
use crate::registry::ParamSpec;

#[derive(Default)]
struct Calc {
    total: i64,
}

fn registry() -> CommandRegistry<Calc> {
    let mut registry = CommandRegistry::new();
    registry
        .register(
            CommandSpec::new("add")
                .with_param(ParamSpec::required("a"))
                .with_param(ParamSpec::required("b")),
            |host: &mut Calc, args: &[Value]| {
                let sum = args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0);
                host.total += sum;
                Ok(json!(sum))
            },
        )
        .register_with_context(
            CommandSpec::new("steps"),
            |_host: &mut Calc, _args: &[Value], ctx: &TaskContext| {
                for step in 1..=4 {
                    ctx.progress(step as f64 * 25.0, &format!("step {}", step));
                }
                Ok(json!("done"))
            },
        );
    registry
}

fn build(config: BridgeConfig) -> (Arc<Bridge>, ExecutionPump<Calc>) {
    BridgeBuilder::new(config).with_registry(registry()).build()
}

fn add(a: i64, b: i64) -> CommandRequest {
    CommandRequest::new("add").with_args(vec![json!(a), json!(b)])
}

async fn until_queued(bridge: &Bridge, count: usize) {
    while bridge.stats().pending < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_submit_unknown_command_creates_no_task() {
    let (bridge, _pump) = build(BridgeConfig::default());
    let err = bridge.submit(CommandRequest::new("nope")).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownCommand(name) if name == "nope"));
    assert!(bridge.lifecycle().is_empty());
    assert_eq!(bridge.stats().pending, 0);
}

#[tokio::test]
async fn test_submit_invalid_arguments() {
    let (bridge, _pump) = build(BridgeConfig::default());
    let err = bridge
        .submit(CommandRequest::new("add").with_args(vec![json!(1)]))
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArguments { .. }));
}

#[tokio::test]
async fn test_submit_then_drain_completes() {
    let (bridge, pump) = build(BridgeConfig::default());
    let submission = bridge.submit(add(2, 3)).unwrap();
    assert_eq!(submission.status, TaskStatus::Queued);

    let mut host = Calc::default();
    pump.drain_once(&mut host);

    let view = bridge.status(&submission.task_id).unwrap();
    assert_eq!(view.status, TaskStatus::Completed);
    assert_eq!(view.progress, 100.0);
    assert_eq!(view.result.unwrap()["value"], json!(5));
    assert_eq!(host.total, 5);
}

#[tokio::test]
async fn test_blocking_submission_per_task() {
    let (bridge, pump) = build(BridgeConfig::default());
    let waiter = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.submit_blocking(add(2, 3), None).await })
    };
    until_queued(&bridge, 1).await;
    pump.drain_once(&mut Calc::default());

    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(
        outcome.outcome.envelope(),
        json!({"success": true, "task": "add", "value": 5})
    );
}

#[tokio::test(start_paused = true)]
async fn test_blocking_timeout_then_repoll() {
    let (bridge, pump) = build(BridgeConfig::default());
    let err = bridge
        .submit_blocking(add(1, 1), Some(Duration::from_secs(10)))
        .await
        .unwrap_err();
    let task_id = match err {
        BridgeError::Timeout {
            task_id: Some(task_id),
            after,
        } => {
            assert_eq!(after, Duration::from_secs(10));
            task_id
        }
        other => panic!("expected timeout, got {:?}", other),
    };
    assert_eq!(bridge.status(&task_id).unwrap().status, TaskStatus::Queued);

    pump.drain_once(&mut Calc::default());
    match bridge.wait_result(&task_id, Duration::from_secs(1)).await {
        WaitOutcome::Ready(stored) => assert!(stored.outcome.is_success()),
        WaitOutcome::TimedOut => panic!("late result was lost"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_slot_ignores_stale_result() {
    let config = BridgeConfig::default().with_result_mode(ResultMode::SingleSlot);
    let (bridge, pump) = build(config);
    let mut host = Calc::default();

    // First caller gives up before the pump runs.
    let first = bridge
        .submit_blocking(add(1, 1), Some(Duration::from_secs(1)))
        .await;
    assert!(matches!(first, Err(BridgeError::Timeout { .. })));

    let waiter = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge
                .submit_blocking(add(10, 20), Some(Duration::from_secs(5)))
                .await
        })
    };
    until_queued(&bridge, 2).await;
    pump.drain_once(&mut host);

    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(outcome.outcome.envelope()["value"], json!(30));
    assert_eq!(host.total, 32);
}

#[tokio::test(start_paused = true)]
async fn test_single_slot_timeout_includes_gate_wait() {
    let config = BridgeConfig::default().with_result_mode(ResultMode::SingleSlot);
    let (bridge, _pump) = build(config);
    let timeout = Duration::from_millis(300);
    let started = tokio::time::Instant::now();

    let callers: Vec<_> = (0..3)
        .map(|i| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let result = bridge.submit_blocking(add(i, i), Some(timeout)).await;
                (result, started.elapsed())
            })
        })
        .collect();

    let mut queued = 0;
    for caller in callers {
        let (result, elapsed) = caller.await.unwrap();
        assert!(elapsed <= timeout + Duration::from_millis(20), "took {:?}", elapsed);
        match result {
            Err(BridgeError::Timeout { task_id, after }) => {
                assert_eq!(after, timeout);
                queued += usize::from(task_id.is_some());
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
    // Callers still waiting on the slot at the deadline never queue.
    assert!(queued >= 1);
    assert_eq!(bridge.stats().pending, queued);
}

#[tokio::test]
async fn test_cancel_queued_task() {
    let (bridge, pump) = build(BridgeConfig::default());
    let mut host = Calc::default();
    let submission = bridge.submit(add(2, 3)).unwrap();

    assert!(bridge.cancel(&submission.task_id));
    assert!(!bridge.cancel(&submission.task_id));
    pump.drain_once(&mut host);

    assert_eq!(host.total, 0);
    assert_eq!(
        bridge.status(&submission.task_id).unwrap().status,
        TaskStatus::Cancelled
    );
    assert!(!bridge.cancel(&TaskId::from("unknown")));
}

#[tokio::test]
async fn test_progress_events_reach_subscribers() {
    let (bridge, pump) = build(BridgeConfig::default());
    let mut sub = bridge.subscribe();
    let submission = bridge
        .submit(CommandRequest::new("steps"))
        .unwrap();
    pump.drain_once(&mut Calc::default());

    let mut progress = Vec::new();
    let mut names = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(20), sub.recv()).await
    {
        assert_eq!(event.task_id(), Some(&submission.task_id));
        if let crate::event::TaskEvent::TaskProgress { progress: p, .. } = &event {
            progress.push(*p);
        }
        names.push(event.name());
    }
    assert_eq!(progress, vec![25.0, 50.0, 75.0, 100.0]);
    assert_eq!(names.first(), Some(&"task_created"));
    assert_eq!(names.last(), Some(&"task_completed"));
}

#[tokio::test]
async fn test_queue_full_rejects_and_fails_task() {
    let (bridge, _pump) = build(BridgeConfig::default().with_max_pending(1));
    bridge.submit(add(1, 1)).unwrap();
    let err = bridge.submit(add(2, 2)).unwrap_err();
    assert!(matches!(err, BridgeError::QueueFull(1)));
    assert_eq!(bridge.lifecycle().counts().failed, 1);
}

#[tokio::test]
async fn test_shutdown_discards_queue_and_refuses_work() {
    let (bridge, pump) = build(BridgeConfig::default());
    let a = bridge.submit(add(1, 1)).unwrap();
    let b = bridge.submit(add(2, 2)).unwrap();

    bridge.shutdown().await;

    for id in [&a.task_id, &b.task_id] {
        let view = bridge.status(id).unwrap();
        assert_eq!(view.status, TaskStatus::Cancelled);
        assert_eq!(view.message, SHUTDOWN_REASON);
    }
    assert!(matches!(
        bridge.submit(add(3, 3)),
        Err(BridgeError::ShuttingDown)
    ));
    assert_eq!(pump.drain_once(&mut Calc::default()), DrainReport::Stopped);
    assert!(!bridge.stats().accepting);
}

#[tokio::test]
async fn test_cleanup_expired() {
    let (bridge, pump) = build(BridgeConfig::default().with_retention(Duration::ZERO));
    let done = bridge.submit(add(1, 1)).unwrap();
    pump.drain_once(&mut Calc::default());
    let queued = bridge.submit(add(1, 1)).unwrap();

    assert_eq!(bridge.cleanup_expired(), 1);
    assert!(bridge.status(&done.task_id).is_none());
    assert!(bridge.status(&queued.task_id).is_some());
}

#[tokio::test]
async fn test_commands_listing() {
    let (bridge, _pump) = build(BridgeConfig::default());
    let names: Vec<String> = bridge.commands().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["add", "steps"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_started_bridge_end_to_end() {
    let config = BridgeConfig::default().with_pump_interval(Duration::from_millis(10));
    let bridge = BridgeBuilder::new(config)
        .with_registry(registry())
        .with_snapshot_provider(|host: &Calc| -> anyhow::Result<Value> {
            Ok(json!({"total": host.total}))
        })
        .start(|| Ok(Calc::default()))
        .unwrap();

    let first = bridge.submit_blocking(add(2, 3), None).await.unwrap();
    assert_eq!(first.outcome.envelope()["value"], json!(5));
    let second = bridge.submit_blocking(add(1, 1), None).await.unwrap();
    assert_eq!(second.outcome.envelope()["value"], json!(2));

    assert!(bridge.snapshot().version > 0);
    bridge.shutdown().await;
    assert!(!bridge.is_accepting());
}
