//! End-to-end tests of the HTTP transport against a served bridge.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::oneshot;

use hostbridge_api::{InterfaceConfig, InterfaceServer};
use hostbridge_client::{
    ClientError, HttpTransport, HttpTransportConfig, SubmitAndWaitClient, TaskOutcome,
};
use hostbridge_runloop::{
    Bridge, BridgeBuilder, BridgeConfig, CommandRegistry, CommandRequest, CommandSpec, ParamSpec,
    TaskContext, TaskId, TaskStatus,
};

/// Fires the graceful shutdown of a test server when dropped.
struct ShutdownHandle(Option<oneshot::Sender<()>>);

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

struct Notes {
    lines: Vec<String>,
}

fn registry() -> CommandRegistry<Notes> {
    let mut registry = CommandRegistry::new();
    registry
        .register(
            CommandSpec::new("append").with_param(ParamSpec::required("line")),
            |host: &mut Notes, args: &[Value]| {
                host.lines.push(args[0].as_str().unwrap_or_default().to_string());
                Ok(json!(host.lines.len()))
            },
        )
        .register_with_context(
            CommandSpec::new("scan"),
            |_host: &mut Notes, _args: &[Value], ctx: &TaskContext| {
                ctx.progress(25.0, "a quarter");
                ctx.progress(75.0, "most");
                Ok(json!("scanned"))
            },
        )
        .register(CommandSpec::new("broken"), |_host: &mut Notes, _args: &[Value]| {
            anyhow::bail!("cannot do that")
        });
    registry
}

async fn serve() -> (Arc<Bridge>, String, ShutdownHandle) {
    let bridge = BridgeBuilder::new(
        BridgeConfig::default().with_pump_interval(Duration::from_millis(5)),
    )
    .with_registry(registry())
    .start(|| Ok(Notes { lines: Vec::new() }))
    .unwrap();

    let server = InterfaceServer::new(InterfaceConfig::new("127.0.0.1", 0), bridge.clone());
    let listener = server.bind().await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (bridge, base_url, ShutdownHandle(Some(tx)))
}

fn client(base_url: &str) -> SubmitAndWaitClient<HttpTransport> {
    let config = HttpTransportConfig::new(base_url).with_timeout(Duration::from_secs(5));
    SubmitAndWaitClient::new(HttpTransport::new(config).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_submit_and_wait_over_http() {
    let (_bridge, base_url, _shutdown) = serve().await;
    let mut progress = Vec::new();

    let outcome = client(&base_url)
        .submit_and_wait_with_progress(
            CommandRequest::new("scan"),
            Duration::from_secs(5),
            |percent, _| progress.push(percent),
        )
        .await
        .unwrap();

    assert!(outcome.is_success());
    match outcome {
        TaskOutcome::Completed { result, .. } => {
            assert_eq!(result["success"], true);
            assert_eq!(result["value"], "scanned");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(progress, vec![25.0, 75.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_and_unknown_over_http() {
    let (_bridge, base_url, _shutdown) = serve().await;
    let client = client(&base_url);

    let outcome = client
        .submit_and_wait(CommandRequest::new("broken"), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matches!(outcome, TaskOutcome::Failed { ref error, .. } if error == "cannot do that"));

    let err = client
        .submit_and_wait(CommandRequest::new("fly"), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownCommand(name) if name == "fly"));

    let err = client
        .submit_and_wait(CommandRequest::new("append"), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_and_cancel_over_http() {
    let (bridge, base_url, _shutdown) = serve().await;
    let client = client(&base_url);

    let outcome = client
        .submit_and_wait(
            CommandRequest::new("append").with_args(vec![json!("first")]),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    let view = client.get_status(outcome.task_id()).await.unwrap();
    assert_eq!(view.status, TaskStatus::Completed);
    assert_eq!(view.result.unwrap()["value"], 1);

    // Finished tasks cannot be cancelled.
    assert!(!client.cancel(outcome.task_id()).await.unwrap());

    let err = client.cancel(&TaskId::from("missing")).await.unwrap_err();
    assert!(matches!(err, ClientError::TaskNotFound(_)));

    bridge.shutdown().await;
    let err = client
        .submit_and_wait(
            CommandRequest::new("append").with_args(vec![json!("late")]),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 503, .. }));
}
