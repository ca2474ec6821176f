//! # HostBridge RunLoop
//!
//! Core of the HostBridge command bridge: lets any number of threads submit
//! commands to a host that is neither thread-safe nor re-entrant, and have
//! them executed one at a time on the thread that owns it.
//!
//! ## Architecture
//!
//! ```text
//!  submitters (HTTP, in-process clients)          host thread
//! ┌──────────────────────────────────┐    ┌─────────────────────────────┐
//! │ Bridge::submit / submit_blocking │    │ PeriodicTrigger (interval)  │
//! │   ├─ CommandCatalog::prepare     │    │   └─ ExecutionPump          │
//! │   ├─ TaskLifecycleManager::create│    │        ├─ SnapshotProvider  │
//! │   └─ TaskQueue::enqueue ─────────┼───►│        ├─ dequeue_all (FIFO)│
//! │                                  │    │        └─ CommandRegistry   │
//! │ ResultStore::wait_result ◄───────┼────┤           dispatch          │
//! │ EventBroadcaster::subscribe ◄────┼────┤ lifecycle events            │
//! └──────────────────────────────────┘    └─────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`Bridge`]: Thread-safe facade used by every caller
//! - [`ExecutionPump`]: Drains the queue on the host thread
//! - [`PeriodicTrigger`]: Owns the host thread and ticks the pump
//! - [`CommandRegistry`]: Command names mapped to host handlers
//! - [`TaskLifecycleManager`]: Task records and state transitions
//! - [`EventBroadcaster`]: Per-subscriber event fan-out
//! - [`ResultStore`]: Slots blocking callers wait on
//!
//! ## Example
//!
//! ```rust,no_run
//! use hostbridge_runloop::{BridgeBuilder, BridgeConfig, CommandRequest, CommandSpec, ParamSpec};
//! use serde_json::{Value, json};
//!
//! struct Canvas { strokes: Vec<i64> }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut builder = BridgeBuilder::<Canvas>::new(BridgeConfig::default());
//!     builder.registry_mut().register(
//!         CommandSpec::new("stroke").with_param(ParamSpec::required("width")),
//!         |canvas: &mut Canvas, args: &[Value]| {
//!             canvas.strokes.push(args[0].as_i64().unwrap_or(1));
//!             Ok(json!(canvas.strokes.len()))
//!         },
//!     );
//!     let bridge = builder.start(|| Ok(Canvas { strokes: Vec::new() }))?;
//!
//!     let done = bridge
//!         .submit_blocking(CommandRequest::new("stroke").with_args(vec![json!(3)]), None)
//!         .await?;
//!     println!("{}", done.outcome.envelope());
//!
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod broadcaster;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod metrics;
pub mod pump;
pub mod registry;
pub mod result_store;
pub mod snapshot;
pub mod task_queue;
pub mod trigger;

pub use bridge::{BlockingOutcome, Bridge, BridgeBuilder, BridgeStats, Submission};
pub use broadcaster::{DeliveryOptions, EventBroadcaster, Subscription};
pub use command::{Command, CommandArgs, CommandRequest, TaskId};
pub use config::BridgeConfig;
pub use context::TaskContext;
pub use error::{BridgeError, BridgeResult, HandlerError, TaskCancelled};
pub use event::TaskEvent;
pub use lifecycle::{StatusCounts, TaskLifecycleManager, TaskStatus, TaskView};
pub use metrics::{MetricsSnapshot, PumpMetrics};
pub use pump::{DrainReport, DrainSummary, ExecutionPump, PumpState, SHUTDOWN_REASON};
pub use registry::{
    CommandCatalog, CommandRegistry, CommandSpec, ContextHandler, DispatchError, Handler,
    ParamSpec, PlainHandler,
};
pub use result_store::{LEGACY_SLOT, Outcome, ResultStore, StoredResult, WaitOutcome};
pub use snapshot::{HostSnapshot, SnapshotCell, SnapshotProvider};
pub use task_queue::{QueuedCommand, TaskQueue};
pub use trigger::PeriodicTrigger;

pub use hostbridge_config::ResultMode;
