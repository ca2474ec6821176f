//! Bridge facade: the thread-safe surface every caller uses.
//!
//! A [`Bridge`] is shared by HTTP handlers, in-process clients and the
//! cleanup task. It never touches the host; it validates and queues
//! commands, and reads the state the pump thread publishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hostbridge_config::ResultMode;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broadcaster::{DeliveryOptions, EventBroadcaster, Subscription};
use crate::command::{CommandRequest, TaskId};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, HandlerError};
use crate::lifecycle::{StatusCounts, TaskLifecycleManager, TaskStatus, TaskView};
use crate::metrics::MetricsSnapshot;
use crate::pump::{ExecutionPump, PumpState, SHUTDOWN_REASON};
use crate::registry::{CommandCatalog, CommandRegistry, CommandSpec};
use crate::result_store::{LEGACY_SLOT, Outcome, WaitOutcome};
use crate::snapshot::{HostSnapshot, SnapshotProvider};
use crate::task_queue::QueuedCommand;
use crate::trigger::PeriodicTrigger;

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Outcome of a blocking submission.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingOutcome {
    pub task_id: TaskId,
    pub outcome: Outcome,
}

/// Bridge-wide counters for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStats {
    pub accepting: bool,
    pub result_mode: ResultMode,
    pub pending: usize,
    pub subscribers: usize,
    pub tasks: StatusCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_task: Option<TaskId>,
    pub snapshot_version: u64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub pump: MetricsSnapshot,
}

#[derive(Clone, Copy)]
enum ResultSlot {
    None,
    PerTask,
    Shared,
}

/// The command bridge.
pub struct Bridge {
    config: BridgeConfig,
    catalog: Arc<dyn CommandCatalog>,
    state: Arc<PumpState>,
    broadcaster: Arc<EventBroadcaster>,
    accepting: AtomicBool,

    /// Serializes blocking callers in single-slot mode.
    legacy_gate: tokio::sync::Mutex<()>,

    trigger: parking_lot::Mutex<Option<PeriodicTrigger>>,
}

impl Bridge {
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    fn enqueue(&self, request: CommandRequest, slot: ResultSlot) -> BridgeResult<TaskId> {
        if !self.is_accepting() {
            return Err(BridgeError::ShuttingDown);
        }
        let command = self.catalog.prepare(request)?;
        let lifecycle = &self.state.lifecycle;
        let task_id = lifecycle.create(&command.name);

        let result_key = match slot {
            ResultSlot::None => None,
            ResultSlot::PerTask => {
                self.state.results.prepare(task_id.as_str());
                Some(task_id.to_string())
            }
            ResultSlot::Shared => Some(LEGACY_SLOT.to_string()),
        };
        let mut item = QueuedCommand::new(task_id.clone(), command);
        item.result_key = result_key;

        if let Err(e) = self.state.queue.enqueue(item) {
            warn!("Rejecting task {}: {}", task_id, e);
            lifecycle.reject(&task_id, HandlerError::new(e.to_string()));
            if matches!(slot, ResultSlot::PerTask) {
                self.state.results.remove(task_id.as_str());
            }
            return Err(e);
        }

        // Shutdown began after the acceptance check: nothing will drain this.
        if self.state.shutdown.is_cancelled() {
            self.state.discard(self.state.queue.dequeue_all(), SHUTDOWN_REASON);
        }
        Ok(task_id)
    }

    /// Queue a command and return at once.
    ///
    /// Unknown commands and unshapeable arguments are rejected here,
    /// before any task is created.
    pub fn submit(&self, request: CommandRequest) -> BridgeResult<Submission> {
        let task_id = self.enqueue(request, ResultSlot::None)?;
        Ok(Submission {
            task_id,
            status: TaskStatus::Queued,
        })
    }

    /// Queue a command and wait for its outcome.
    ///
    /// `timeout` defaults to the configured legacy timeout and covers the
    /// whole call, including the wait for the shared slot in single-slot
    /// mode. On timeout the task keeps running; its status stays queryable
    /// and, in per-task mode, [`Bridge::wait_result`] can pick the result up
    /// later.
    pub async fn submit_blocking(
        &self,
        request: CommandRequest,
        timeout: Option<Duration>,
    ) -> BridgeResult<BlockingOutcome> {
        let timeout = timeout.unwrap_or(self.config.legacy_timeout);
        let deadline = Instant::now() + timeout;
        match self.config.result_mode {
            ResultMode::PerTask => {
                let task_id = self.enqueue(request, ResultSlot::PerTask)?;
                self.await_outcome(task_id.as_str(), task_id.clone(), deadline, timeout)
                    .await
            }
            ResultMode::SingleSlot => {
                let Ok(_gate) = tokio::time::timeout_at(deadline, self.legacy_gate.lock()).await
                else {
                    warn!("Shared result slot still busy after {:?}", timeout);
                    return Err(BridgeError::Timeout {
                        task_id: None,
                        after: timeout,
                    });
                };
                self.state.results.prepare(LEGACY_SLOT);
                let task_id = self.enqueue(request, ResultSlot::Shared)?;
                self.await_outcome(LEGACY_SLOT, task_id, deadline, timeout)
                    .await
            }
        }
    }

    async fn await_outcome(
        &self,
        key: &str,
        task_id: TaskId,
        deadline: Instant,
        timeout: Duration,
    ) -> BridgeResult<BlockingOutcome> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self
            .state
            .results
            .wait_result(key, Some(&task_id), remaining)
            .await
        {
            WaitOutcome::Ready(stored) => Ok(BlockingOutcome {
                task_id,
                outcome: stored.outcome,
            }),
            WaitOutcome::TimedOut => {
                warn!("Task {} timed out after {:?}", task_id, timeout);
                Err(BridgeError::Timeout {
                    task_id: Some(task_id),
                    after: timeout,
                })
            }
        }
    }

    /// Wait again for a blocking submission that previously timed out.
    pub async fn wait_result(&self, task_id: &TaskId, timeout: Duration) -> WaitOutcome {
        self.state
            .results
            .wait_result(task_id.as_str(), Some(task_id), timeout)
            .await
    }

    /// Request cancellation. `false` when the task is unknown or finished.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        self.state.lifecycle.cancel(task_id)
    }

    pub fn status(&self, task_id: &TaskId) -> Option<TaskView> {
        self.state.lifecycle.get(task_id)
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// Delivery options derived from configuration.
    pub fn delivery_options(&self, task_filter: Option<TaskId>) -> DeliveryOptions {
        DeliveryOptions {
            keepalive: self.config.keepalive,
            task_filter,
            max_duration: self.config.max_stream,
        }
    }

    pub fn snapshot(&self) -> Arc<HostSnapshot> {
        self.state.snapshots.current()
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.catalog.specs()
    }

    pub fn lifecycle(&self) -> &Arc<TaskLifecycleManager> {
        &self.state.lifecycle
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            accepting: self.is_accepting(),
            result_mode: self.config.result_mode,
            pending: self.state.queue.len(),
            subscribers: self.broadcaster.subscriber_count(),
            tasks: self.state.lifecycle.counts(),
            running_task: self.state.lifecycle.running_task(),
            snapshot_version: self.state.snapshots.current().version,
            events_published: self.broadcaster.published_events(),
            events_dropped: self.broadcaster.dropped_events(),
            pump: self.state.metrics.snapshot(),
        }
    }

    /// Sweep expired tasks and their unclaimed results.
    pub fn cleanup_expired(&self) -> usize {
        let lifecycle = &self.state.lifecycle;
        let removed = lifecycle.cleanup(self.config.retention);
        let orphaned = self.state.results.retain_live(|id| lifecycle.contains(id));
        if orphaned > 0 {
            debug!("Dropped {} unclaimed results", orphaned);
        }
        removed.len()
    }

    /// Run [`Bridge::cleanup_expired`] periodically until shutdown.
    pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        let shutdown = self.state.shutdown.clone();
        let period = self.config.cleanup_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = bridge.cleanup_expired();
                        if removed > 0 {
                            info!("Cleaned up {} finished tasks", removed);
                        }
                    }
                }
            }
        })
    }

    /// Stop accepting work, stop the pump and cancel whatever is still
    /// queued. The handler in flight, if any, is allowed to finish.
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down bridge");
        self.state.shutdown.cancel();

        let trigger = self.trigger.lock().take();
        if let Some(mut trigger) = trigger {
            if let Err(e) = tokio::task::spawn_blocking(move || trigger.stop()).await {
                warn!("Failed to join pump thread: {}", e);
            }
        }

        let leftover = self.state.queue.dequeue_all();
        self.state.discard(leftover, SHUTDOWN_REASON);
        self.broadcaster.close_all();
        info!("Bridge stopped");
    }
}

/// Builder wiring a registry and host into a running [`Bridge`].
pub struct BridgeBuilder<H> {
    config: BridgeConfig,
    registry: CommandRegistry<H>,
    snapshot_provider: Option<Box<dyn SnapshotProvider<H>>>,
}

impl<H: 'static> BridgeBuilder<H> {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            registry: CommandRegistry::new(),
            snapshot_provider: None,
        }
    }

    pub fn with_registry(mut self, registry: CommandRegistry<H>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry<H> {
        &mut self.registry
    }

    pub fn with_snapshot_provider(mut self, provider: impl SnapshotProvider<H> + 'static) -> Self {
        self.snapshot_provider = Some(Box::new(provider));
        self
    }

    /// Build the bridge and its pump without starting a thread.
    ///
    /// The caller drives [`ExecutionPump::drain_once`] from the thread that
    /// owns the host.
    pub fn build(self) -> (Arc<Bridge>, ExecutionPump<H>) {
        let broadcaster = Arc::new(EventBroadcaster::new(self.config.subscriber_capacity));
        let lifecycle = Arc::new(TaskLifecycleManager::new(broadcaster.clone()));
        let state = Arc::new(PumpState::new(self.config.max_pending, lifecycle));
        let registry = Arc::new(self.registry);

        let mut pump = ExecutionPump::new(registry.clone(), state.clone());
        if let Some(provider) = self.snapshot_provider {
            pump = pump.with_snapshot_provider(provider);
        }

        let bridge = Arc::new(Bridge {
            config: self.config,
            catalog: registry,
            state,
            broadcaster,
            accepting: AtomicBool::new(true),
            legacy_gate: tokio::sync::Mutex::new(()),
            trigger: parking_lot::Mutex::new(None),
        });
        (bridge, pump)
    }

    /// Build the bridge and start the periodic trigger thread, which
    /// constructs the host with `host_factory`.
    pub fn start<F>(self, host_factory: F) -> BridgeResult<Arc<Bridge>>
    where
        F: FnOnce() -> anyhow::Result<H> + Send + 'static,
    {
        let interval = self.config.pump_interval;
        let thread_name = self.config.thread_name.clone();
        let (bridge, pump) = self.build();
        let trigger = PeriodicTrigger::spawn(pump, interval, &thread_name, host_factory)?;
        *bridge.trigger.lock() = Some(trigger);
        info!(
            "Bridge started with {} commands",
            bridge.catalog.specs().len()
        );
        Ok(bridge)
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
