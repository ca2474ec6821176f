//! Execution pump: drains the task queue on the host thread.
//!
//! [`ExecutionPump::drain_once`] is the only place handlers run. It is
//! called by whatever owns the host (normally [`crate::PeriodicTrigger`]),
//! processes every command queued at that moment in FIFO order, and never
//! lets a handler failure escape.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::TaskId;
use crate::context::TaskContext;
use crate::error::{HandlerError, TaskCancelled};
use crate::lifecycle::TaskLifecycleManager;
use crate::metrics::PumpMetrics;
use crate::registry::{CommandCatalog, CommandRegistry, DispatchError};
use crate::result_store::{Outcome, ResultStore, StoredResult, success_payload};
use crate::snapshot::{HostSnapshot, SnapshotCell, SnapshotProvider};
use crate::task_queue::{QueuedCommand, TaskQueue};

/// Reason attached to tasks discarded at shutdown.
pub const SHUTDOWN_REASON: &str = "bridge shut down";

/// State shared between submitters and the pump.
pub struct PumpState {
    pub queue: TaskQueue,
    pub results: ResultStore,
    pub lifecycle: Arc<TaskLifecycleManager>,
    pub snapshots: SnapshotCell,
    pub metrics: PumpMetrics,

    /// Cancelled when the bridge shuts down.
    pub shutdown: CancellationToken,
}

impl PumpState {
    pub fn new(max_pending: usize, lifecycle: Arc<TaskLifecycleManager>) -> Self {
        Self {
            queue: TaskQueue::new(max_pending),
            results: ResultStore::new(),
            lifecycle,
            snapshots: SnapshotCell::new(),
            metrics: PumpMetrics::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Publish `outcome` for a blocking caller, if one is attached.
    pub(crate) fn publish_result(&self, item: &QueuedCommand, outcome: Outcome) {
        if let Some(key) = &item.result_key {
            self.results.publish(
                key,
                StoredResult {
                    task_id: item.task_id.clone(),
                    outcome,
                },
            );
        }
    }

    /// Cancel queued commands that will never run.
    pub(crate) fn discard(&self, items: Vec<QueuedCommand>, reason: &str) -> Vec<TaskId> {
        let mut discarded = Vec::with_capacity(items.len());
        for item in items {
            self.lifecycle.cancel_with_reason(&item.task_id, Some(reason));
            self.publish_result(&item, Outcome::Cancelled(Some(reason.to_string())));
            discarded.push(item.task_id);
        }
        if !discarded.is_empty() {
            info!("Discarded {} queued tasks: {}", discarded.len(), reason);
            self.metrics.record_discarded(discarded.len() as u64);
        }
        discarded
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainReport {
    /// Another drain was still running.
    Skipped,
    /// The bridge is shutting down; nothing was drained.
    Stopped,
    Drained(DrainSummary),
}

/// Details of a completed drain.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainSummary {
    /// Snapshot version the handlers saw.
    pub snapshot_version: u64,
    /// Tasks handed to the pump in this drain, in execution order.
    pub processed: Vec<TaskId>,
    /// Tasks cancelled because shutdown began mid-drain.
    pub discarded: Vec<TaskId>,
}

/// Releases the drain flag on drop, including on unwind.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The execution pump for host type `H`.
pub struct ExecutionPump<H> {
    registry: Arc<CommandRegistry<H>>,
    state: Arc<PumpState>,
    snapshot_provider: Option<Box<dyn SnapshotProvider<H>>>,
    draining: AtomicBool,
}

impl<H: 'static> ExecutionPump<H> {
    pub fn new(registry: Arc<CommandRegistry<H>>, state: Arc<PumpState>) -> Self {
        Self {
            registry,
            state,
            snapshot_provider: None,
            draining: AtomicBool::new(false),
        }
    }

    pub fn with_snapshot_provider(mut self, provider: Box<dyn SnapshotProvider<H>>) -> Self {
        self.snapshot_provider = Some(provider);
        self
    }

    pub fn state(&self) -> &Arc<PumpState> {
        &self.state
    }

    /// Run one drain on the calling thread, which must own `host`.
    ///
    /// Re-entrant calls while a drain is in progress return
    /// [`DrainReport::Skipped`] without touching the queue.
    pub fn drain_once(&self, host: &mut H) -> DrainReport {
        if self.state.shutdown.is_cancelled() {
            return DrainReport::Stopped;
        }
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!("Drain already in progress, skipping tick");
            self.state.metrics.record_skipped_drain();
            return DrainReport::Skipped;
        };
        self.state.metrics.record_drain();

        let snapshot = self.refresh_snapshot(host);
        let mut batch = self.state.queue.dequeue_all().into_iter();
        let mut processed = Vec::new();
        let mut discarded = Vec::new();

        while let Some(item) = batch.next() {
            if self.state.shutdown.is_cancelled() {
                let mut rest = vec![item];
                rest.extend(batch);
                discarded = self.state.discard(rest, SHUTDOWN_REASON);
                break;
            }
            processed.push(item.task_id.clone());
            self.execute(host, item, &snapshot);
        }

        if !processed.is_empty() {
            debug!("Drain processed {} commands", processed.len());
        }
        DrainReport::Drained(DrainSummary {
            snapshot_version: snapshot.version,
            processed,
            discarded,
        })
    }

    fn refresh_snapshot(&self, host: &H) -> Arc<HostSnapshot> {
        let Some(provider) = &self.snapshot_provider else {
            return self.state.snapshots.current();
        };
        match catch_unwind(AssertUnwindSafe(|| provider.snapshot(host))) {
            Ok(Ok(data)) => self.state.snapshots.update(data),
            Ok(Err(e)) => {
                warn!("Snapshot refresh failed, keeping previous: {}", e);
                self.state.snapshots.current()
            }
            Err(_) => {
                error!("Snapshot provider panicked, keeping previous snapshot");
                self.state.snapshots.current()
            }
        }
    }

    fn execute(&self, host: &mut H, item: QueuedCommand, snapshot: &Arc<HostSnapshot>) {
        let lifecycle = &self.state.lifecycle;
        let task_id = item.task_id.clone();
        let name = item.command.name.clone();

        if !self.registry.contains(&name) {
            let err = HandlerError::unknown_command(&name);
            lifecycle.reject(&task_id, err.clone());
            self.state.metrics.record_failure();
            self.state.publish_result(&item, Outcome::Failed(err));
            return;
        }

        let Some(token) = lifecycle.start(&task_id) else {
            debug!("Task {} is no longer queued, skipping", task_id);
            self.state.metrics.record_discarded(1);
            self.state.publish_result(&item, Outcome::Cancelled(None));
            return;
        };

        let ctx = TaskContext::new(task_id.clone(), lifecycle.clone(), token, snapshot.clone());
        let started = Instant::now();
        let dispatched = catch_unwind(AssertUnwindSafe(|| {
            self.registry
                .dispatch(host, &name, &item.command.arguments, &ctx)
        }));
        let elapsed = started.elapsed();

        let outcome = match dispatched {
            Ok(Ok(value)) => {
                let payload = success_payload(&name, value);
                if !lifecycle.complete(&task_id, payload.clone()) {
                    debug!("Task {} finished after cancellation", task_id);
                }
                Outcome::Completed(payload)
            }
            Ok(Err(DispatchError::Handler(e)))
                if e.is::<TaskCancelled>() || ctx.is_cancelled() =>
            {
                lifecycle.cancel(&task_id);
                Outcome::Cancelled(None)
            }
            Ok(Err(DispatchError::Handler(e))) => {
                let err = HandlerError::from_anyhow(&e);
                lifecycle.fail(&task_id, err.clone());
                Outcome::Failed(err)
            }
            Ok(Err(DispatchError::UnknownCommand(name))) => {
                let err = HandlerError::unknown_command(&name);
                lifecycle.fail(&task_id, err.clone());
                Outcome::Failed(err)
            }
            Err(payload) => {
                let err = HandlerError::from_panic(payload.as_ref());
                error!("Handler for task {} ({}) panicked", task_id, name);
                lifecycle.fail(&task_id, err.clone());
                Outcome::Failed(err)
            }
        };

        // Cancelled while the handler ran: the task already reads as cancelled.
        let outcome = if ctx.is_cancelled() {
            Outcome::Cancelled(None)
        } else {
            outcome
        };

        debug!("Task {} ({}) finished in {:?}", task_id, name, elapsed);
        self.state
            .metrics
            .record_execution(outcome.is_success(), elapsed.as_micros() as u64);
        self.state.publish_result(&item, outcome);
    }
}

#[cfg(test)]
#[path = "pump_tests.rs"]
mod tests;
