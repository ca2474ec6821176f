//! Keyed result slots that blocking callers wait on.
//!
//! A slot is keyed either by task id or, in single-slot mode, by
//! [`LEGACY_SLOT`]. Every stored result remembers which task produced it so
//! a waiter never picks up a stale result left behind by an earlier,
//! timed-out submission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::debug;

use crate::command::TaskId;
use crate::error::HandlerError;

/// Key of the shared slot used in single-slot mode.
pub const LEGACY_SLOT: &str = "__legacy__";

/// Final outcome of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Success payload, already wrapped as `{"success": true, "task": .., "value": ..}`.
    Completed(Value),
    Failed(HandlerError),
    Cancelled(Option<String>),
}

impl Outcome {
    /// Successful outcome for `task` returning `value`.
    pub fn completed(task: &str, value: Value) -> Self {
        Self::Completed(success_payload(task, value))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Response body handed to blocking callers.
    pub fn envelope(&self) -> Value {
        match self {
            Self::Completed(payload) => payload.clone(),
            Self::Failed(error) => {
                let mut body = json!({"success": false, "error": error.message});
                if let Some(trace) = &error.trace {
                    body["trace"] = json!(trace);
                }
                body
            }
            Self::Cancelled(reason) => json!({
                "success": false,
                "error": reason.as_deref().unwrap_or("Task was cancelled"),
            }),
        }
    }
}

/// The payload every successful command produces.
pub fn success_payload(task: &str, value: Value) -> Value {
    json!({"success": true, "task": task, "value": value})
}

/// An outcome tagged with the task that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub task_id: TaskId,
    pub outcome: Outcome,
}

/// Result of waiting on a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Ready(StoredResult),
    TimedOut,
}

type Slot = Arc<watch::Sender<Option<StoredResult>>>;

/// Map of result slots, written by the pump and read by waiters.
#[derive(Default)]
pub struct ResultStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        self.slots
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }

    fn matches(slot: &Option<StoredResult>, expected: Option<&TaskId>) -> bool {
        slot.as_ref()
            .is_some_and(|stored| expected.is_none_or(|id| &stored.task_id == id))
    }

    /// Empty a slot before a new submission uses it.
    pub fn prepare(&self, key: &str) {
        self.slot(key).send_replace(None);
    }

    /// Store a result and wake anyone waiting on `key`.
    pub fn publish(&self, key: &str, result: StoredResult) {
        debug!("Publishing result for task {} into slot {}", result.task_id, key);
        self.slot(key).send_replace(Some(result));
    }

    /// Take a result without waiting.
    pub fn try_take(&self, key: &str, expected: Option<&TaskId>) -> Option<StoredResult> {
        let current = self.slots.lock().get(key)?.borrow().clone();
        let result = current.filter(|stored| expected.is_none_or(|id| &stored.task_id == id))?;
        self.claim(key, &result.task_id);
        Some(result)
    }

    /// Wait up to `timeout` for a result in `key`.
    ///
    /// With `expected` set, results produced by other tasks are ignored. A
    /// timed-out wait leaves the slot alone, so the same key can be waited
    /// on again later.
    pub async fn wait_result(
        &self,
        key: &str,
        expected: Option<&TaskId>,
        timeout: Duration,
    ) -> WaitOutcome {
        let sender = self.slot(key);
        let mut receiver = sender.subscribe();

        let result = match tokio::time::timeout(
            timeout,
            receiver.wait_for(|slot| Self::matches(slot, expected)),
        )
        .await
        {
            Ok(Ok(slot)) => (*slot).clone(),
            _ => None,
        };
        drop(receiver);

        match result {
            Some(result) => {
                self.claim(key, &result.task_id);
                WaitOutcome::Ready(result)
            }
            None => WaitOutcome::TimedOut,
        }
    }

    /// Release a slot once its result was handed to a waiter.
    fn claim(&self, key: &str, task_id: &TaskId) {
        let mut slots = self.slots.lock();
        let Some(sender) = slots.get(key) else {
            return;
        };
        let owned = Self::matches(&sender.borrow(), Some(task_id));
        if !owned {
            return;
        }
        if sender.receiver_count() == 0 {
            slots.remove(key);
        } else {
            sender.send_replace(None);
        }
    }

    /// Drop a slot regardless of its contents.
    pub fn remove(&self, key: &str) -> bool {
        self.slots.lock().remove(key).is_some()
    }

    /// Drop unclaimed results whose task is no longer tracked.
    pub fn retain_live(&self, is_live: impl Fn(&TaskId) -> bool) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, sender| {
            if sender.receiver_count() > 0 {
                return true;
            }
            match &*sender.borrow() {
                Some(stored) => is_live(&stored.task_id),
                None => true,
            }
        });
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "result_store_tests.rs"]
mod tests;
