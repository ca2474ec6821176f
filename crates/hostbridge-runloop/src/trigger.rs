//! Periodic trigger: owns the host thread and ticks the pump.
//!
//! The host is built by a factory on the dedicated thread and never leaves
//! it. A current-thread runtime drives a fixed-interval ticker; ticks that
//! fall behind are skipped rather than bunched up.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{BridgeError, BridgeResult};
use crate::pump::ExecutionPump;

/// Smallest accepted tick interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to the running pump thread.
pub struct PeriodicTrigger {
    stop: CancellationToken,
    thread: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    interval: Duration,
}

impl PeriodicTrigger {
    /// Start the pump thread.
    ///
    /// Returns once `host_factory` has produced the host, or with its error.
    pub fn spawn<H, F>(
        pump: ExecutionPump<H>,
        interval: Duration,
        thread_name: &str,
        host_factory: F,
    ) -> BridgeResult<Self>
    where
        H: 'static,
        F: FnOnce() -> anyhow::Result<H> + Send + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        let stop = pump.state().shutdown.child_token();
        let ticks = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

        let thread_stop = stop.clone();
        let thread_ticks = ticks.clone();
        let thread = std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("runtime: {}", e)));
                        return;
                    }
                };
                let mut host = match host_factory() {
                    Ok(host) => host,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{:#}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                runtime.block_on(async {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            biased;
                            _ = thread_stop.cancelled() => break,
                            _ = ticker.tick() => {
                                thread_ticks.fetch_add(1, Ordering::Relaxed);
                                pump.drain_once(&mut host);
                            }
                        }
                    }
                });
                debug!("Pump thread exiting");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    "Pump thread {} started (interval {:?})",
                    thread_name, interval
                );
                Ok(Self {
                    stop,
                    thread: Some(thread),
                    ticks,
                    interval,
                })
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(BridgeError::HostInit(message))
            }
            Err(_) => {
                let _ = thread.join();
                Err(BridgeError::HostInit(
                    "pump thread exited during startup".to_string(),
                ))
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking and wait for the in-flight drain to finish.
    pub fn stop(&mut self) {
        self.stop.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Pump thread panicked");
            } else {
                info!("Pump thread stopped after {} ticks", self.ticks());
            }
        }
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
