//! Reconciler: drives [TapAccumulator::reconcile] on a fixed period from a spawned task.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::accumulator::{ReconcileOutcome, TapAccumulator};

/// Handle to the background reconciliation loop.
pub struct Reconciler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Reconciler {
    /// Spawn the loop on the current tokio runtime. The first cycle runs immediately.
    pub fn spawn(accumulator: Arc<TapAccumulator>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(accumulator, shutdown_rx));
        Self { shutdown, task }
    }

    /// Stop after the in-flight cycle (if any) and wait for the task to exit.
    /// Does not flush: end the session for that.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(reason = %e, "reconciler task did not exit cleanly");
        }
    }

    /// Cancel immediately; an in-flight cycle may be lost.
    pub fn abort(self) {
        self.task.abort();
    }
}

async fn run(accumulator: Arc<TapAccumulator>, mut shutdown: watch::Receiver<bool>) {
    let period = accumulator.config().reconcile_period();
    let mut ticker = interval(period);
    // A slow cycle delays the schedule instead of triggering a burst of catch-up cycles.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(period_ms = period.as_millis() as u64, "reconciler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match accumulator.reconcile().await {
                    ReconcileOutcome::Idle => {}
                    ReconcileOutcome::Flushed { taps, energy, .. } => {
                        tracing::trace!(taps, energy, "cycle flushed");
                    }
                    ReconcileOutcome::Dropped { taps, delta, .. } => {
                        tracing::debug!(taps, delta, "cycle dropped");
                    }
                    ReconcileOutcome::Requeued { taps, .. } => {
                        tracing::debug!(taps, "cycle requeued");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("reconciler stopped");
}
