//! TapAccumulator: optimistic local tap counting with periodic read-then-write reconciliation.
//!
//! Taps are counted synchronously into the active session. Each [TapAccumulator::reconcile] takes
//! up to `max_taps_per_cycle` pending taps, reads the wallet's remote energy, and writes back
//! `remote + taps * per_tap_energy`. Two energy figures are kept per session:
//!
//! - `confirmed_energy`: the last value read from or written to the store.
//! - `optimistic_energy`: what the player sees. After every successful cycle or refresh it is
//!   reset to `confirmed_energy + pending_taps * per_tap_energy`. Between those it only grows, and
//!   a dropped cycle leaves its delta in it, so it can run ahead of the remote total until the next
//!   success.
//!
//! All reconciliation triggers (timer, manual sync, session end, refresh) run one at a time
//! behind a single async lock, so two read-then-write cycles never interleave. Tap registration
//! never waits on that lock.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AccumulatorConfig, ConfigError, FailurePolicy};
use crate::record::WalletAddress;
use crate::stage::{StageProgress, StageTracker};
use crate::store::{EnergyStore, StoreError};

#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("an energy store is required")]
    MissingStore,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No active session or nothing pending; the store was not touched.
    Idle,
    /// `taps` were folded into the remote total, which is now `energy`.
    Flushed { taps: u64, delta: u64, energy: u64 },
    /// The remote read or write failed and the cycle's delta was lost.
    Dropped { taps: u64, delta: u64, reason: String },
    /// The remote read or write failed and the taps went back to pending.
    Requeued { taps: u64, reason: String },
}

/// Read-only view of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergySnapshot {
    pub wallet: WalletAddress,
    pub pending_taps: u64,
    pub confirmed_energy: u64,
    pub optimistic_energy: u64,
    pub stage: StageProgress,
}

struct Session {
    epoch: u64,
    wallet: WalletAddress,
    pending_taps: u64,
    confirmed_energy: u64,
    optimistic_energy: u64,
    stage: StageTracker,
}

impl Session {
    fn new(epoch: u64, wallet: WalletAddress) -> Self {
        Self {
            epoch,
            wallet,
            pending_taps: 0,
            confirmed_energy: 0,
            optimistic_energy: 0,
            stage: StageTracker::default(),
        }
    }

    fn confirm(&mut self, energy: u64, per_tap_energy: u64) {
        self.confirmed_energy = energy;
        self.optimistic_energy = energy.saturating_add(self.pending_taps.saturating_mul(per_tap_energy));
    }

    fn snapshot(&self) -> EnergySnapshot {
        EnergySnapshot {
            wallet: self.wallet.clone(),
            pending_taps: self.pending_taps,
            confirmed_energy: self.confirmed_energy,
            optimistic_energy: self.optimistic_energy,
            stage: self.stage.progress(),
        }
    }
}

/// Builder for the accumulator.
pub struct TapAccumulatorBuilder {
    store: Option<Arc<dyn EnergyStore>>,
    config: AccumulatorConfig,
}

impl TapAccumulatorBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            config: AccumulatorConfig::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn EnergyStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: AccumulatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<TapAccumulator, AccumulatorError> {
        let store = self.store.ok_or(AccumulatorError::MissingStore)?;
        self.config.validate()?;
        Ok(TapAccumulator {
            config: self.config,
            store,
            session: Mutex::new(None),
            next_epoch: AtomicU64::new(1),
            cycle: tokio::sync::Mutex::new(()),
        })
    }
}

impl Default for TapAccumulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TapAccumulator {
    config: AccumulatorConfig,
    store: Arc<dyn EnergyStore>,
    session: Mutex<Option<Session>>,
    next_epoch: AtomicU64,
    cycle: tokio::sync::Mutex<()>,
}

impl TapAccumulator {
    pub fn builder() -> TapAccumulatorBuilder {
        TapAccumulatorBuilder::new()
    }

    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<EnergySnapshot> {
        self.session.lock().as_ref().map(Session::snapshot)
    }

    pub fn wallet(&self) -> Option<WalletAddress> {
        self.session.lock().as_ref().map(|s| s.wallet.clone())
    }

    /// Pending taps of the active session (0 without one).
    pub fn pending_taps(&self) -> u64 {
        self.session.lock().as_ref().map_or(0, |s| s.pending_taps)
    }

    /// Count one tap against the active session. Returns false (and does nothing) without one.
    pub fn register_tap(&self) -> bool {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };
        session.pending_taps += 1;
        session.optimistic_energy = session.optimistic_energy.saturating_add(self.config.per_tap_energy);
        if session.stage.record_tap() {
            tracing::debug!(wallet = %session.wallet, stage = session.stage.progress().name, "stage advanced");
        }
        true
    }

    /// Run one reconciliation cycle. Store failures are logged, never returned.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let _cycle = self.cycle.lock().await;
        self.reconcile_locked().await
    }

    /// Open a session for `wallet`, ending any active one first. The wallet's record is created
    /// with energy 0 if missing. Store errors are logged and the session starts from zero.
    pub async fn start_session(&self, wallet: WalletAddress) -> EnergySnapshot {
        let _cycle = self.cycle.lock().await;
        self.end_session_locked().await;

        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        *self.session.lock() = Some(Session::new(epoch, wallet.clone()));

        let loaded = self.load_or_create(&wallet).await;
        let per_tap = self.config.per_tap_energy;
        let snapshot = self.with_session(epoch, |s| {
            match &loaded {
                Ok((energy, created)) => {
                    s.confirm(*energy, per_tap);
                    tracing::info!(wallet = %s.wallet, energy, created, "session started");
                }
                Err(e) => {
                    tracing::warn!(wallet = %s.wallet, reason = %e, "loading energy record failed, starting from zero");
                }
            }
            s.snapshot()
        });
        // The session was installed under the cycle lock, so it is still ours.
        snapshot.unwrap_or_else(|| Session::new(epoch, wallet).snapshot())
    }

    /// Flush once (best effort) and clear all session state. `None` without an active session.
    pub async fn end_session(&self) -> Option<ReconcileOutcome> {
        let _cycle = self.cycle.lock().await;
        self.end_session_locked().await
    }

    /// Re-read the remote total into `confirmed_energy`.
    pub async fn refresh(&self) -> Result<Option<EnergySnapshot>, StoreError> {
        let _cycle = self.cycle.lock().await;
        let active = self.session.lock().as_ref().map(|s| (s.epoch, s.wallet.clone()));
        let Some((epoch, wallet)) = active else {
            return Ok(None);
        };
        let remote = self.store.fetch_energy(&wallet).await?.unwrap_or(0);
        let per_tap = self.config.per_tap_energy;
        Ok(self.with_session(epoch, |s| {
            s.confirm(remote, per_tap);
            s.snapshot()
        }))
    }

    async fn reconcile_locked(&self) -> ReconcileOutcome {
        let taken = {
            let mut guard = self.session.lock();
            match guard.as_mut() {
                Some(s) => {
                    let n = s.pending_taps.min(self.config.max_taps_per_cycle);
                    s.pending_taps -= n;
                    (n > 0).then(|| (s.epoch, s.wallet.clone(), n))
                }
                None => None,
            }
        };
        let Some((epoch, wallet, taps)) = taken else {
            return ReconcileOutcome::Idle;
        };
        let per_tap = self.config.per_tap_energy;
        let delta = taps.saturating_mul(per_tap);

        match self.add_remote(&wallet, delta).await {
            Ok(energy) => {
                self.with_session(epoch, |s| s.confirm(energy, per_tap));
                tracing::debug!(wallet = %wallet, taps, delta, energy, "taps reconciled");
                ReconcileOutcome::Flushed { taps, delta, energy }
            }
            Err(e) => match self.config.on_failure {
                FailurePolicy::Drop => {
                    tracing::warn!(wallet = %wallet, taps, delta, reason = %e, "reconciliation failed, delta dropped");
                    ReconcileOutcome::Dropped {
                        taps,
                        delta,
                        reason: e.to_string(),
                    }
                }
                FailurePolicy::Requeue => {
                    self.with_session(epoch, |s| s.pending_taps += taps);
                    tracing::warn!(wallet = %wallet, taps, reason = %e, "reconciliation failed, taps requeued");
                    ReconcileOutcome::Requeued {
                        taps,
                        reason: e.to_string(),
                    }
                }
            },
        }
    }

    async fn end_session_locked(&self) -> Option<ReconcileOutcome> {
        let active = self.session.lock().is_some();
        if !active {
            return None;
        }
        let outcome = self.reconcile_locked().await;
        if let Some(ended) = self.session.lock().take() {
            if ended.pending_taps > 0 {
                tracing::warn!(wallet = %ended.wallet, taps = ended.pending_taps, "session ended with unflushed taps");
            }
            tracing::info!(wallet = %ended.wallet, energy = ended.confirmed_energy, "session ended");
        }
        Some(outcome)
    }

    /// Read-then-write: not atomic against writers outside this accumulator.
    ///
    /// A missing record is created first, so a session whose start could not reach the store
    /// still lands its taps once the store is back.
    async fn add_remote(&self, wallet: &WalletAddress, delta: u64) -> Result<u64, StoreError> {
        let remote = match self.store.fetch_energy(wallet).await? {
            Some(energy) => energy,
            None => {
                self.store.insert_record(wallet).await?;
                tracing::debug!(wallet = %wallet, "record created during reconciliation");
                0
            }
        };
        let energy = remote.saturating_add(delta);
        self.store.set_energy(wallet, energy).await?;
        Ok(energy)
    }

    /// Returns the wallet's energy and whether the record had to be created.
    async fn load_or_create(&self, wallet: &WalletAddress) -> Result<(u64, bool), StoreError> {
        match self.store.fetch_energy(wallet).await? {
            Some(energy) => Ok((energy, false)),
            None => {
                self.store.insert_record(wallet).await?;
                Ok((0, true))
            }
        }
    }

    /// Apply `f` to the session only if it is still the one identified by `epoch`.
    fn with_session<R>(&self, epoch: u64, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut guard = self.session.lock();
        guard.as_mut().filter(|s| s.epoch == epoch).map(f)
    }
}
