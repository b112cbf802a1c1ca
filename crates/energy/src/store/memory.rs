//! In-process [EnergyStore] used by tests and the offline demo.
//!
//! Counts remote operations and can be told to fail reads or writes, or to delay every call, so
//! callers can observe exactly what a reconciliation cycle did.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::{EnergyStore, StoreError};
use crate::record::{PlayerEnergyRecord, WalletAddress};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<WalletAddress, u64>>,
    reads: AtomicU64,
    writes: AtomicU64,
    inserts: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the operation counters.
    pub fn with_record(self, record: PlayerEnergyRecord) -> Self {
        self.records.write().insert(record.wallet, record.energy);
        self
    }

    pub fn energy_of(&self, wallet: &WalletAddress) -> Option<u64> {
        self.records.read().get(wallet).copied()
    }

    pub fn records(&self) -> Vec<PlayerEnergyRecord> {
        let mut out: Vec<PlayerEnergyRecord> = self
            .records
            .read()
            .iter()
            .map(|(wallet, energy)| PlayerEnergyRecord {
                wallet: wallet.clone(),
                energy: *energy,
            })
            .collect();
        out.sort_by(|a, b| a.wallet.as_str().cmp(b.wallet.as_str()));
        out
    }

    /// Number of `fetch_energy` calls seen.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set_energy` calls seen.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every operation by `latency` (tokio time, so paused-clock tests stay fast).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl EnergyStore for MemoryStore {
    async fn fetch_energy(&self, wallet: &WalletAddress) -> Result<Option<u64>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(self.records.read().get(wallet).copied())
    }

    async fn insert_record(&self, wallet: &WalletAddress) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.records.write().entry(wallet.clone()).or_insert(0);
        Ok(())
    }

    async fn set_energy(&self, wallet: &WalletAddress, energy: u64) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        // Update-one: a missing row matches nothing, as with a filtered PATCH.
        if let Some(slot) = self.records.write().get_mut(wallet) {
            *slot = energy;
        }
        Ok(())
    }
}
