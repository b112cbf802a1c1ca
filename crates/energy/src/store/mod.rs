//! Remote record store seam.
//!
//! The accumulator only needs three primitives: fetch-one-by-key, insert-one with energy 0, and
//! update-one. No transaction or atomic increment is assumed, so reconciliation is read-then-write.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::WalletAddress;

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::{PostgrestClient, PostgrestEnergyStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Per-wallet energy persistence.
#[async_trait]
pub trait EnergyStore: Send + Sync {
    /// Current energy for the wallet, or `None` when no record exists.
    async fn fetch_energy(&self, wallet: &WalletAddress) -> Result<Option<u64>, StoreError>;

    /// Create the wallet's record with energy 0.
    async fn insert_record(&self, wallet: &WalletAddress) -> Result<(), StoreError>;

    /// Overwrite the wallet's energy (last write wins).
    async fn set_energy(&self, wallet: &WalletAddress, energy: u64) -> Result<(), StoreError>;
}
