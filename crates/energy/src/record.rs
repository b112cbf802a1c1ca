//! Player energy record and wallet key.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet address is empty")]
    Empty,
}

/// Opaque, case-sensitive wallet key. Primary key of the remote energy table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Trim surrounding whitespace; reject an empty result. No further validation.
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let cleaned = raw.trim();
        if cleaned.is_empty() {
            return Err(WalletError::Empty);
        }
        Ok(Self(cleaned.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the remote energy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEnergyRecord {
    #[serde(rename = "erc20")]
    pub wallet: WalletAddress,
    pub energy: u64,
}

impl PlayerEnergyRecord {
    /// Fresh record as inserted on first sight of a wallet.
    pub fn new(wallet: WalletAddress) -> Self {
        Self { wallet, energy: 0 }
    }
}
