//! Passcode gate in front of the application form.

use serde::Serialize;
use sha3::{Digest, Sha3_256};

/// Environment variable holding the passcode.
pub const PASSCODE_ENV: &str = "ZEVRU_PASSCODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasscodeVerdict {
    Authorized,
    Denied,
}

impl PasscodeVerdict {
    pub fn is_authorized(self) -> bool {
        matches!(self, PasscodeVerdict::Authorized)
    }
}

/// Holds the digest of the configured passcode; an unconfigured gate denies everything.
#[derive(Clone)]
pub struct PasscodeGate {
    expected: Option<[u8; 32]>,
}

impl PasscodeGate {
    pub fn new(passcode: Option<String>) -> Self {
        Self {
            expected: passcode.filter(|p| !p.is_empty()).map(|p| digest(&p)),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(lookup(PASSCODE_ENV))
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Exact match. Digests are compared so the time taken does not track the matching prefix.
    pub fn check(&self, candidate: &str) -> PasscodeVerdict {
        let verdict = match &self.expected {
            Some(expected) if *expected == digest(candidate) => PasscodeVerdict::Authorized,
            _ => PasscodeVerdict::Denied,
        };
        if !verdict.is_authorized() {
            tracing::debug!(configured = self.is_configured(), "passcode rejected");
        }
        verdict
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha3_256::digest(s.as_bytes()).into()
}
