//! Tap-to-earn energy runtime: local tap batching and periodic reconciliation of per-wallet
//! energy into a hosted record store.
//!
//! - **TapAccumulator**: counts taps synchronously against the active wallet session and folds
//!   them into the remote total with a read-then-write cycle (at most `max_taps_per_cycle` taps
//!   per cycle; failures logged, delta dropped or requeued per [FailurePolicy]).
//! - **Reconciler**: spawned task running one cycle every `reconcile_period_ms`.
//! - **EnergyStore**: the remote seam, with an in-memory store and a PostgREST-backed store.
//! - Campaign extras: the [application] form and its [passcode] gate, the referral
//!   [leaderboard], and [presale] purchase quotes.

pub mod accumulator;
pub mod application;
pub mod config;
pub mod leaderboard;
pub mod passcode;
pub mod presale;
pub mod reconciler;
pub mod record;
pub mod stage;
pub mod store;

pub use accumulator::{
    AccumulatorError, EnergySnapshot, ReconcileOutcome, TapAccumulator, TapAccumulatorBuilder,
};
pub use application::{
    find_application, submit_application, ApplicationError, NewApplication, WhitelistChoice,
};
pub use config::{AccumulatorConfig, ConfigError, FailurePolicy, StoreConfig};
pub use leaderboard::{build_leaderboard, fetch_leaderboard, Application, LeaderboardEntry};
pub use passcode::{PasscodeGate, PasscodeVerdict};
pub use presale::{prepare_purchase, quote_token_units, PresaleError, PurchaseOrder, Stablecoin};
pub use reconciler::Reconciler;
pub use record::{PlayerEnergyRecord, WalletAddress, WalletError};
pub use stage::{StageProgress, StageTracker};
pub use store::{EnergyStore, MemoryStore, PostgrestClient, PostgrestEnergyStore, StoreError};
