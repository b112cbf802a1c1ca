//! Presale purchase arithmetic: USD amount to stablecoin and token base units, purchase checks,
//! and sale progress. Nothing here talks to a chain; callers submit the resulting amounts.

use serde::Serialize;
use thiserror::Error;

/// Token price in micro-dollars ($0.001).
pub const PRICE_MICRO: u128 = 1000;
pub const STABLE_DECIMALS: u32 = 6;
pub const TOKEN_DECIMALS: u32 = 18;
/// Per-wallet purchase bounds in USD, inclusive.
pub const MIN_USD: f64 = 1.0;
pub const MAX_USD: f64 = 250.0;

/// USD raised at which the progress bar starts and fills.
const PROGRESS_FLOOR_USD: f64 = 200_000.0;
const PROGRESS_CEILING_USD: f64 = 400_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum PresaleError {
    #[error("amount must be between $1 and $250, got {0}")]
    OutOfRange(f64),
    #[error("not a valid amount: {0:?}")]
    InvalidAmount(String),
    #[error("the presale terms must be accepted")]
    TermsNotAccepted,
    #[error("wallet already purchased in this presale")]
    AlreadyPurchased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Stablecoin {
    Usdt,
    #[default]
    Usdc,
}

impl Stablecoin {
    /// Token contract on Base.
    pub fn address(self) -> &'static str {
        match self {
            Stablecoin::Usdt => "0xfde4C96c8593536E31F229EA8f37b2ADa2699bb2",
            Stablecoin::Usdc => "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
        }
    }
}

/// A checked purchase, in base units of both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    pub stable: Stablecoin,
    pub stable_units: u128,
    pub token_units: u128,
}

/// Stablecoin base units for `usd`, rounded to the nearest unit. Zero for non-positive or
/// non-finite input.
pub fn stable_units(usd: f64) -> u128 {
    if !usd.is_finite() || usd <= 0.0 {
        return 0;
    }
    (usd * 10f64.powi(STABLE_DECIMALS as i32)).round() as u128
}

/// Token base units bought with `usd` at [PRICE_MICRO], after range checks.
pub fn quote_token_units(usd: f64) -> Result<u128, PresaleError> {
    check_range(usd)?;
    Ok(token_units_for(stable_units(usd)))
}

fn token_units_for(stable_units: u128) -> u128 {
    stable_units * 10u128.pow(TOKEN_DECIMALS) / PRICE_MICRO
}

fn check_range(usd: f64) -> Result<(), PresaleError> {
    if !usd.is_finite() || usd < MIN_USD || usd > MAX_USD {
        return Err(PresaleError::OutOfRange(usd));
    }
    Ok(())
}

/// Validate a purchase the way the buy button does: terms first, then the amount, then the
/// one-purchase-per-wallet rule (`purchased` is the wallet's token units bought so far).
pub fn prepare_purchase(
    amount: &str,
    stable: Stablecoin,
    terms_accepted: bool,
    purchased: u128,
) -> Result<PurchaseOrder, PresaleError> {
    if !terms_accepted {
        return Err(PresaleError::TermsNotAccepted);
    }
    let usd: f64 = amount
        .trim()
        .parse()
        .map_err(|_| PresaleError::InvalidAmount(amount.to_string()))?;
    check_range(usd)?;
    if purchased > 0 {
        return Err(PresaleError::AlreadyPurchased);
    }
    let stable_units = stable_units(usd);
    Ok(PurchaseOrder {
        stable,
        stable_units,
        token_units: token_units_for(stable_units),
    })
}

/// Decimal rendering of token base units, e.g. `1000.0` or `0.5`.
pub fn format_token_units(units: u128) -> String {
    let scale = 10u128.pow(TOKEN_DECIMALS);
    let whole = units / scale;
    let frac = format!("{:0width$}", units % scale, width = TOKEN_DECIMALS as usize);
    let frac = frac.trim_end_matches('0');
    format!("{}.{}", whole, if frac.is_empty() { "0" } else { frac })
}

/// USD raised for `tokens_sold` base units.
pub fn usd_raised(tokens_sold: u128) -> f64 {
    tokens_sold as f64 / 10f64.powi(TOKEN_DECIMALS as i32) * (PRICE_MICRO as f64 / 1_000_000.0)
}

/// Progress bar fill in percent, clamped to 0..=100.
pub fn progress_percent(tokens_sold: u128) -> f64 {
    let raised = usd_raised(tokens_sold);
    ((raised - PROGRESS_FLOOR_USD) / (PROGRESS_CEILING_USD - PROGRESS_FLOOR_USD) * 100.0).clamp(0.0, 100.0)
}
