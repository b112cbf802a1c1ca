//! Example: open a wallet session, tap in random bursts while the reconciler runs, print the
//! final snapshot as JSON.
//!
//! Usage:
//!
//!   cargo run -p energy --example tap_session -- --wallet 0x... [--taps N] [--store memory|postgrest]
//!
//! `--store postgrest` reads SUPABASE_URL / SUPABASE_ANON_KEY (and optional ENERGY_TABLE).
//! Accumulator settings come from TAP_* env vars (see `AccumulatorConfig::from_env`).
//! Ctrl-C ends the session early (the final flush still runs).

use anyhow::{Context, Result};
use energy::{
    AccumulatorConfig, EnergyStore, MemoryStore, PostgrestEnergyStore, ReconcileOutcome, Reconciler,
    StoreConfig, TapAccumulator, WalletAddress,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().collect();
    let mut wallet = String::new();
    let mut taps: u64 = 50;
    let mut store_kind = String::from("memory");
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--wallet" => {
                i += 1;
                wallet = args.get(i).cloned().unwrap_or_default();
            }
            "--taps" => {
                i += 1;
                taps = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .context("--taps expects a number")?;
            }
            "--store" => {
                i += 1;
                store_kind = args.get(i).cloned().unwrap_or_default();
            }
            _ => {}
        }
        i += 1;
    }
    let wallet = match WalletAddress::parse(&wallet) {
        Ok(w) => w,
        Err(_) => {
            eprintln!("Usage: tap_session --wallet ADDR [--taps N] [--store memory|postgrest]");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn EnergyStore> = match store_kind.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        "postgrest" => {
            let config = StoreConfig::from_env().context("store config")?;
            Arc::new(PostgrestEnergyStore::new(&config).context("build store")?)
        }
        other => anyhow::bail!("unknown store {other:?} (expected memory or postgrest)"),
    };
    let config = AccumulatorConfig::from_env().context("accumulator config")?;
    let accumulator = Arc::new(TapAccumulator::builder().store(store).config(config).build()?);

    let start = accumulator.start_session(wallet).await;
    println!("{}", serde_json::to_string(&start)?);
    let reconciler = Reconciler::spawn(Arc::clone(&accumulator));

    let tapping = {
        let accumulator = Arc::clone(&accumulator);
        async move {
            let mut remaining = taps;
            while remaining > 0 {
                let (burst, pause_ms) = {
                    let mut rng = rand::thread_rng();
                    (rng.gen_range(1..=remaining.min(25)), rng.gen_range(50..400))
                };
                for _ in 0..burst {
                    accumulator.register_tap();
                }
                remaining -= burst;
                tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            }
        }
    };
    tokio::select! {
        _ = tapping => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, ending session");
        }
    }

    reconciler.shutdown().await;
    // Drain the backlog so the printed snapshot is confirmed.
    while let ReconcileOutcome::Flushed { .. } = accumulator.reconcile().await {}
    if let Some(snapshot) = accumulator.snapshot() {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    let outcome = accumulator.end_session().await;
    tracing::info!(?outcome, "session closed");
    Ok(())
}
