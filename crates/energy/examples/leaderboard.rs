//! Example: fetch applications through PostgREST and print the referral leaderboard as JSON.
//!
//! Usage:
//!
//!   SUPABASE_URL=... SUPABASE_ANON_KEY=... cargo run -p energy --example leaderboard -- [--table NAME] [--top N]

use anyhow::{Context, Result};
use energy::leaderboard::APPLICATIONS_TABLE;
use energy::{fetch_leaderboard, PostgrestClient, StoreConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().collect();
    let mut table = APPLICATIONS_TABLE.to_string();
    let mut top: Option<usize> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--table" => {
                i += 1;
                table = args.get(i).cloned().unwrap_or(table);
            }
            "--top" => {
                i += 1;
                top = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .context("--top expects a number")?,
                );
            }
            _ => {}
        }
        i += 1;
    }

    let config = StoreConfig::from_env().context("store config")?;
    let client = PostgrestClient::new(&config).context("build client")?;
    let mut board = fetch_leaderboard(&client, &table).await?;
    if let Some(n) = top {
        board.truncate(n);
    }
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "leaderboard": board }))?);
    Ok(())
}
