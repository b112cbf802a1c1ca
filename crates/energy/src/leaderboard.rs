//! Referral leaderboard over submitted applications.
//!
//! Every application carries its own `invite_code` and optionally the `inviter_code` it signed up
//! with. An applicant's referral count is the number of applications naming their invite code,
//! compared case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::store::{PostgrestClient, StoreError};

pub const APPLICATIONS_TABLE: &str = "applications";

pub(crate) const APPLICATION_COLUMNS: &str = "id,twitter,discord_username,erc20,invite_code,inviter_code";

/// One application row (only the columns the leaderboard needs).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Application {
    /// Row id as stored (integer or uuid); passed through untouched.
    pub id: serde_json::Value,
    pub twitter: Option<String>,
    pub discord_username: Option<String>,
    pub erc20: Option<String>,
    pub invite_code: String,
    pub inviter_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub id: serde_json::Value,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub erc20: Option<String>,
    pub invite_code: String,
    pub referrals: u64,
}

/// Rank applications by referral count, highest first. Ties keep input order.
pub fn build_leaderboard(applications: &[Application]) -> Vec<LeaderboardEntry> {
    let mut referrals: HashMap<String, u64> = HashMap::new();
    for inviter in applications
        .iter()
        .filter_map(|a| a.inviter_code.as_deref())
        .filter(|code| !code.is_empty())
    {
        *referrals.entry(inviter.to_lowercase()).or_insert(0) += 1;
    }

    let mut board: Vec<LeaderboardEntry> = applications
        .iter()
        .map(|a| LeaderboardEntry {
            id: a.id.clone(),
            twitter: a.twitter.clone(),
            discord: a.discord_username.clone(),
            erc20: a.erc20.clone(),
            invite_code: a.invite_code.clone(),
            referrals: referrals
                .get(&a.invite_code.to_lowercase())
                .copied()
                .unwrap_or(0),
        })
        .collect();
    board.sort_by(|a, b| b.referrals.cmp(&a.referrals));
    board
}

/// Load all applications from `table` and rank them.
pub async fn fetch_leaderboard(
    client: &PostgrestClient,
    table: &str,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let applications: Vec<Application> = client.select(table, APPLICATION_COLUMNS, &[]).await?;
    tracing::debug!(count = applications.len(), "applications loaded");
    Ok(build_leaderboard(&applications))
}
