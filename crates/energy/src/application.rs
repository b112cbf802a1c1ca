//! Application form behind the passcode gate.
//!
//! A submission becomes one row of the applications table. The applicant's own `invite_code` is
//! their twitter handle, which is what other applicants enter as `inviter_code` and what the
//! [leaderboard](crate::leaderboard) counts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::leaderboard::{Application, APPLICATIONS_TABLE, APPLICATION_COLUMNS};
use crate::store::postgrest::or_eq;
use crate::store::{PostgrestClient, StoreError};

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitelistChoice {
    Yes,
    #[default]
    No,
}

/// Form contents as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewApplication {
    pub fullname: String,
    pub twitter: String,
    pub discord_username: String,
    pub erc20: String,
    /// Twitter handle of whoever invited the applicant; may be empty.
    pub inviter_code: String,
    pub bullish_reason: String,
    pub whitelist_choice: WhitelistChoice,
}

#[derive(Debug, Serialize)]
struct ApplicationRow<'a> {
    fullname: &'a str,
    twitter: &'a str,
    discord_username: &'a str,
    erc20: &'a str,
    inviter_code: &'a str,
    bullish_reason: &'a str,
    whitelist_choice: WhitelistChoice,
    invite_code: &'a str,
}

impl NewApplication {
    /// Fullname, twitter, discord and wallet must be non-blank.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let required = [
            ("fullname", &self.fullname),
            ("twitter", &self.twitter),
            ("discord_username", &self.discord_username),
            ("erc20", &self.erc20),
        ];
        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ApplicationError::Missing(field)),
            None => Ok(()),
        }
    }

    fn row(&self) -> ApplicationRow<'_> {
        ApplicationRow {
            fullname: &self.fullname,
            twitter: &self.twitter,
            discord_username: &self.discord_username,
            erc20: &self.erc20,
            inviter_code: &self.inviter_code,
            bullish_reason: &self.bullish_reason,
            whitelist_choice: self.whitelist_choice,
            invite_code: &self.twitter,
        }
    }
}

/// Insert the application and return the stored row.
pub async fn submit_application(
    client: &PostgrestClient,
    application: &NewApplication,
) -> Result<Application, ApplicationError> {
    application.validate()?;
    let stored: Application = client
        .insert_returning(APPLICATIONS_TABLE, APPLICATION_COLUMNS, &application.row())
        .await?;
    tracing::info!(invite_code = %stored.invite_code, "application submitted");
    Ok(stored)
}

/// First application matching any of the non-empty identifiers. `None` when nothing matches or
/// every identifier is empty (no request is made then).
pub async fn find_application(
    client: &PostgrestClient,
    erc20: &str,
    discord_username: &str,
    twitter: &str,
) -> Result<Option<Application>, StoreError> {
    let conditions: Vec<(&str, &str)> = [("erc20", erc20), ("discord_username", discord_username), ("twitter", twitter)]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if conditions.is_empty() {
        return Ok(None);
    }
    let query = [
        ("or".to_string(), or_eq(&conditions)),
        ("limit".to_string(), "1".to_string()),
    ];
    let rows: Vec<Application> = client
        .select_query(APPLICATIONS_TABLE, APPLICATION_COLUMNS, &query)
        .await?;
    Ok(rows.into_iter().next())
}
