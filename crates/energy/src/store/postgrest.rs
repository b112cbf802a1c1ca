//! PostgREST (Supabase) backed store.
//!
//! Rows are addressed as `{url}/rest/v1/{table}` with `column=eq.value` filters. Every request
//! carries the project key both as `apikey` and as a bearer token.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EnergyStore, StoreError};
use crate::config::StoreConfig;
use crate::record::{PlayerEnergyRecord, WalletAddress};

/// Column holding the wallet key in the energy table.
pub const WALLET_COLUMN: &str = "erc20";

/// Minimal PostgREST client: select / insert / update on one table at a time.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    rest_url: String,
    api_key: String,
}

impl PostgrestClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            rest_url: rest_url(&config.url),
            api_key: config.api_key.clone(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }

    /// `GET /{table}?select={columns}&{col}=eq.{value}...`
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, StoreError> {
        self.select_query(table, columns, &eq_filters(filters)).await
    }

    /// `GET /{table}?select={columns}&{key}={value}...` with the query pairs sent as given, for
    /// operators other than `eq` (`or=(...)`, `limit`, ...).
    pub async fn select_query<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>, StoreError> {
        let req = self
            .http
            .get(self.table_url(table))
            .query(&[("select", columns)])
            .query(query);
        let resp = check_status(self.authed(req).send().await?).await?;
        decode(resp).await
    }

    /// `POST /{table}` with a single JSON row.
    pub async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let req = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(row);
        check_status(self.authed(req).send().await?).await?;
        Ok(())
    }

    /// `POST /{table}?select={columns}` with `Prefer: return=representation`; returns the stored
    /// row, including server-filled columns.
    pub async fn insert_returning<T, R>(&self, table: &str, columns: &str, row: &T) -> Result<R, StoreError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let req = self
            .http
            .post(self.table_url(table))
            .query(&[("select", columns)])
            .header("Prefer", "return=representation")
            .json(row);
        let resp = check_status(self.authed(req).send().await?).await?;
        let rows: Vec<R> = decode(resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".into()))
    }

    /// `PATCH /{table}?{col}=eq.{value}...` with a partial JSON row.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        patch: &T,
    ) -> Result<(), StoreError> {
        let req = self
            .http
            .patch(self.table_url(table))
            .query(&eq_filters(filters))
            .header("Prefer", "return=minimal")
            .json(patch);
        check_status(self.authed(req).send().await?).await?;
        Ok(())
    }
}

fn rest_url(base: &str) -> String {
    format!("{}/rest/v1", base.trim().trim_end_matches('/'))
}

fn eq_filters(filters: &[(&str, &str)]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(col, value)| (col.to_string(), format!("eq.{}", value)))
        .collect()
}

/// `(a.eq.x,b.eq.y)` for an `or=` filter. Values containing PostgREST's reserved characters
/// are double-quoted.
pub fn or_eq(conditions: &[(&str, &str)]) -> String {
    let parts: Vec<String> = conditions
        .iter()
        .map(|(col, value)| format!("{}.eq.{}", col, quote_value(value)))
        .collect();
    format!("({})", parts.join(","))
}

fn quote_value(value: &str) -> String {
    if value.chars().any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\' | ' ')) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, StoreError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct EnergyRow {
    energy: Option<serde_json::Number>,
}

impl EnergyRow {
    /// Null counts as zero. Numeric columns may come back as `12.0`; whole non-negative values
    /// are accepted, anything else is a decode error.
    fn energy(&self) -> Result<u64, StoreError> {
        let Some(n) = &self.energy else {
            return Ok(0);
        };
        if let Some(v) = n.as_u64() {
            return Ok(v);
        }
        match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
            _ => Err(StoreError::Decode(format!("energy is not a non-negative integer: {n}"))),
        }
    }
}

#[derive(Debug, Serialize)]
struct EnergyPatch {
    energy: u64,
}

/// [EnergyStore] over a PostgREST table keyed by [WALLET_COLUMN].
pub struct PostgrestEnergyStore {
    client: PostgrestClient,
    table: String,
}

impl PostgrestEnergyStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::from_client(PostgrestClient::new(config)?, config.table.clone()))
    }

    pub fn from_client(client: PostgrestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn client(&self) -> &PostgrestClient {
        &self.client
    }
}

#[async_trait]
impl EnergyStore for PostgrestEnergyStore {
    async fn fetch_energy(&self, wallet: &WalletAddress) -> Result<Option<u64>, StoreError> {
        let rows: Vec<EnergyRow> = self
            .client
            .select(&self.table, "energy", &[(WALLET_COLUMN, wallet.as_str())])
            .await?;
        rows.first().map(EnergyRow::energy).transpose()
    }

    async fn insert_record(&self, wallet: &WalletAddress) -> Result<(), StoreError> {
        self.client
            .insert(&self.table, &PlayerEnergyRecord::new(wallet.clone()))
            .await
    }

    async fn set_energy(&self, wallet: &WalletAddress, energy: u64) -> Result<(), StoreError> {
        self.client
            .update(
                &self.table,
                &[(WALLET_COLUMN, wallet.as_str())],
                &EnergyPatch { energy },
            )
            .await
    }
}
