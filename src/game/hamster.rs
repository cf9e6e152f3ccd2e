//! Hamster Kombat clicker API client.
//!
//! Base URL: https://api.hamsterkombatgame.io/clicker
//! Auth: `Authorization: Bearer {token}` on every request.
//! Every endpoint is a JSON POST; reads wrap their payload in a named
//! field (`clickerUser`, `upgradesForBuy`, `boostsForBuy`, `tasks`).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use super::{GameApi, UpgradeCatalogue};
use crate::types::TapbotError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.hamsterkombatgame.io/clicker";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Move the value under `key` out of a response body.
fn take_field(resp: &mut Value, key: &str) -> Result<Value> {
    resp.get_mut(key)
        .map(Value::take)
        .ok_or_else(|| anyhow!("Response is missing `{key}`"))
}

/// Move the list under `key` out of a response body.
fn take_list(resp: &mut Value, key: &str) -> Result<Vec<Value>> {
    match take_field(resp, key)? {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        other => Err(anyhow!("`{key}` is not a list: {other}")),
    }
}

fn catalogue_from(mut resp: Value) -> Result<UpgradeCatalogue> {
    let upgrades = take_list(&mut resp, "upgradesForBuy")?;
    let daily_combo = take_field(&mut resp, "dailyCombo").ok().filter(|c| !c.is_null());
    Ok(UpgradeCatalogue {
        upgrades,
        daily_combo,
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the clicker API.
pub struct HamsterClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl HamsterClient {
    /// Create a client. `base_url` falls back to the public endpoint.
    pub fn new(token: SecretString, base_url: Option<String>, timeout_secs: Option<u64>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .user_agent("TAPBOT/0.1.0 (clicker-autopilot)")
            .build()
            .context("Failed to build HTTP client for the game API")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value> {
        let url = self.url(endpoint);
        debug!(url = %url, "Calling game API");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Game API request failed: {endpoint}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(TapbotError::Api {
                endpoint: endpoint.to_string(),
                message: format!("{status}: {text}"),
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {endpoint} response"))
    }
}

// ---------------------------------------------------------------------------
// GameApi trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl GameApi for HamsterClient {
    async fn sync_profile(&self) -> Result<Value> {
        let mut resp = self.post("sync", json!({})).await?;
        take_field(&mut resp, "clickerUser")
    }

    async fn upgrades_for_buy(&self) -> Result<UpgradeCatalogue> {
        let resp = self.post("upgrades-for-buy", json!({})).await?;
        catalogue_from(resp)
    }

    async fn boosts_for_buy(&self) -> Result<Vec<Value>> {
        let mut resp = self.post("boosts-for-buy", json!({})).await?;
        take_list(&mut resp, "boostsForBuy")
    }

    async fn list_tasks(&self) -> Result<Vec<Value>> {
        let mut resp = self.post("list-tasks", json!({})).await?;
        take_list(&mut resp, "tasks")
    }

    async fn game_config(&self) -> Result<Value> {
        self.post("config", json!({})).await
    }

    async fn buy_upgrade(&self, upgrade_id: &str) -> Result<()> {
        self.post(
            "buy-upgrade",
            json!({"upgradeId": upgrade_id, "timestamp": Utc::now().timestamp()}),
        )
        .await?;
        Ok(())
    }

    async fn tap(&self, count: u64, available_energy: u64) -> Result<()> {
        self.post(
            "tap",
            json!({
                "count": count,
                "availableTaps": available_energy,
                "timestamp": Utc::now().timestamp(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn buy_boost(&self, boost_id: &str) -> Result<()> {
        self.post(
            "buy-boost",
            json!({"boostId": boost_id, "timestamp": Utc::now().timestamp()}),
        )
        .await?;
        Ok(())
    }

    async fn check_task(&self, task_id: &str) -> Result<()> {
        self.post("check-task", json!({"taskId": task_id})).await?;
        Ok(())
    }

    async fn claim_daily_cipher(&self, cipher: &str) -> Result<()> {
        self.post("claim-daily-cipher", json!({"cipher": cipher})).await?;
        Ok(())
    }

    async fn claim_daily_combo(&self) -> Result<()> {
        self.post("claim-daily-combo", json!({})).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
