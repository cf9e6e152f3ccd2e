//! Game API integration.
//!
//! Defines the `GameApi` trait the cycle runner talks to and provides the
//! HTTP implementation for the Hamster Kombat clicker API.

pub mod hamster;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::types::RawSnapshot;

/// The upgrade catalogue as returned by the provider.
#[derive(Debug, Clone, Default)]
pub struct UpgradeCatalogue {
    pub upgrades: Vec<Value>,
    pub daily_combo: Option<Value>,
}

/// Abstraction over the remote game.
///
/// Reads return raw records, untouched; commands mutate remote state that
/// the next snapshot reflects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Current player record (`clickerUser`).
    async fn sync_profile(&self) -> Result<Value>;

    async fn upgrades_for_buy(&self) -> Result<UpgradeCatalogue>;

    async fn boosts_for_buy(&self) -> Result<Vec<Value>>;

    async fn list_tasks(&self) -> Result<Vec<Value>>;

    /// Daily configuration, including `dailyCipher`.
    async fn game_config(&self) -> Result<Value>;

    async fn buy_upgrade(&self, upgrade_id: &str) -> Result<()>;

    /// Send `count` taps and report the energy left afterwards.
    async fn tap(&self, count: u64, available_energy: u64) -> Result<()>;

    async fn buy_boost(&self, boost_id: &str) -> Result<()>;

    async fn check_task(&self, task_id: &str) -> Result<()>;

    async fn claim_daily_cipher(&self, cipher: &str) -> Result<()>;

    async fn claim_daily_combo(&self) -> Result<()>;
}

/// Fetch every record one decision needs.
pub async fn fetch_snapshot(api: &dyn GameApi) -> Result<RawSnapshot> {
    let (profile, catalogue, boosts, tasks, config) = tokio::try_join!(
        api.sync_profile(),
        api.upgrades_for_buy(),
        api.boosts_for_buy(),
        api.list_tasks(),
        api.game_config(),
    )?;

    Ok(RawSnapshot {
        profile,
        upgrades: catalogue.upgrades,
        daily_combo: catalogue.daily_combo,
        boosts,
        tasks,
        config: Some(config),
    })
}
