//! Mock game for integration testing.
//!
//! Provides a deterministic `GameApi` implementation backed by raw JSON
//! records that commands mutate the way the real game would. Everything
//! stays in memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use tapbot::game::{GameApi, UpgradeCatalogue};
use tapbot::types::Clock;

struct GameState {
    profile: Value,
    upgrades: Vec<Value>,
    daily_combo: Option<Value>,
    boosts: Vec<Value>,
    tasks: Vec<Value>,
    config: Value,
    calls: Vec<String>,
    /// If set, every command fails with this message.
    force_error: Option<String>,
    /// Daily claims fail while the rest of the game works.
    reject_claims: bool,
}

/// A mock clicker game. Clones share state, so a test can keep a handle
/// while the autopilot owns another.
#[derive(Clone)]
pub struct MockGame {
    state: Arc<Mutex<GameState>>,
}

fn num(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

impl MockGame {
    pub fn new(profile: Value) -> Self {
        Self {
            state: Arc::new(Mutex::new(GameState {
                profile,
                upgrades: Vec::new(),
                daily_combo: None,
                boosts: Vec::new(),
                tasks: Vec::new(),
                config: json!({"dailyCipher": {"cipher": "", "bonusCoins": 0, "isClaimed": true}}),
                calls: Vec::new(),
                force_error: None,
                reject_claims: false,
            })),
        }
    }

    pub fn with_upgrade(self, id: &str, price: f64, delta: f64) -> Self {
        self.with_raw_upgrade(json!({
            "id": id,
            "name": format!("Card {id}"),
            "level": 1,
            "price": price,
            "profitPerHourDelta": delta,
            "isAvailable": true,
            "isExpired": false,
            "maxLevel": 10
        }))
    }

    pub fn with_raw_upgrade(self, upgrade: Value) -> Self {
        self.state.lock().unwrap().upgrades.push(upgrade);
        self
    }

    pub fn with_cipher(self, cipher: &str, bonus: f64) -> Self {
        self.state.lock().unwrap().config =
            json!({"dailyCipher": {"cipher": cipher, "bonusCoins": bonus, "isClaimed": false}});
        self
    }

    pub fn with_task(self, id: &str, reward: f64) -> Self {
        self.state
            .lock()
            .unwrap()
            .tasks
            .push(json!({"id": id, "isCompleted": false, "rewardCoins": reward}));
        self
    }

    pub fn with_combo(self, upgrade_ids: &[&str], bonus: f64) -> Self {
        self.state.lock().unwrap().daily_combo = Some(json!({
            "bonusCoins": bonus,
            "isClaimed": false,
            "remainSeconds": 3600,
            "upgradeIds": upgrade_ids
        }));
        self
    }

    pub fn with_boost(self, boost: Value) -> Self {
        self.state.lock().unwrap().boosts.push(boost);
        self
    }

    /// Force all subsequent commands to fail.
    pub fn set_error(&self, msg: &str) {
        self.state.lock().unwrap().force_error = Some(msg.to_string());
    }

    /// Refuse cipher, combo and task claims.
    pub fn reject_claims(&self) {
        self.state.lock().unwrap().reject_claims = true;
    }

    /// Every command received so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn balance(&self) -> f64 {
        num(&self.state.lock().unwrap().profile, "balanceCoins")
    }

    pub fn profile_field(&self, key: &str) -> f64 {
        num(&self.state.lock().unwrap().profile, key)
    }

    fn command(&self, call: String, apply: impl FnOnce(&mut GameState) -> Result<()>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.force_error {
            return Err(anyhow!("{msg}"));
        }
        apply(&mut state)?;
        state.calls.push(call);
        Ok(())
    }
}

fn credit(profile: &mut Value, coins: f64) {
    profile["balanceCoins"] = json!(num(profile, "balanceCoins") + coins);
}

#[async_trait]
impl GameApi for MockGame {
    async fn sync_profile(&self) -> Result<Value> {
        Ok(self.state.lock().unwrap().profile.clone())
    }

    async fn upgrades_for_buy(&self) -> Result<UpgradeCatalogue> {
        let state = self.state.lock().unwrap();
        Ok(UpgradeCatalogue {
            upgrades: state.upgrades.clone(),
            daily_combo: state.daily_combo.clone(),
        })
    }

    async fn boosts_for_buy(&self) -> Result<Vec<Value>> {
        Ok(self.state.lock().unwrap().boosts.clone())
    }

    async fn list_tasks(&self) -> Result<Vec<Value>> {
        Ok(self.state.lock().unwrap().tasks.clone())
    }

    async fn game_config(&self) -> Result<Value> {
        Ok(self.state.lock().unwrap().config.clone())
    }

    async fn buy_upgrade(&self, upgrade_id: &str) -> Result<()> {
        self.command(format!("buy_upgrade:{upgrade_id}"), |state| {
            let upgrade = state
                .upgrades
                .iter_mut()
                .find(|u| u["id"] == upgrade_id)
                .ok_or_else(|| anyhow!("unknown upgrade {upgrade_id}"))?;
            let price = num(upgrade, "price");
            let delta = num(upgrade, "profitPerHourDelta");
            if price > num(&state.profile, "balanceCoins") {
                return Err(anyhow!("insufficient funds"));
            }
            upgrade["level"] = json!(num(upgrade, "level") as u64 + 1);
            upgrade["price"] = json!(price * 2.0);
            credit(&mut state.profile, -price);
            state.profile["earnPassivePerHour"] = json!(num(&state.profile, "earnPassivePerHour") + delta);
            Ok(())
        })
    }

    async fn tap(&self, count: u64, available_energy: u64) -> Result<()> {
        self.command(format!("tap:{count}:{available_energy}"), |state| {
            let earned = count as f64 * num(&state.profile, "earnPerTap");
            credit(&mut state.profile, earned);
            state.profile["availableTaps"] = json!(available_energy);
            Ok(())
        })
    }

    async fn buy_boost(&self, boost_id: &str) -> Result<()> {
        self.command(format!("buy_boost:{boost_id}"), |state| {
            let max = num(&state.profile, "maxTaps");
            state.profile["availableTaps"] = json!(max);
            for boost in state.boosts.iter_mut().filter(|b| b["id"] == boost_id) {
                boost["cooldownSeconds"] = json!(3600);
            }
            Ok(())
        })
    }

    async fn check_task(&self, task_id: &str) -> Result<()> {
        self.command(format!("check_task:{task_id}"), |state| {
            if state.reject_claims {
                return Err(anyhow!("400 Bad Request: task not done"));
            }
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t["id"] == task_id)
                .ok_or_else(|| anyhow!("unknown task {task_id}"))?;
            task["isCompleted"] = json!(true);
            let reward = num(task, "rewardCoins");
            credit(&mut state.profile, reward);
            Ok(())
        })
    }

    async fn claim_daily_cipher(&self, cipher: &str) -> Result<()> {
        self.command(format!("claim_daily_cipher:{cipher}"), |state| {
            if state.reject_claims {
                return Err(anyhow!("400 Bad Request: wrong cipher"));
            }
            let bonus = num(&state.config["dailyCipher"], "bonusCoins");
            state.config["dailyCipher"]["isClaimed"] = json!(true);
            credit(&mut state.profile, bonus);
            Ok(())
        })
    }

    async fn claim_daily_combo(&self) -> Result<()> {
        self.command("claim_daily_combo".to_string(), |state| {
            if state.reject_claims {
                return Err(anyhow!("400 Bad Request: combo incomplete"));
            }
            let combo = state
                .daily_combo
                .as_mut()
                .ok_or_else(|| anyhow!("no combo today"))?;
            combo["isClaimed"] = json!(true);
            let bonus = num(combo, "bonusCoins");
            credit(&mut state.profile, bonus);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A clock tests can move forward by hand.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(unix_secs: i64) -> Self {
        Self {
            now: Arc::new(Mutex::new(
                DateTime::from_timestamp(unix_secs, 0).unwrap_or_default(),
            )),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
