//! Shared types for the TAPBOT agent.
//!
//! The snapshot model: immutable, normalized views of the player's state
//! built once per polling cycle from the raw key-value records returned by
//! the game API. Nothing here is mutated after construction; a fresh
//! `Snapshot` is built every cycle.

use chrono::{DateTime, Duration, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Boost id whose last use is tracked on the profile.
pub const FULL_ENERGY_BOOST_ID: &str = "BoostFullAvailableTaps";

/// Number of distinct upgrades that complete the daily combo.
pub const COMBO_SIZE: usize = 3;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for snapshot and sleep construction.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock frozen at the given unix timestamp (seconds).
    pub fn at(unix_secs: i64) -> Self {
        Self(DateTime::from_timestamp(unix_secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for TAPBOT.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TapbotError {
    #[error("Malformed {entity} record: {reason}")]
    MalformedRecord { entity: &'static str, reason: String },

    #[error("Degenerate rate {rate} = {value}")]
    DegenerateRate { rate: &'static str, value: f64 },

    #[error("Game API error ({endpoint}): {message}")]
    Api { endpoint: String, message: String },
}

/// Accept `value` as a divisor only when it is strictly positive.
pub fn positive_rate(rate: &'static str, value: f64) -> Result<f64, TapbotError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(TapbotError::DegenerateRate { rate, value })
    }
}

/// Decode a raw record into its DTO, mapping any missing required field
/// to `MalformedRecord`.
fn decode<T: DeserializeOwned>(entity: &'static str, data: &Value) -> Result<T, TapbotError> {
    T::deserialize(data).map_err(|e| TapbotError::MalformedRecord {
        entity,
        reason: e.to_string(),
    })
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The player's current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub balance: f64,
    pub earn_per_hour: f64,
    pub earn_per_sec: f64,
    pub available_energy: f64,
    pub energy_recover_per_sec: f64,
    pub earn_per_tap: f64,
    pub max_energy: f64,
    /// Unix seconds of the last passive-earn settlement.
    pub last_passive_earn: f64,
    pub exchange_id: Option<String>,
    /// When this profile was built.
    pub update_time: DateTime<Utc>,
    /// Unix seconds of the last full-energy boost, 0 if never used.
    pub last_energy_boost_time: i64,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance={:.0} earn/h={:.0} energy={:.0}/{:.0} (+{:.0}/s) tap={:.0}",
            self.balance,
            self.earn_per_hour,
            self.available_energy,
            self.max_energy,
            self.energy_recover_per_sec,
            self.earn_per_tap,
        )
    }
}

impl Profile {
    /// Build a profile from the raw `clickerUser` record. Every field is
    /// optional, so this never fails.
    pub fn from_raw(data: &Value, clock: &dyn Clock) -> Self {
        Self {
            balance: number(data, "balanceCoins"),
            earn_per_hour: number(data, "earnPassivePerHour"),
            earn_per_sec: number(data, "earnPassivePerSec"),
            available_energy: number(data, "availableTaps"),
            energy_recover_per_sec: number(data, "tapsRecoverPerSec"),
            earn_per_tap: number(data, "earnPerTap"),
            max_energy: number(data, "maxTaps"),
            last_passive_earn: number(data, "lastPassiveEarn"),
            exchange_id: data
                .get("exchangeId")
                .and_then(Value::as_str)
                .map(String::from),
            update_time: clock.now(),
            last_energy_boost_time: last_energy_boost_time(data.get("boosts")),
        }
    }

    /// Whole taps the current energy pays for. Zero when a tap earns
    /// nothing.
    pub fn available_taps(&self) -> u64 {
        match positive_rate("earn_per_tap", self.earn_per_tap) {
            Ok(per_tap) => (self.available_energy.max(0.0) / per_tap).floor() as u64,
            Err(_) => 0,
        }
    }

    /// Balance left over after keeping `min_balance` in reserve.
    pub fn spending_balance(&self, min_balance: f64) -> f64 {
        self.balance - min_balance
    }

    /// Energy missing to a full bar (never negative).
    pub fn energy_deficit(&self) -> f64 {
        (self.max_energy - self.available_energy).max(0.0)
    }

    /// Seconds elapsed between construction and `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.update_time).num_seconds().max(0)
    }

    /// Whether tapping can earn anything at all.
    pub fn can_tap(&self) -> bool {
        self.earn_per_tap > 0.0
    }
}

/// Look up the last use of the full-energy boost in a profile's `boosts`
/// field. Accepts both a list of `{id, lastUpgradeAt}` records and an
/// object keyed by boost id; anything else yields 0.
pub fn last_energy_boost_time(boosts: Option<&Value>) -> i64 {
    let entry = match boosts {
        Some(Value::Array(list)) => list
            .iter()
            .find(|b| b.get("id").and_then(Value::as_str) == Some(FULL_ENERGY_BOOST_ID)),
        Some(Value::Object(map)) => map.get(FULL_ENERGY_BOOST_ID),
        _ => None,
    };
    entry
        .and_then(|b| b.get("lastUpgradeAt"))
        .and_then(timestamp)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpgrade {
    id: String,
    name: String,
    level: u32,
    price: f64,
    profit_per_hour_delta: f64,
    is_available: bool,
    is_expired: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    cooldown_seconds: u64,
    #[serde(default)]
    max_level: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    welcome_coins: f64,
    #[serde(default)]
    condition: Option<Value>,
}

/// A purchasable card from the upgrade catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct Upgrade {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub price: f64,
    /// Change to hourly passive earn once bought.
    pub earn_per_hour: f64,
    pub is_available: bool,
    pub is_expired: bool,
    pub cooldown_seconds: u64,
    pub max_level: u32,
    /// One-time coins granted on purchase.
    pub welcome_coins: f64,
    pub condition: Option<String>,
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] lvl {} price={:.0} +{:.0}/h",
            self.name, self.id, self.level, self.price, self.earn_per_hour,
        )?;
        if self.cooldown_seconds > 0 {
            write!(f, " cooldown={}s", self.cooldown_seconds)?;
        }
        Ok(())
    }
}

impl Upgrade {
    pub fn from_raw(data: &Value) -> Result<Self, TapbotError> {
        let raw: RawUpgrade = decode("Upgrade", data)?;
        let condition = raw.condition.and_then(|c| match c {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        Ok(Self {
            max_level: raw.max_level.unwrap_or(raw.level),
            id: raw.id,
            name: raw.name,
            level: raw.level,
            price: raw.price,
            earn_per_hour: raw.profit_per_hour_delta,
            is_available: raw.is_available,
            is_expired: raw.is_expired,
            cooldown_seconds: raw.cooldown_seconds,
            welcome_coins: raw.welcome_coins,
            condition,
        })
    }

    /// Whether the provider lets us buy this card this cycle and it yields
    /// something.
    pub fn can_upgrade(&self) -> bool {
        self.is_available
            && !self.is_expired
            && (self.earn_per_hour != 0.0 || self.welcome_coins != 0.0)
            && self.level <= self.max_level
    }

    pub fn is_affordable(&self, spendable: f64) -> bool {
        self.price <= spendable
    }

    /// Helper to build a test upgrade with sensible defaults.
    #[cfg(test)]
    pub fn sample(id: &str, price: f64, earn_per_hour: f64) -> Self {
        Upgrade {
            id: id.to_string(),
            name: format!("Card {id}"),
            level: 1,
            price,
            earn_per_hour,
            is_available: true,
            is_expired: false,
            cooldown_seconds: 0,
            max_level: 20,
            welcome_coins: 0.0,
            condition: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Boost
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoost {
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    cooldown_seconds: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    level: u32,
    #[serde(default)]
    max_level: Option<u32>,
}

/// A limited-use player boost (e.g. full-energy refill).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boost {
    pub id: String,
    pub cooldown_seconds: u64,
    pub level: u32,
    pub max_level: u32,
}

impl Boost {
    pub fn from_raw(data: &Value) -> Result<Self, TapbotError> {
        let raw: RawBoost = decode("Boost", data)?;
        Ok(Self {
            max_level: raw.max_level.unwrap_or(raw.level),
            id: raw.id,
            cooldown_seconds: raw.cooldown_seconds,
            level: raw.level,
        })
    }

    /// Off cooldown with uses left for today.
    pub fn is_ready(&self) -> bool {
        self.cooldown_seconds == 0 && self.level <= self.max_level
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    id: String,
    is_completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    reward_coins: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub is_completed: bool,
    pub reward_coins: f64,
    /// Streak length for recurring tasks.
    pub days: u32,
}

impl Task {
    pub fn from_raw(data: &Value) -> Result<Self, TapbotError> {
        let raw: RawTask = decode("Task", data)?;
        Ok(Self {
            id: raw.id,
            is_completed: raw.is_completed,
            reward_coins: raw.reward_coins,
            days: raw.days,
        })
    }
}

// ---------------------------------------------------------------------------
// Daily combo & cipher
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDailyCombo {
    bonus_coins: f64,
    is_claimed: bool,
    remain_seconds: u64,
    upgrade_ids: Vec<String>,
}

/// Bonus for buying a specific set of upgrades within one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCombo {
    pub bonus_coins: f64,
    pub is_claimed: bool,
    pub remain_seconds: u64,
    /// Combo upgrades bought so far today, in purchase order.
    pub upgrade_ids: Vec<String>,
}

impl DailyCombo {
    pub fn from_raw(data: &Value) -> Result<Self, TapbotError> {
        let raw: RawDailyCombo = decode("DailyCombo", data)?;
        Ok(Self {
            bonus_coins: raw.bonus_coins,
            is_claimed: raw.is_claimed,
            remain_seconds: raw.remain_seconds,
            upgrade_ids: raw.upgrade_ids,
        })
    }

    pub fn is_claimable(&self) -> bool {
        !self.is_claimed && self.remain_seconds > 0 && self.upgrade_ids.len() >= COMBO_SIZE
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDailyCipher {
    cipher: String,
    bonus_coins: f64,
    is_claimed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameConfig {
    daily_cipher: RawDailyCipher,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyCipher {
    pub cipher: String,
    pub bonus_coins: f64,
    pub is_claimed: bool,
}

/// Daily game configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub daily_cipher: DailyCipher,
}

impl GameConfig {
    pub fn from_raw(data: &Value) -> Result<Self, TapbotError> {
        let raw: RawGameConfig = decode("GameConfig", data)?;
        Ok(Self {
            daily_cipher: DailyCipher {
                cipher: raw.daily_cipher.cipher,
                bonus_coins: raw.daily_cipher.bonus_coins,
                is_claimed: raw.daily_cipher.is_claimed,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Raw provider records for one polling cycle.
#[derive(Debug, Clone, Default)]
pub struct RawSnapshot {
    pub profile: Value,
    pub upgrades: Vec<Value>,
    pub daily_combo: Option<Value>,
    pub boosts: Vec<Value>,
    pub tasks: Vec<Value>,
    pub config: Option<Value>,
}

/// Everything the engine needs to make one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub profile: Profile,
    pub upgrades: Vec<Upgrade>,
    pub boosts: Vec<Boost>,
    pub tasks: Vec<Task>,
    pub daily_combo: Option<DailyCombo>,
    pub config: Option<GameConfig>,
}

impl Snapshot {
    /// Build the typed snapshot. Malformed entities are logged and
    /// skipped; the snapshot itself always builds.
    pub fn from_raw(raw: &RawSnapshot, clock: &dyn Clock) -> Self {
        Self {
            profile: Profile::from_raw(&raw.profile, clock),
            upgrades: collect_valid(&raw.upgrades, Upgrade::from_raw),
            boosts: collect_valid(&raw.boosts, Boost::from_raw),
            tasks: collect_valid(&raw.tasks, Task::from_raw),
            daily_combo: raw.daily_combo.as_ref().and_then(|c| keep_valid(c, DailyCombo::from_raw)),
            config: raw.config.as_ref().and_then(|c| keep_valid(c, GameConfig::from_raw)),
        }
    }

    pub fn boost(&self, id: &str) -> Option<&Boost> {
        self.boosts.iter().find(|b| b.id == id)
    }

    pub fn upgrade(&self, id: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.id == id)
    }
}

fn keep_valid<T>(record: &Value, build: impl Fn(&Value) -> Result<T, TapbotError>) -> Option<T> {
    match build(record) {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!(error = %e, "Skipping malformed record");
            None
        }
    }
}

fn collect_valid<T>(records: &[Value], build: impl Fn(&Value) -> Result<T, TapbotError>) -> Vec<T> {
    records.iter().filter_map(|r| keep_valid(r, &build)).collect()
}

// ---------------------------------------------------------------------------
// Sleep
// ---------------------------------------------------------------------------

/// Why the autopilot is idling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepReason {
    WaitUpgradeCooldown,
    WaitUpgradeMoney,
    WaitEnergyRecover,
}

impl SleepReason {
    pub const ALL: &'static [SleepReason] = &[
        SleepReason::WaitUpgradeCooldown,
        SleepReason::WaitUpgradeMoney,
        SleepReason::WaitEnergyRecover,
    ];
}

impl fmt::Display for SleepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepReason::WaitUpgradeCooldown => write!(f, "WAIT_UPGRADE_COOLDOWN"),
            SleepReason::WaitUpgradeMoney => write!(f, "WAIT_UPGRADE_MONEY"),
            SleepReason::WaitEnergyRecover => write!(f, "WAIT_ENERGY_RECOVER"),
        }
    }
}

/// A one-shot pause directive for the cycle loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sleep {
    /// Seconds to pause.
    pub delay: u64,
    pub reason: SleepReason,
    pub created_time: DateTime<Utc>,
}

impl fmt::Display for Sleep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sleep {}s ({})", self.delay, self.reason)
    }
}

impl Sleep {
    pub fn new(delay: u64, reason: SleepReason, clock: &dyn Clock) -> Self {
        Self {
            delay,
            reason,
            created_time: clock.now(),
        }
    }

    /// When the pause ends.
    /// Saturates at the latest representable instant for delays past
    /// chrono's range.
    pub fn wake_time(&self) -> DateTime<Utc> {
        i64::try_from(self.delay)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|delay| self.created_time.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Part of the pause still left at `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.wake_time() - now).to_std().unwrap_or_default()
    }

    /// Whether the directive was held past its whole delay.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.wake_time()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
