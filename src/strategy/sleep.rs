//! Sleep / backoff policy.
//!
//! Turns "nothing to do right now" into a concrete pause: how long to
//! wait for an upgrade cooldown, for passive income to fund an upgrade, or
//! for energy to refill. Every delay is clamped to the configured poll
//! bounds; rates that cannot be divided by fall back to a fixed interval.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::types::{positive_rate, Clock, Profile, Sleep, SleepReason, Upgrade};

const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Poll bounds for every sleep the engine emits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Shortest pause ever returned.
    pub min_delay_secs: u64,
    /// Longest single pause. `None` (or 0 in TOML) lets long waits through
    /// unclamped.
    pub max_delay_secs: Option<u64>,
    /// Pause used when a rate is zero and no real estimate exists.
    pub fallback_delay_secs: u64,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 5,
            max_delay_secs: Some(3600),
            fallback_delay_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct SleepPolicy {
    config: SleepConfig,
}

impl SleepPolicy {
    pub fn new(config: SleepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    /// Clamp a raw delay into `[min_delay_secs, max_delay_secs]`.
    pub fn clamp(&self, secs: u64) -> u64 {
        let floored = secs.max(self.config.min_delay_secs);
        match self.config.max_delay_secs {
            Some(max) if max > 0 => floored.min(max.max(self.config.min_delay_secs)),
            _ => floored,
        }
    }

    /// Cooldown seconds still left on `upgrade` at `now`, counting from
    /// when the snapshot was taken.
    pub fn cooldown_remaining(upgrade: &Upgrade, profile: &Profile, now: DateTime<Utc>) -> u64 {
        let elapsed = profile.age_secs(now) as u64;
        upgrade.cooldown_seconds.saturating_sub(elapsed)
    }

    /// Wait out the rest of an upgrade's cooldown.
    pub fn upgrade_cooldown(&self, upgrade: &Upgrade, profile: &Profile, clock: &dyn Clock) -> Sleep {
        let remaining = Self::cooldown_remaining(upgrade, profile, clock.now());
        Sleep::new(self.clamp(remaining), SleepReason::WaitUpgradeCooldown, clock)
    }

    /// Wait for passive income to cover the upgrade's price.
    pub fn upgrade_money(
        &self,
        upgrade: &Upgrade,
        profile: &Profile,
        min_balance: f64,
        clock: &dyn Clock,
    ) -> Sleep {
        let gap = (upgrade.price - profile.spending_balance(min_balance)).max(0.0);
        let delay = match positive_rate("profile.earn_per_hour", profile.earn_per_hour) {
            Ok(rate) => (gap * SECS_PER_HOUR / rate).ceil() as u64,
            Err(e) => {
                debug!(upgrade_id = %upgrade.id, error = %e, "Using fallback money sleep");
                self.config.fallback_delay_secs
            }
        };
        Sleep::new(self.clamp(delay), SleepReason::WaitUpgradeMoney, clock)
    }

    /// Wait for energy to refill to the maximum.
    pub fn energy_recover(&self, profile: &Profile, clock: &dyn Clock) -> Sleep {
        let delay = match positive_rate("profile.energy_recover_per_sec", profile.energy_recover_per_sec) {
            Ok(rate) => (profile.energy_deficit() / rate).ceil() as u64,
            Err(e) => {
                debug!(error = %e, "Using fallback energy sleep");
                self.config.fallback_delay_secs
            }
        };
        Sleep::new(self.clamp(delay), SleepReason::WaitEnergyRecover, clock)
    }

    /// Energy that cannot be spent on taps: recheck after the fallback
    /// interval instead of polling a full bar.
    pub fn idle(&self, clock: &dyn Clock) -> Sleep {
        Sleep::new(
            self.clamp(self.config.fallback_delay_secs),
            SleepReason::WaitEnergyRecover,
            clock,
        )
    }

    /// Pause after a failed cycle.
    pub fn fallback(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.clamp(self.config.fallback_delay_secs))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
