//! Upgrade significance scoring.
//!
//! Ranks purchasable upgrades by an estimated "hours until worth it"
//! score. Lower is better: payback time, plus cooldown expressed in hours,
//! plus the hours of passive income still needed to afford the card.

use std::cmp::Ordering;

use tracing::debug;

use crate::types::{positive_rate, Profile, Upgrade};

const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Scored upgrade
// ---------------------------------------------------------------------------

/// An eligible upgrade together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUpgrade {
    pub upgrade: Upgrade,
    pub significance: f64,
}

impl ScoredUpgrade {
    fn rank(&self, other: &Self) -> Ordering {
        self.significance
            .total_cmp(&other.significance)
            .then_with(|| self.upgrade.id.cmp(&other.upgrade.id))
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores upgrades against a profile, keeping `min_balance` in reserve.
pub struct UpgradeScorer {
    min_balance: f64,
}

impl UpgradeScorer {
    pub fn new(min_balance: f64) -> Self {
        Self { min_balance }
    }

    pub fn min_balance(&self) -> f64 {
        self.min_balance
    }

    /// Cost-per-value score of a single upgrade.
    ///
    /// `price / delta + cooldown / 3600 + max(0, (price - spendable) / earn_per_hour)`
    ///
    /// Free upgrades score exactly 0. Cards with no hourly yield score 0
    /// when their welcome coins cover the price and +inf otherwise. A
    /// funding gap that passive income can never close is +inf.
    pub fn significance(&self, upgrade: &Upgrade, profile: &Profile) -> f64 {
        if upgrade.price == 0.0 {
            return 0.0;
        }

        let payback_hours = match positive_rate("upgrade.earn_per_hour", upgrade.earn_per_hour) {
            Ok(delta) => upgrade.price / delta,
            Err(_) if upgrade.welcome_coins >= upgrade.price => return 0.0,
            Err(_) => return f64::INFINITY,
        };

        let cooldown_hours = upgrade.cooldown_seconds as f64 / SECS_PER_HOUR;

        let gap = upgrade.price - profile.spending_balance(self.min_balance);
        let saving_hours = if gap <= 0.0 {
            0.0
        } else {
            match positive_rate("profile.earn_per_hour", profile.earn_per_hour) {
                Ok(rate) => gap / rate,
                Err(e) => {
                    debug!(upgrade_id = %upgrade.id, error = %e, "Funding gap cannot close");
                    f64::INFINITY
                }
            }
        };

        payback_hours + cooldown_hours + saving_hours
    }

    /// Score every eligible upgrade, best first. Equal scores fall back to
    /// ascending id.
    pub fn rank(&self, upgrades: &[Upgrade], profile: &Profile) -> Vec<ScoredUpgrade> {
        let mut scored: Vec<ScoredUpgrade> = upgrades
            .iter()
            .filter(|u| u.can_upgrade())
            .map(|u| ScoredUpgrade {
                significance: self.significance(u, profile),
                upgrade: u.clone(),
            })
            .collect();

        scored.sort_by(ScoredUpgrade::rank);

        debug!(
            candidates = upgrades.len(),
            eligible = scored.len(),
            best = scored.first().map(|s| s.upgrade.id.as_str()).unwrap_or("-"),
            "Upgrades ranked"
        );

        scored
    }

    /// The single best eligible upgrade, if any.
    pub fn best(&self, upgrades: &[Upgrade], profile: &Profile) -> Option<ScoredUpgrade> {
        upgrades
            .iter()
            .filter(|u| u.can_upgrade())
            .map(|u| ScoredUpgrade {
                significance: self.significance(u, profile),
                upgrade: u.clone(),
            })
            .min_by(ScoredUpgrade::rank)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
