//! Decision engine: daily claims, upgrade ranking, tapping and sleep.

pub mod significance;
pub mod sleep;

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::types::{Clock, DailyCombo, Sleep, Snapshot, Task, Upgrade, FULL_ENERGY_BOOST_ID};
use significance::{ScoredUpgrade, UpgradeScorer};
use sleep::{SleepConfig, SleepPolicy};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which actions the engine may choose.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub tap: bool,
    pub buy_upgrades: bool,
    pub use_energy_boost: bool,
    pub claim_cipher: bool,
    pub claim_combo: bool,
    /// Task ids worth checking whenever they are incomplete.
    pub tasks: Vec<String>,
    /// Taps below this are not worth a request.
    pub min_taps: u64,
    /// Minimum gap between two full-energy boosts.
    pub boost_min_interval_secs: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            tap: true,
            buy_upgrades: true,
            use_energy_boost: true,
            claim_cipher: true,
            claim_combo: true,
            tasks: vec!["streak_days".to_string()],
            min_taps: 1,
            boost_min_interval_secs: 3600,
        }
    }
}

/// Everything the engine is parameterised by.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Coins never spent on upgrades.
    pub min_balance: f64,
    pub sleep: SleepConfig,
    pub actions: ActionsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_balance: 0.0,
            sleep: SleepConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The one action chosen for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ClaimCipher { cipher: String, bonus_coins: f64 },
    ClaimCombo { bonus_coins: f64 },
    CheckTask { task_id: String, reward_coins: f64 },
    Purchase { upgrade: Upgrade, significance: f64 },
    UseBoost { boost_id: String },
    /// Spend `count` taps, leaving `energy_after` energy.
    Tap { count: u64, energy_after: f64 },
    Sleep(Sleep),
}

impl Decision {
    /// Short label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::ClaimCipher { .. } => "claim_cipher",
            Decision::ClaimCombo { .. } => "claim_combo",
            Decision::CheckTask { .. } => "check_task",
            Decision::Purchase { .. } => "purchase",
            Decision::UseBoost { .. } => "use_boost",
            Decision::Tap { .. } => "tap",
            Decision::Sleep(_) => "sleep",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::ClaimCipher { cipher, bonus_coins } => {
                write!(f, "claim cipher {cipher} (+{bonus_coins:.0})")
            }
            Decision::ClaimCombo { bonus_coins } => write!(f, "claim combo (+{bonus_coins:.0})"),
            Decision::CheckTask { task_id, reward_coins } => {
                write!(f, "check task {task_id} (+{reward_coins:.0})")
            }
            Decision::Purchase { upgrade, significance } => {
                write!(f, "buy {upgrade} (score {significance:.2})")
            }
            Decision::UseBoost { boost_id } => write!(f, "use boost {boost_id}"),
            Decision::Tap { count, energy_after } => {
                write!(f, "tap x{count} (energy left {energy_after:.0})")
            }
            Decision::Sleep(sleep) => write!(f, "{sleep}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Claim log
// ---------------------------------------------------------------------------

/// Daily claims already attempted this session, whether or not the game
/// accepted them. Keys change with each new day's reward, so a fresh
/// cipher, combo or streak day is claimable again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimLog {
    ciphers: HashSet<String>,
    combos: HashSet<String>,
    tasks: HashSet<String>,
}

impl ClaimLog {
    fn combo_key(combo: &DailyCombo) -> String {
        let mut ids = combo.upgrade_ids.clone();
        ids.sort();
        ids.join(",")
    }

    fn task_key(task: &Task) -> String {
        format!("{}:{}", task.id, task.days)
    }

    /// Remember a claim decision. Other decisions are ignored.
    pub fn record(&mut self, decision: &Decision, snapshot: &Snapshot) {
        match decision {
            Decision::ClaimCipher { cipher, .. } => {
                self.ciphers.insert(cipher.clone());
            }
            Decision::ClaimCombo { .. } => {
                if let Some(combo) = &snapshot.daily_combo {
                    self.combos.insert(Self::combo_key(combo));
                }
            }
            Decision::CheckTask { task_id, .. } => {
                if let Some(task) = snapshot.tasks.iter().find(|t| &t.id == task_id) {
                    self.tasks.insert(Self::task_key(task));
                }
            }
            _ => {}
        }
    }

    pub fn cipher_attempted(&self, cipher: &str) -> bool {
        self.ciphers.contains(cipher)
    }

    pub fn combo_attempted(&self, combo: &DailyCombo) -> bool {
        self.combos.contains(&Self::combo_key(combo))
    }

    pub fn task_attempted(&self, task: &Task) -> bool {
        self.tasks.contains(&Self::task_key(task))
    }

    pub fn len(&self) -> usize {
        self.ciphers.len() + self.combos.len() + self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Greedy single-step decision maker over one snapshot.
///
/// Precedence: daily cipher, daily combo, allow-listed tasks, best
/// upgrade, taps, full-energy boost, then sleep.
pub struct DecisionEngine {
    config: EngineConfig,
    scorer: UpgradeScorer,
    sleep: SleepPolicy,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scorer: UpgradeScorer::new(config.min_balance),
            sleep: SleepPolicy::new(config.sleep.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sleep_policy(&self) -> &SleepPolicy {
        &self.sleep
    }

    /// Eligible upgrades, best first.
    pub fn ranked_upgrades(&self, snapshot: &Snapshot) -> Vec<ScoredUpgrade> {
        self.scorer.rank(&snapshot.upgrades, &snapshot.profile)
    }

    /// Pick the next action for this snapshot.
    pub fn decide(&self, snapshot: &Snapshot, clock: &dyn Clock) -> Decision {
        self.decide_skipping(snapshot, &ClaimLog::default(), clock)
    }

    /// Like `decide`, but passes over daily claims already in `claims`.
    pub fn decide_skipping(&self, snapshot: &Snapshot, claims: &ClaimLog, clock: &dyn Clock) -> Decision {
        if let Some(claim) = self.daily_claim(snapshot, claims) {
            return claim;
        }

        let actions = &self.config.actions;
        let profile = &snapshot.profile;

        let best = if actions.buy_upgrades {
            self.scorer.best(&snapshot.upgrades, profile)
        } else {
            None
        };

        if let Some(best) = &best {
            let cooldown = SleepPolicy::cooldown_remaining(&best.upgrade, profile, clock.now());
            let spendable = profile.spending_balance(self.config.min_balance);
            if cooldown == 0 && best.upgrade.is_affordable(spendable) {
                return Decision::Purchase {
                    upgrade: best.upgrade.clone(),
                    significance: best.significance,
                };
            }
            debug!(
                upgrade_id = %best.upgrade.id,
                cooldown,
                price = best.upgrade.price,
                spendable,
                "Best upgrade not purchasable yet"
            );
        }

        let taps = profile.available_taps();
        if actions.tap && taps >= actions.min_taps.max(1) {
            return Decision::Tap {
                count: taps,
                energy_after: (profile.available_energy - taps as f64 * profile.earn_per_tap).max(0.0),
            };
        }

        if let Some(boost_id) = self.energy_boost(snapshot, clock) {
            return Decision::UseBoost { boost_id };
        }

        Decision::Sleep(self.sleep_for(snapshot, best.as_ref(), clock))
    }

    /// Free daily rewards, in order: cipher, combo, tasks.
    fn daily_claim(&self, snapshot: &Snapshot, claims: &ClaimLog) -> Option<Decision> {
        let actions = &self.config.actions;

        if actions.claim_cipher {
            if let Some(config) = &snapshot.config {
                let cipher = &config.daily_cipher;
                if !cipher.is_claimed && !cipher.cipher.is_empty() && !claims.cipher_attempted(&cipher.cipher) {
                    return Some(Decision::ClaimCipher {
                        cipher: cipher.cipher.clone(),
                        bonus_coins: cipher.bonus_coins,
                    });
                }
            }
        }

        if actions.claim_combo {
            if let Some(combo) = snapshot
                .daily_combo
                .as_ref()
                .filter(|c| c.is_claimable() && !claims.combo_attempted(c))
            {
                return Some(Decision::ClaimCombo {
                    bonus_coins: combo.bonus_coins,
                });
            }
        }

        snapshot
            .tasks
            .iter()
            .find(|t| !t.is_completed && actions.tasks.contains(&t.id) && !claims.task_attempted(t))
            .map(|t| Decision::CheckTask {
                task_id: t.id.clone(),
                reward_coins: t.reward_coins,
            })
    }

    /// The full-energy boost, when it is ready and was not used recently.
    fn energy_boost(&self, snapshot: &Snapshot, clock: &dyn Clock) -> Option<String> {
        let actions = &self.config.actions;
        let profile = &snapshot.profile;
        if !actions.use_energy_boost || !actions.tap || !profile.can_tap() {
            return None;
        }

        let boost = snapshot.boost(FULL_ENERGY_BOOST_ID).filter(|b| b.is_ready())?;
        let since_last = clock.now().timestamp() - profile.last_energy_boost_time;
        if since_last < actions.boost_min_interval_secs as i64 {
            debug!(since_last, "Full-energy boost used recently");
            return None;
        }
        Some(boost.id.clone())
    }

    /// Why and how long to idle. The best upgrade's wait wins unless
    /// tapping is possible and energy comes back sooner.
    fn sleep_for(&self, snapshot: &Snapshot, best: Option<&ScoredUpgrade>, clock: &dyn Clock) -> Sleep {
        let profile = &snapshot.profile;
        let tapping = self.config.actions.tap && profile.can_tap();
        let energy = if tapping {
            self.sleep.energy_recover(profile, clock)
        } else {
            self.sleep.idle(clock)
        };

        let Some(best) = best else {
            return energy;
        };

        let upgrade = if SleepPolicy::cooldown_remaining(&best.upgrade, profile, clock.now()) > 0 {
            self.sleep.upgrade_cooldown(&best.upgrade, profile, clock)
        } else {
            self.sleep
                .upgrade_money(&best.upgrade, profile, self.config.min_balance, clock)
        };

        if tapping && energy.delay < upgrade.delay {
            energy
        } else {
            upgrade
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
