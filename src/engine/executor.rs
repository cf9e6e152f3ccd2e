//! Action executor.
//!
//! Carries a `Decision` out against the game API. Sleeps are not executed
//! here; the cycle loop applies them as a real pause.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::game::GameApi;
use crate::strategy::Decision;

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// What executing one decision did.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub action: &'static str,
    /// Coins paid for an upgrade.
    pub coins_spent: f64,
    /// Coins expected from a claim.
    pub coins_claimed: f64,
    /// Whether a request was actually sent.
    pub sent: bool,
}

impl ExecutionReport {
    fn new(action: &'static str, sent: bool) -> Self {
        Self {
            action,
            coins_spent: 0.0,
            coins_claimed: 0.0,
            sent,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    dry_run: bool,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute a single decision.
    pub async fn execute(&self, api: &dyn GameApi, decision: &Decision) -> Result<ExecutionReport> {
        if self.dry_run && !matches!(decision, Decision::Sleep(_)) {
            info!(action = %decision, "[DRY RUN] Would execute");
            return Ok(ExecutionReport::new(decision.kind(), false));
        }

        let mut report = ExecutionReport::new(decision.kind(), true);

        match decision {
            Decision::ClaimCipher { cipher, bonus_coins } => {
                api.claim_daily_cipher(cipher)
                    .await
                    .context("Failed to claim daily cipher")?;
                report.coins_claimed = *bonus_coins;
            }
            Decision::ClaimCombo { bonus_coins } => {
                api.claim_daily_combo()
                    .await
                    .context("Failed to claim daily combo")?;
                report.coins_claimed = *bonus_coins;
            }
            Decision::CheckTask { task_id, reward_coins } => {
                api.check_task(task_id)
                    .await
                    .with_context(|| format!("Failed to check task {task_id}"))?;
                report.coins_claimed = *reward_coins;
            }
            Decision::Purchase { upgrade, .. } => {
                api.buy_upgrade(&upgrade.id)
                    .await
                    .with_context(|| format!("Failed to buy upgrade {}", upgrade.id))?;
                report.coins_spent = upgrade.price;
            }
            Decision::UseBoost { boost_id } => {
                api.buy_boost(boost_id)
                    .await
                    .with_context(|| format!("Failed to use boost {boost_id}"))?;
            }
            Decision::Tap { count, energy_after } => {
                api.tap(*count, energy_after.floor() as u64)
                    .await
                    .context("Failed to send taps")?;
            }
            Decision::Sleep(sleep) => {
                debug!(delay = sleep.delay, reason = %sleep.reason, "Nothing to execute");
                return Ok(ExecutionReport::new(decision.kind(), false));
            }
        }

        info!(action = %decision, "Executed");
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
