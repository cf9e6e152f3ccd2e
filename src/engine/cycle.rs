//! Cycle runner: the poll → build → decide → execute loop body.
//!
//! One `Autopilot` drives one account. Cycles never overlap: each one
//! fetches a fresh snapshot, decides on it immediately, executes, and
//! tells the caller how long to pause before the next poll.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::executor::{ExecutionReport, Executor};
use crate::game::{fetch_snapshot, GameApi};
use crate::strategy::{ClaimLog, Decision, DecisionEngine};
use crate::types::{Clock, SleepReason, Snapshot};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of a single cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub decision: Decision,
    pub execution: ExecutionReport,
    pub balance: f64,
    pub earn_per_hour: f64,
    pub upgrades_seen: usize,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{}: {} | balance={:.0} earn/h={:.0} upgrades={}",
            self.cycle_number, self.decision, self.balance, self.earn_per_hour, self.upgrades_seen,
        )
    }
}

// ---------------------------------------------------------------------------
// Session stats
// ---------------------------------------------------------------------------

/// Running totals for the whole session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub cycles: u64,
    pub purchases: u64,
    pub taps: u64,
    pub claims: u64,
    pub boosts: u64,
    pub coins_spent: f64,
    pub coins_claimed: f64,
    pub sleeps: HashMap<SleepReason, u64>,
}

impl SessionStats {
    pub fn record(&mut self, decision: &Decision, execution: &ExecutionReport) {
        self.cycles += 1;
        self.coins_spent += execution.coins_spent;
        self.coins_claimed += execution.coins_claimed;
        match decision {
            Decision::Purchase { .. } => self.purchases += 1,
            Decision::Tap { count, .. } => self.taps += count,
            Decision::UseBoost { .. } => self.boosts += 1,
            Decision::ClaimCipher { .. } | Decision::ClaimCombo { .. } | Decision::CheckTask { .. } => {
                self.claims += 1
            }
            Decision::Sleep(sleep) => *self.sleeps.entry(sleep.reason).or_insert(0) += 1,
        }
    }

    pub fn sleeps_for(&self, reason: SleepReason) -> u64 {
        self.sleeps.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles={} purchases={} taps={} claims={} boosts={} spent={:.0} claimed={:.0}",
            self.cycles,
            self.purchases,
            self.taps,
            self.claims,
            self.boosts,
            self.coins_spent,
            self.coins_claimed,
        )
    }
}

// ---------------------------------------------------------------------------
// Autopilot
// ---------------------------------------------------------------------------

pub struct Autopilot {
    api: Arc<dyn GameApi>,
    clock: Arc<dyn Clock>,
    engine: DecisionEngine,
    executor: Executor,
    action_pause: Duration,
    stats: SessionStats,
    claims: ClaimLog,
}

impl Autopilot {
    pub fn new(
        api: Arc<dyn GameApi>,
        clock: Arc<dyn Clock>,
        engine: DecisionEngine,
        executor: Executor,
        action_pause: Duration,
    ) -> Self {
        Self {
            api,
            clock,
            engine,
            executor,
            action_pause,
            stats: SessionStats::default(),
            claims: ClaimLog::default(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Daily claims tried so far; they are not retried this session.
    pub fn claims(&self) -> &ClaimLog {
        &self.claims
    }

    /// Run one cycle against the freshest snapshot.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle_number = self.stats.cycles + 1;
        debug!(cycle = cycle_number, "Starting cycle");

        let raw = fetch_snapshot(self.api.as_ref()).await?;
        let snapshot = Snapshot::from_raw(&raw, self.clock.as_ref());

        if let Some(top) = self.engine.ranked_upgrades(&snapshot).first() {
            debug!(
                upgrade_id = %top.upgrade.id,
                significance = top.significance,
                "Top-ranked upgrade"
            );
        }

        let decision = self
            .engine
            .decide_skipping(&snapshot, &self.claims, self.clock.as_ref());
        info!(
            cycle = cycle_number,
            action = decision.kind(),
            decision = %decision,
            balance = format!("{:.0}", snapshot.profile.balance),
            "Decision made"
        );

        // Recorded before sending: a rejected claim must not block the loop
        self.claims.record(&decision, &snapshot);
        let execution = self.executor.execute(self.api.as_ref(), &decision).await?;
        self.stats.record(&decision, &execution);

        Ok(CycleReport {
            cycle_number,
            decision,
            execution,
            balance: snapshot.profile.balance,
            earn_per_hour: snapshot.profile.earn_per_hour,
            upgrades_seen: snapshot.upgrades.len(),
            timestamp: self.clock.now(),
        })
    }

    /// How long to wait before the next cycle. A sleep only counts for the
    /// part not already spent since it was issued.
    pub fn pause_after(&self, report: &CycleReport) -> Duration {
        match &report.decision {
            Decision::Sleep(sleep) => sleep.remaining(self.clock.now()),
            _ => self.action_pause,
        }
    }

    /// How long to wait after a failed cycle.
    pub fn pause_after_error(&self) -> Duration {
        self.engine.sleep_policy().fallback()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
