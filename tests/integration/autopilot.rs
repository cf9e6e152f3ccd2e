//! End-to-end cycles: mock game → snapshot → decision → execution.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use tapbot::engine::cycle::{Autopilot, CycleReport};
use tapbot::engine::executor::Executor;
use tapbot::strategy::{Decision, DecisionEngine, EngineConfig};
use tapbot::types::{SleepReason, FULL_ENERGY_BOOST_ID};

use crate::mock_game::{ManualClock, MockGame};

const T0: i64 = 1_700_000_000;

fn pilot(game: &MockGame, clock: &ManualClock, dry_run: bool) -> Autopilot {
    Autopilot::new(
        Arc::new(game.clone()),
        Arc::new(clock.clone()),
        DecisionEngine::new(EngineConfig::default()),
        Executor::new(dry_run),
        Duration::from_secs(2),
    )
}

async fn cycle(pilot: &mut Autopilot) -> CycleReport {
    pilot.run_cycle().await.expect("cycle should succeed")
}

fn tapper() -> serde_json::Value {
    json!({
        "balanceCoins": 1000,
        "earnPassivePerHour": 100,
        "availableTaps": 50,
        "maxTaps": 500,
        "tapsRecoverPerSec": 5,
        "earnPerTap": 1
    })
}

#[tokio::test]
async fn test_session_claims_buys_taps_then_sleeps() {
    let game = MockGame::new(tapper())
        .with_cipher("BTC", 100.0)
        .with_upgrade("mine", 800.0, 100.0);
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    // Free reward first
    let report = cycle(&mut pilot).await;
    assert_eq!(report.decision.kind(), "claim_cipher");
    assert_eq!(game.balance(), 1100.0);

    // 800 / 100 = 8 and affordable
    let report = cycle(&mut pilot).await;
    match &report.decision {
        Decision::Purchase { upgrade, significance } => {
            assert_eq!(upgrade.id, "mine");
            assert!((significance - 8.0).abs() < 1e-9);
        }
        other => panic!("expected purchase, got {other}"),
    }
    assert_eq!(game.balance(), 300.0);
    assert_eq!(game.profile_field("earnPassivePerHour"), 200.0);

    // Next level costs 1600: spend energy meanwhile
    let report = cycle(&mut pilot).await;
    assert_eq!(report.decision, Decision::Tap { count: 50, energy_after: 0.0 });
    assert_eq!(game.balance(), 350.0);

    // Energy refills in 500 / 5 = 100s, well before the money arrives
    let report = cycle(&mut pilot).await;
    match &report.decision {
        Decision::Sleep(sleep) => {
            assert_eq!(sleep.reason, SleepReason::WaitEnergyRecover);
            assert_eq!(sleep.delay, 100);
        }
        other => panic!("expected sleep, got {other}"),
    }
    assert_eq!(pilot.pause_after(&report), Duration::from_secs(100));

    clock.advance(30);
    assert_eq!(pilot.pause_after(&report), Duration::from_secs(70));

    assert_eq!(
        game.calls(),
        vec!["claim_daily_cipher:BTC", "buy_upgrade:mine", "tap:50:0"]
    );

    let stats = pilot.stats();
    assert_eq!(stats.cycles, 4);
    assert_eq!(stats.purchases, 1);
    assert_eq!(stats.claims, 1);
    assert_eq!(stats.taps, 50);
    assert_eq!(stats.coins_spent, 800.0);
    assert_eq!(stats.coins_claimed, 100.0);
    assert_eq!(stats.sleeps_for(SleepReason::WaitEnergyRecover), 1);
}

#[tokio::test]
async fn test_money_sleep_is_capped() {
    let game = MockGame::new(json!({
        "balanceCoins": 500,
        "earnPassivePerHour": 50,
        "availableTaps": 0,
        "maxTaps": 100,
        "tapsRecoverPerSec": 0,
        "earnPerTap": 0
    }))
    .with_upgrade("exchange", 1000.0, 100.0);
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    // 500 * 3600 / 50 = 36000s, capped at the default hour
    let report = cycle(&mut pilot).await;
    match &report.decision {
        Decision::Sleep(sleep) => {
            assert_eq!(sleep.reason, SleepReason::WaitUpgradeMoney);
            assert_eq!(sleep.delay, 3600);
        }
        other => panic!("expected sleep, got {other}"),
    }
    assert!(game.calls().is_empty());
}

#[tokio::test]
async fn test_combo_and_task_claimed_before_upgrades() {
    let game = MockGame::new(tapper())
        .with_combo(&["a", "b", "c"], 5000.0)
        .with_task("streak_days", 500.0)
        .with_task("join_youtube", 100_000.0)
        .with_upgrade("mine", 800.0, 100.0);
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    assert_eq!(cycle(&mut pilot).await.decision.kind(), "claim_combo");
    assert_eq!(cycle(&mut pilot).await.decision.kind(), "check_task");
    assert_eq!(cycle(&mut pilot).await.decision.kind(), "purchase");

    assert_eq!(
        game.calls(),
        vec!["claim_daily_combo", "check_task:streak_days", "buy_upgrade:mine"]
    );
    assert_eq!(game.balance(), 1000.0 + 5000.0 + 500.0 - 800.0);
    assert_eq!(pilot.stats().claims, 2);
}

#[tokio::test]
async fn test_full_energy_boost_then_tap() {
    let game = MockGame::new(json!({
        "balanceCoins": 0,
        "availableTaps": 0,
        "maxTaps": 1000,
        "tapsRecoverPerSec": 1,
        "earnPerTap": 1
    }))
    .with_boost(json!({"id": FULL_ENERGY_BOOST_ID, "cooldownSeconds": 0, "level": 1, "maxLevel": 6}));
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    assert_eq!(cycle(&mut pilot).await.decision.kind(), "use_boost");
    assert_eq!(
        cycle(&mut pilot).await.decision,
        Decision::Tap { count: 1000, energy_after: 0.0 }
    );

    // Boost now on cooldown
    match cycle(&mut pilot).await.decision {
        Decision::Sleep(sleep) => {
            assert_eq!(sleep.reason, SleepReason::WaitEnergyRecover);
            assert_eq!(sleep.delay, 1000);
        }
        other => panic!("expected sleep, got {other}"),
    }
    assert_eq!(pilot.stats().boosts, 1);
    assert_eq!(game.balance(), 1000.0);
}

#[tokio::test]
async fn test_malformed_upgrade_is_skipped() {
    let game = MockGame::new(tapper())
        .with_raw_upgrade(json!({"id": "broken", "name": "No price", "level": 1}))
        .with_upgrade("mine", 800.0, 100.0);
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    let report = cycle(&mut pilot).await;
    assert_eq!(report.upgrades_seen, 1);
    assert_eq!(game.calls(), vec!["buy_upgrade:mine"]);
}

#[tokio::test]
async fn test_dry_run_never_sends_commands() {
    let game = MockGame::new(tapper())
        .with_cipher("BTC", 100.0)
        .with_upgrade("mine", 800.0, 100.0);
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, true);

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let report = cycle(&mut pilot).await;
        assert!(!report.execution.sent);
        kinds.push(report.decision.kind());
    }
    // The cipher is tried once, then the dry run previews the purchase
    assert_eq!(kinds, vec!["claim_cipher", "purchase", "purchase"]);
    assert!(game.calls().is_empty());
    assert_eq!(game.balance(), 1000.0);
    assert_eq!(pilot.stats().cycles, 3);
}

#[tokio::test]
async fn test_rejected_claims_do_not_block_play() {
    let game = MockGame::new(tapper())
        .with_cipher("WRONG", 1_000_000.0)
        .with_combo(&["a", "b", "c"], 5000.0)
        .with_task("streak_days", 500.0)
        .with_upgrade("mine", 800.0, 100.0);
    game.reject_claims();
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    let err = pilot.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("Failed to claim daily cipher"));
    let err = pilot.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("Failed to claim daily combo"));
    let err = pilot.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("Failed to check task streak_days"));
    assert_eq!(pilot.claims().len(), 3);

    // Every claim was tried once: the loop moves on to buying and tapping
    assert_eq!(cycle(&mut pilot).await.decision.kind(), "purchase");
    assert_eq!(cycle(&mut pilot).await.decision.kind(), "tap");
    assert_eq!(game.calls(), vec!["buy_upgrade:mine", "tap:50:0"]);
}

#[tokio::test]
async fn test_command_failure_surfaces_and_backs_off() {
    let game = MockGame::new(tapper()).with_upgrade("mine", 800.0, 100.0);
    game.set_error("503 Service Unavailable");
    let clock = ManualClock::at(T0);
    let mut pilot = pilot(&game, &clock, false);

    let err = pilot.run_cycle().await.unwrap_err();
    assert!(format!("{err:#}").contains("503 Service Unavailable"));
    assert!(err.to_string().contains("Failed to buy upgrade mine"));
    assert_eq!(pilot.stats().cycles, 0);
    assert_eq!(pilot.pause_after_error(), Duration::from_secs(600));
    assert_eq!(game.balance(), 1000.0);
}
