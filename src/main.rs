//! TAPBOT: tap-to-earn clicker autopilot
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the game client and decision engine, and runs the
//! poll→decide→execute loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use tapbot::config;
use tapbot::engine::cycle::{Autopilot, CycleReport};
use tapbot::engine::executor::Executor;
use tapbot::game::hamster::HamsterClient;
use tapbot::strategy::{DecisionEngine, EngineConfig};
use tapbot::types::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        min_balance = cfg.agent.min_balance,
        dry_run = cfg.agent.dry_run,
        base_url = %cfg.api.base_url,
        "TAPBOT starting up"
    );

    // -- Initialise components -------------------------------------------

    let token = cfg.api_token()?;
    let client = HamsterClient::new(
        token,
        Some(cfg.api.base_url.clone()),
        Some(cfg.api.timeout_secs),
    )?;

    let engine = DecisionEngine::new(EngineConfig::from(&cfg));
    if cfg.agent.dry_run {
        warn!("Dry-run mode, no commands will be sent");
    }

    let mut pilot = Autopilot::new(
        Arc::new(client),
        Arc::new(SystemClock),
        engine,
        Executor::new(cfg.agent.dry_run),
        Duration::from_secs(cfg.agent.action_pause_secs),
    );

    // -- Main loop -------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        let pause = match pilot.run_cycle().await {
            Ok(report) => {
                log_cycle_report(&report);
                pilot.pause_after(&report)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Cycle failed, backing off");
                pilot.pause_after_error()
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(stats = %pilot.stats(), "TAPBOT shut down cleanly.");

    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        action = report.execution.action,
        sent = report.execution.sent,
        balance = format!("{:.0}", report.balance),
        earn_per_hour = format!("{:.0}", report.earn_per_hour),
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tapbot=info"));

    let json_logging = std::env::var("TAPBOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
