use aethon::ChargingAutomation;
use aethon::config::Config;
use anyhow::Result;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    aethon::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let cycle_interval_secs = config.cycle_interval_secs;
    info!(
        "Aethon charging automation {} starting up: run every {} seconds",
        env!("APP_VERSION"),
        cycle_interval_secs
    );

    let automation = ChargingAutomation::new(config);

    let mut ticker = interval(Duration::from_secs(cycle_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // A failed cycle never stops the scheduler; the next tick retries
    loop {
        ticker.tick().await;
        if let Err(e) = automation.run_cycle().await {
            error!("Automation cycle failed: {}", e);
        }
        info!("Sleeping for {} seconds", cycle_interval_secs);
    }
}
