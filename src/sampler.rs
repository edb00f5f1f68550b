//! Grid consumption sampling for Aethon
//!
//! Takes repeated live readings from the solar gateway and reduces them to a
//! single robust estimate of the household grid exchange.

use crate::enphase::SolarTelemetry;
use crate::error::Result;
use crate::logging::get_logger;
use tokio::time::{Duration, sleep};

/// Readings taken per cycle
pub const NUM_READINGS: usize = 5;

/// Delay before each reading, letting live telemetry accumulate
pub const READING_DELAY: Duration = Duration::from_secs(10);

/// Sample the current grid consumption in watts.
///
/// Positive values mean importing from the grid, negative exporting. When
/// `include_battery_usage` is set, home-battery discharge counts as
/// consumption too; battery charging is ignored so excess solar fills the
/// battery before the vehicle.
///
/// The gateway stops refreshing live meter data after roughly ten minutes of
/// inactivity, so the live stream is enabled for the duration of the
/// sampling and disabled afterwards - also when a reading fails, since a
/// stream left enabled leaks a background resource on the gateway.
///
/// Returns the median of [`NUM_READINGS`] readings to reject single-sample
/// spikes. Any failed reading aborts the whole sample.
pub async fn sample_grid_consumption(
    telemetry: &dyn SolarTelemetry,
    include_battery_usage: bool,
) -> Result<f64> {
    let logger = get_logger("sampler");
    logger.info("Sampling grid consumption");

    telemetry.enable_live_stream().await?;
    let outcome = collect_readings(telemetry, include_battery_usage).await;
    let disable_outcome = telemetry.disable_live_stream().await;
    if let Err(e) = &disable_outcome {
        logger.warn(&format!("Failed to disable live stream: {}", e));
    }

    let readings = outcome?;
    disable_outcome?;

    Ok(median(readings))
}

async fn collect_readings(
    telemetry: &dyn SolarTelemetry,
    include_battery_usage: bool,
) -> Result<Vec<f64>> {
    let logger = get_logger("sampler");
    let mut readings = Vec::with_capacity(NUM_READINGS);

    for i in 0..NUM_READINGS {
        logger.info(&format!("Reading consumption {} / {}", i + 1, NUM_READINGS));
        // Sleep before the read to allow data to accumulate
        sleep(READING_DELAY).await;

        let live = telemetry.read_live_snapshot().await?;
        logger.debug(&format!(
            "Live: grid={:.0}W battery={:.0}W production={:.0}W consumption={:.0}W",
            live.grid_w, live.battery_w, live.production_w, live.consumption_w
        ));
        let aggregate = telemetry.read_aggregate_snapshot().await?;
        logger.debug(&format!(
            "Aggregate: production={:.0}W net={:.0}W total={:.0}W battery={:.0}W",
            aggregate.production_w,
            aggregate.net_consumption_w,
            aggregate.total_consumption_w,
            aggregate.battery_w
        ));

        let mut consumption = live.grid_w;
        // Count battery discharge, but let battery charging have the surplus
        if include_battery_usage && live.battery_w > 0.0 {
            consumption += live.battery_w;
        }
        readings.push(consumption);
    }

    Ok(readings)
}

fn median(mut samples: Vec<f64>) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    samples[samples.len() / 2]
}
