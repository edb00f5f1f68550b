//! Automation cycle orchestration for Aethon
//!
//! This module runs one decision cycle: derive the automation mode, walk the
//! day/night state machine, and issue at most one charger command plus at
//! most one status report.

use crate::config::Config;
use crate::controls::{self, AutomationMode, ChargeCommand};
use crate::enphase::{EnphaseClient, SolarTelemetry};
use crate::error::{AethonError, Result};
use crate::hubitat::{HubitatClient, ToggleSource};
use crate::logging::get_logger;
use crate::persistence::SessionStore;
use crate::sampler;
use crate::vehicle::{AMPS_MAX, RivianVehicleClient, VehicleClient};
use chrono::Timelike;

/// Charging automation entry point invoked by the scheduler
pub struct ChargingAutomation {
    config: Config,
    logger: crate::logging::StructuredLogger,
}

impl ChargingAutomation {
    /// Create the automation from a validated configuration
    pub fn new(config: Config) -> Self {
        let logger = get_logger("automation");
        Self { config, logger }
    }

    /// Run one automation cycle.
    ///
    /// The collaborator clients are built fresh each cycle; nothing except
    /// the persisted vendor session outlives the call. Any collaborator
    /// failure aborts the cycle - the scheduler logs it and tries again on
    /// the next tick.
    pub async fn run_cycle(&self) -> Result<()> {
        self.logger.info("Running charging automation cycle");

        let toggles: Option<Box<dyn ToggleSource>> = match &self.config.hubitat {
            Some(hubitat) => Some(Box::new(HubitatClient::new(hubitat)?)),
            None => None,
        };
        let mode = controls::current_mode(toggles.as_deref()).await?;
        self.logger.info(&format!("Automation mode: {:?}", mode));

        let store = SessionStore::new(&self.config.rivian.session_file);
        let vehicle = RivianVehicleClient::connect(&self.config.rivian, &store).await?;
        let telemetry = EnphaseClient::new(&self.config.enphase)?;

        self.run_cycle_with(
            mode,
            self.local_hour()?,
            &vehicle,
            &telemetry,
            toggles.as_deref(),
        )
        .await?;

        self.logger.info("Automation cycle complete");
        Ok(())
    }

    fn local_hour(&self) -> Result<u32> {
        let tz: chrono_tz::Tz = self.config.timezone.parse().map_err(|_| {
            AethonError::config(format!("Unknown timezone: {}", self.config.timezone))
        })?;
        Ok(chrono::Utc::now().with_timezone(&tz).hour())
    }

    /// Evaluate one cycle against explicit inputs.
    ///
    /// Guards run in order and the first match wins; later guards rely on
    /// the earlier ones having not matched.
    pub async fn run_cycle_with(
        &self,
        mode: AutomationMode,
        local_hour: u32,
        vehicle: &dyn VehicleClient,
        telemetry: &dyn SolarTelemetry,
        toggles: Option<&dyn ToggleSource>,
    ) -> Result<()> {
        // 1. Automation disabled
        if mode == AutomationMode::Off {
            self.logger.info("Automation is off");
            self.issue_command(vehicle, ChargeCommand::Off).await?;
            self.report_status(toggles, "Charging: automation off", 0, 0.0)
                .await;
            return Ok(());
        }

        // 2. Nothing to control without a cable
        if !vehicle.is_charger_connected().await? {
            self.logger.info("Charger not plugged in");
            self.issue_command(vehicle, ChargeCommand::Off).await?;
            self.report_status(toggles, "Charging: not plugged in", 0, 0.0)
                .await;
            return Ok(());
        }

        let night = controls::is_night_time(local_hour);

        // 3. Solar-only mode never charges at night
        if night && mode == AutomationMode::SolarOnly {
            self.logger.info("Solar-only mode: disabling charging at night");
            self.issue_command(vehicle, ChargeCommand::Off).await?;
            self.report_status(toggles, "Charging: disabled (night off)", 0, 0.0)
                .await;
            return Ok(());
        }

        // 4. Default mode tops the battery up at night
        if night && mode == AutomationMode::Default {
            let limit = controls::night_charging_limit(toggles).await?;
            let battery_level = vehicle.get_battery_level().await?;

            if battery_level < limit {
                self.logger.info(&format!(
                    "Default mode: charging to {}% at night (now at {}%)",
                    limit,
                    battery_level.round()
                ));
                self.issue_command(vehicle, ChargeCommand::Amps(AMPS_MAX))
                    .await?;
                self.report_status(toggles, "Charging: enabled (night)", AMPS_MAX, 0.0)
                    .await;
            } else {
                self.logger.info(&format!(
                    "Default mode: charged to {}% at night (already at {}%)",
                    limit,
                    battery_level.round()
                ));
                self.issue_command(vehicle, ChargeCommand::Off).await?;
                self.report_status(toggles, "Charging: disabled (night full)", 0, 0.0)
                    .await;
            }
            return Ok(());
        }

        // 5. Daytime: follow the grid
        self.run_day_branch(vehicle, telemetry, toggles).await
    }

    async fn run_day_branch(
        &self,
        vehicle: &dyn VehicleClient,
        telemetry: &dyn SolarTelemetry,
        toggles: Option<&dyn ToggleSource>,
    ) -> Result<()> {
        let grid_consumption =
            sampler::sample_grid_consumption(telemetry, self.config.include_battery_usage).await?;
        if !grid_consumption.is_finite() {
            return Err(AethonError::validation(
                "grid_consumption",
                "Sampled grid consumption is not finite",
            ));
        }

        let delta_amps = controls::compute_delta_amps(grid_consumption);
        let current_amps = if vehicle.is_charging().await? {
            vehicle.get_current_schedule_amp().await?
        } else {
            0
        };
        self.logger.info(&format!(
            "Grid consumption: {:.0}W; current amp: {}; delta amp: {}",
            grid_consumption, current_amps, delta_amps
        ));

        if controls::is_delta_too_small(delta_amps) {
            // Hold, but still re-issue the expected state so a restarted or
            // drifted external schedule is corrected back
            self.logger.info("Small or no change, holding");
            self.issue_command(vehicle, ChargeCommand::from_amperage(current_amps))
                .await?;
            self.report_charging_state(toggles, current_amps, grid_consumption)
                .await;
            return Ok(());
        }

        let new_amps = controls::clamp_new_amperage(current_amps, delta_amps);
        self.logger.info(&format!(
            "Current amp: {}; new amp: {}",
            current_amps, new_amps
        ));
        self.issue_command(vehicle, ChargeCommand::from_amperage(new_amps))
            .await?;
        self.report_charging_state(toggles, new_amps, grid_consumption)
            .await;
        Ok(())
    }

    async fn issue_command(
        &self,
        vehicle: &dyn VehicleClient,
        command: ChargeCommand,
    ) -> Result<()> {
        match command {
            ChargeCommand::Off => vehicle.set_schedule_off().await,
            ChargeCommand::Amps(amps) if amps >= AMPS_MAX => vehicle.set_schedule_default().await,
            ChargeCommand::Amps(amps) => vehicle.set_schedule_amps(amps).await,
        }
    }

    async fn report_charging_state(
        &self,
        toggles: Option<&dyn ToggleSource>,
        amps: i32,
        grid_watts: f64,
    ) {
        let text = if amps == 0 {
            "Charging: disabled"
        } else {
            "Charging: enabled"
        };
        self.report_status(toggles, text, amps, grid_watts).await;
    }

    /// Status reports are best-effort; a failed report never fails the cycle
    async fn report_status(
        &self,
        toggles: Option<&dyn ToggleSource>,
        text: &str,
        amps: i32,
        grid_watts: f64,
    ) {
        let Some(toggles) = toggles else {
            return;
        };
        if let Err(e) = toggles.set_status_message(text, amps, grid_watts).await {
            self.logger
                .warn(&format!("Failed to publish status message: {}", e));
        }
    }
}
