//! Charging decision logic for Aethon
//!
//! This module contains the pure decision core: the quantized proportional
//! controller that turns a grid-power reading into an amperage change, and
//! the automation-mode / day-night policy that gates it.

use crate::error::Result;
use crate::hubitat::ToggleSource;
use crate::vehicle::{AMPS_MAX, AMPS_MIN};

/// Line voltage used to convert watts to amps
pub const LINE_VOLTAGE: f64 = 240.0;

/// Smallest amperage increment the charger hardware accepts
pub const AMP_STEP: i32 = 2;

/// Local hour before which it is considered night time
pub const NIGHT_END_HOUR: u32 = 7;

/// Night charging limit (percent) used when no toggle source is configured
pub const DEFAULT_NIGHT_CHARGING_LIMIT: f64 = 50.0;

/// Automation mode enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationMode {
    /// Charging automation disabled entirely
    Off,

    /// Excess solar during the day, full-speed charging at night up to a limit
    Default,

    /// Excess solar only - never charges at night
    SolarOnly,
}

/// The single mutation the decision core produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeCommand {
    /// Disable the charging schedule
    Off,

    /// Set the charging schedule to the given amperage
    Amps(i32),
}

impl ChargeCommand {
    /// Map an amperage to a command; zero or below means off
    pub fn from_amperage(amps: i32) -> Self {
        if amps <= 0 { Self::Off } else { Self::Amps(amps) }
    }

    /// Effective amperage of the command
    pub fn amperage(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Amps(amps) => amps,
        }
    }
}

/// Compute the amperage change for a grid consumption reading.
///
/// Positive consumption (importing) yields a negative delta, negative
/// consumption (exporting surplus) a positive one. The ceiling quantizes to
/// the 2 A charger step while rounding toward less grid import on both sides:
/// imports shed one extra step, surpluses are taken up conservatively.
pub fn compute_delta_amps(grid_consumption_watts: f64) -> i32 {
    let steps = (grid_consumption_watts / LINE_VOLTAGE / AMP_STEP as f64).ceil() as i32;
    -steps * AMP_STEP
}

/// Whether a delta is within the deadband and should not be acted on.
///
/// Suppresses flapping from sensor noise around zero. The caller is expected
/// to re-affirm the existing amperage instead, so a drifted external schedule
/// is corrected back every cycle.
pub fn is_delta_too_small(delta_amps: i32) -> bool {
    delta_amps > -3 && delta_amps < 3
}

/// Apply a delta to the current amperage and clamp to the charger's range.
///
/// Values above [`AMPS_MAX`] clamp to the maximum; values below [`AMPS_MIN`]
/// become 0 - below its minimum sustainable amperage the charger is turned
/// off rather than driven at an invalid low rate.
pub fn clamp_new_amperage(current_amps: i32, delta_amps: i32) -> i32 {
    let new_amps = current_amps + delta_amps;
    if new_amps > AMPS_MAX {
        AMPS_MAX
    } else if new_amps < AMPS_MIN {
        0
    } else {
        new_amps
    }
}

/// Whether the given local hour falls in the night window
pub fn is_night_time(local_hour: u32) -> bool {
    local_hour < NIGHT_END_HOUR
}

/// Derive the automation mode from the toggle source.
///
/// Without a toggle source the mode is fixed to solar-only.
pub async fn current_mode(toggles: Option<&dyn ToggleSource>) -> Result<AutomationMode> {
    let Some(toggles) = toggles else {
        return Ok(AutomationMode::SolarOnly);
    };

    if !toggles.is_automation_on().await? {
        return Ok(AutomationMode::Off);
    }
    if toggles.is_night_charging_on().await? {
        Ok(AutomationMode::Default)
    } else {
        Ok(AutomationMode::SolarOnly)
    }
}

/// Battery percentage up to which night charging runs in default mode
pub async fn night_charging_limit(toggles: Option<&dyn ToggleSource>) -> Result<f64> {
    match toggles {
        Some(toggles) => toggles.night_charging_limit().await,
        None => Ok(DEFAULT_NIGHT_CHARGING_LIMIT),
    }
}
