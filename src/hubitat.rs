//! Hubitat hub integration for Aethon
//!
//! This module provides the toggle-source capability: automation switches
//! read from, and a status message written to, a Hubitat hub through its
//! Maker API.

use crate::config::HubitatConfig;
use crate::error::{AethonError, Result};
use crate::logging::get_logger;

/// Rolling status lines kept on the hub variable
const MAX_STATUS_LINES: usize = 5;

/// Leading characters compared to decide whether a status line changed
const STATUS_PREFIX_LEN: usize = 15;

/// External toggle and status-display capability
#[async_trait::async_trait]
pub trait ToggleSource: Send + Sync {
    /// Whether the charging automation master switch is on
    async fn is_automation_on(&self) -> Result<bool>;

    /// Whether night charging is enabled
    async fn is_night_charging_on(&self) -> Result<bool>;

    /// Battery percentage up to which night charging runs
    async fn night_charging_limit(&self) -> Result<f64>;

    /// Publish a human-readable status line (best-effort at the call site)
    async fn set_status_message(&self, text: &str, amps: i32, grid_watts: f64) -> Result<()>;
}

/// Client for the Hubitat Maker API
pub struct HubitatClient {
    http: reqwest::Client,
    config: HubitatConfig,
    logger: crate::logging::StructuredLogger,
}

impl HubitatClient {
    /// Create a hub client
    pub fn new(config: &HubitatConfig) -> Result<Self> {
        let logger = get_logger("hubitat");
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            logger,
        })
    }

    /// Build a Maker API URL from path segments, percent-encoding each one
    fn api_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.config.host)
            .map_err(|e| AethonError::api(format!("Invalid hub URL: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AethonError::api("Hub URL cannot be a base"))?;
            path.extend(["apps", "api"]);
            path.push(&self.config.app_id.to_string());
            path.extend(segments);
        }
        url.query_pairs_mut()
            .append_pair("access_token", &self.config.access_token);
        Ok(url)
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<serde_json::Value> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AethonError::api(format!(
                "Hubitat request failed: {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    /// Read one attribute's current value from a device
    async fn device_attribute(
        &self,
        device_id: u32,
        attribute: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.logger
            .debug(&format!("Reading device {} from the hub", device_id));
        let url = self.api_url(&["devices", &device_id.to_string()])?;
        let device = self.get_json(url).await?;

        let value = device
            .get("attributes")
            .and_then(|v| v.as_array())
            .and_then(|attrs| {
                attrs
                    .iter()
                    .find(|a| a.get("name").and_then(|n| n.as_str()) == Some(attribute))
            })
            .and_then(|a| a.get("currentValue"))
            .filter(|v| !v.is_null())
            .cloned();
        Ok(value)
    }

    async fn switch_state(&self, device_id: u32) -> Result<bool> {
        let state = self.device_attribute(device_id, "switch").await?;
        Ok(state.as_ref().and_then(|v| v.as_str()) == Some("on"))
    }

    async fn set_variable(&self, device_id: u32, value: &str) -> Result<()> {
        self.logger.debug("Sending status to the hub");
        let url = self.api_url(&["devices", &device_id.to_string(), "setVariable", value])?;
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AethonError::api(format!(
                "Hubitat request failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ToggleSource for HubitatClient {
    async fn is_automation_on(&self) -> Result<bool> {
        self.switch_state(self.config.automation_switch_id).await
    }

    async fn is_night_charging_on(&self) -> Result<bool> {
        self.switch_state(self.config.night_charge_switch_id).await
    }

    async fn night_charging_limit(&self) -> Result<f64> {
        let level = self
            .device_attribute(self.config.night_charge_switch_id, "level")
            .await?;

        let limit = level.as_ref().and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        });
        match limit {
            Some(limit) => Ok(limit),
            None => {
                self.logger.warn(&format!(
                    "Night charge switch has no level attribute, assuming {}%",
                    crate::controls::DEFAULT_NIGHT_CHARGING_LIMIT
                ));
                Ok(crate::controls::DEFAULT_NIGHT_CHARGING_LIMIT)
            }
        }
    }

    async fn set_status_message(&self, text: &str, amps: i32, grid_watts: f64) -> Result<()> {
        let message = format!(
            "{} -- Amps: {} -- Grid: {}W -- Last update: {}",
            text,
            amps,
            grid_watts.round() as i64,
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        );

        let existing = self
            .device_attribute(self.config.status_device_id, "variable")
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let merged = merge_status_messages(&existing, &message);
        self.set_variable(self.config.status_device_id, &merged).await
    }
}

/// Merge a new status line into the rolling message window.
///
/// A line matching the previous one in its first [`STATUS_PREFIX_LEN`]
/// characters replaces it (same state, fresher timestamp); otherwise the line
/// is appended and the window trimmed to [`MAX_STATUS_LINES`].
pub fn merge_status_messages(existing: &str, message: &str) -> String {
    let prefix = |s: &str| s.chars().take(STATUS_PREFIX_LEN).collect::<String>();

    let mut lines: Vec<String> = existing
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();

    match lines.last() {
        Some(last) if prefix(last) == prefix(message) => {
            let last_index = lines.len() - 1;
            lines[last_index] = message.to_string();
        }
        _ => lines.push(message.to_string()),
    }

    if lines.len() > MAX_STATUS_LINES {
        let excess = lines.len() - MAX_STATUS_LINES;
        lines.drain(..excess);
    }

    lines.join("\n")
}
