//! Enphase IQ Gateway integration for Aethon
//!
//! This module provides the solar telemetry capability: live and aggregate
//! power snapshots read from the local gateway REST API.

use crate::config::EnphaseConfig;
use crate::error::{AethonError, Result};
use crate::logging::get_logger;

/// One reading from the live meter stream, in watts
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    /// PV production
    pub production_w: f64,

    /// House load
    pub consumption_w: f64,

    /// Grid exchange; positive = importing, negative = exporting
    pub grid_w: f64,

    /// Home battery exchange; positive = discharging
    pub battery_w: f64,

    /// Gateway timestamp of the reading
    pub reading_time: i64,
}

/// One reading from the production report, in watts
#[derive(Debug, Clone)]
pub struct AggregateSnapshot {
    /// PV production
    pub production_w: f64,

    /// Total house consumption
    pub total_consumption_w: f64,

    /// Net consumption (total minus production)
    pub net_consumption_w: f64,

    /// Home battery exchange
    pub battery_w: f64,

    /// Gateway timestamp of the reading
    pub reading_time: i64,
}

/// Solar telemetry capability
#[async_trait::async_trait]
pub trait SolarTelemetry: Send + Sync {
    /// Start the gateway's live meter stream
    async fn enable_live_stream(&self) -> Result<()>;

    /// Stop the gateway's live meter stream
    async fn disable_live_stream(&self) -> Result<()>;

    /// Read the most recent live meter values
    async fn read_live_snapshot(&self) -> Result<LiveSnapshot>;

    /// Read the aggregate production report
    async fn read_aggregate_snapshot(&self) -> Result<AggregateSnapshot>;
}

/// Client for the local Enphase IQ Gateway
pub struct EnphaseClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    logger: crate::logging::StructuredLogger,
}

impl EnphaseClient {
    /// Create a gateway client.
    ///
    /// The gateway serves a self-signed certificate on the LAN, so
    /// certificate validation is disabled for this client only.
    pub fn new(config: &EnphaseConfig) -> Result<Self> {
        let logger = get_logger("enphase");
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{}", config.host),
            token: config.token.clone(),
            logger,
        })
    }

    async fn set_live_stream(&self, enable: bool) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/ivp/livedata/stream", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({"enable": i32::from(enable)}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AethonError::api(format!(
                "Gateway live stream request failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AethonError::api(format!(
                "Gateway request {} failed: {}",
                path,
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

/// Extract one live meter value; the gateway reports milliwatts
fn meter_watts(livedata: &serde_json::Value, meter: &str) -> Result<f64> {
    livedata
        .get("meters")
        .and_then(|m| m.get(meter))
        .and_then(|m| m.get("agg_p_mw"))
        .and_then(|v| v.as_f64())
        .map(|mw| mw / 1000.0)
        .ok_or_else(|| AethonError::api(format!("Live data is missing the {} meter", meter)))
}

#[async_trait::async_trait]
impl SolarTelemetry for EnphaseClient {
    async fn enable_live_stream(&self) -> Result<()> {
        self.logger.debug("Enabling gateway live stream");
        self.set_live_stream(true).await
    }

    async fn disable_live_stream(&self) -> Result<()> {
        self.logger.debug("Disabling gateway live stream");
        self.set_live_stream(false).await
    }

    async fn read_live_snapshot(&self) -> Result<LiveSnapshot> {
        let livedata = self.get_json("/ivp/livedata/status").await?;

        let reading_time = livedata
            .get("meters")
            .and_then(|m| m.get("last_update"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        Ok(LiveSnapshot {
            production_w: meter_watts(&livedata, "pv")?,
            consumption_w: meter_watts(&livedata, "load")?,
            grid_w: meter_watts(&livedata, "grid")?,
            battery_w: meter_watts(&livedata, "storage")?,
            reading_time,
        })
    }

    async fn read_aggregate_snapshot(&self) -> Result<AggregateSnapshot> {
        let report = self.get_json("/production.json").await?;

        let mut snapshot = AggregateSnapshot {
            production_w: 0.0,
            total_consumption_w: 0.0,
            net_consumption_w: 0.0,
            battery_w: 0.0,
            reading_time: 0,
        };

        let records = |section: &str| -> Vec<serde_json::Value> {
            report
                .get(section)
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default()
        };

        for record in records("production") {
            if record.get("type").and_then(|v| v.as_str()) == Some("eim")
                && record.get("measurementType").and_then(|v| v.as_str()) == Some("production")
            {
                snapshot.production_w = record.get("wNow").and_then(|v| v.as_f64()).unwrap_or(0.0);
                snapshot.reading_time = record
                    .get("readingTime")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
            }
        }

        for record in records("consumption") {
            if record.get("type").and_then(|v| v.as_str()) != Some("eim") {
                continue;
            }
            let w_now = record.get("wNow").and_then(|v| v.as_f64()).unwrap_or(0.0);
            match record.get("measurementType").and_then(|v| v.as_str()) {
                Some("total-consumption") => snapshot.total_consumption_w = w_now,
                Some("net-consumption") => snapshot.net_consumption_w = w_now,
                _ => {}
            }
        }

        snapshot.battery_w = report
            .get("storage")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|s| s.get("wNow"))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        Ok(snapshot)
    }
}
