//! Vehicle API integration for Aethon
//!
//! This module defines the vehicle capability consumed by the automation
//! cycle and its Rivian cloud implementation. The charger is controlled by
//! rewriting the vehicle's stored charging schedule wholesale.

use crate::config::RivianConfig;
use crate::error::{AethonError, Result};
use crate::logging::get_logger;
use crate::persistence::{SessionStore, StoredSession};
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Lowest amperage the charger sustains; below this it is turned off
pub const AMPS_MIN: i32 = 8;

/// Highest amperage the charger accepts
pub const AMPS_MAX: i32 = 48;

const GATEWAY_URL: &str = "https://rivian.com/api/gql/gateway/graphql";
const APOLLO_CLIENT_NAME: &str = "com.rivian.android.consumer";

const CHARGER_STATUS_CHARGING: &str = "chrgr_sts_connected_charging";
const CHARGER_STATUS_CONNECTED_IDLE: &str = "chrgr_sts_connected_no_chrg";

const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const CREATE_CSRF_QUERY: &str = "mutation CreateCSRFToken { createCsrfToken { __typename csrfToken appSessionToken } }";
const LOGIN_QUERY: &str = "mutation Login($email: String!, $password: String!) { login(email: $email, password: $password) { __typename ... on MobileLoginResponse { accessToken refreshToken userSessionToken } ... on MobileMFALoginResponse { otpToken } } }";
const USER_INFO_QUERY: &str =
    "query getUserInfo { currentUser { __typename id vehicles { __typename id vin } } }";
const VEHICLE_STATE_QUERY: &str = "query GetVehicleState($vehicleID: String!) { vehicleState(id: $vehicleID) { __typename batteryLevel { __typename timeStamp value } chargerStatus { __typename timeStamp value } } }";
const SCHEDULES_QUERY: &str = "query GetChargingSchedule($vehicleId: String!) { getVehicle(id: $vehicleId) { chargingSchedules { startTime duration location { latitude longitude } amperage enabled weekDays } } }";
const SET_SCHEDULES_QUERY: &str = "mutation SetChargingSchedule($vehicleId: String!, $chargingSchedules: [InputChargingSchedule!]!) { setChargingSchedules(vehicleId: $vehicleId, chargingSchedules: $chargingSchedules) { success } }";

/// Vehicle capability consumed by the automation cycle
#[async_trait::async_trait]
pub trait VehicleClient: Send + Sync {
    /// Whether the charger cable is plugged in
    async fn is_charger_connected(&self) -> Result<bool>;

    /// Whether the vehicle is actively charging
    async fn is_charging(&self) -> Result<bool>;

    /// Vehicle battery level in percent
    async fn get_battery_level(&self) -> Result<f64>;

    /// Amperage of the currently stored charging schedule
    async fn get_current_schedule_amp(&self) -> Result<i32>;

    /// Disable scheduled charging
    async fn set_schedule_off(&self) -> Result<()>;

    /// Charge at full speed ([`AMPS_MAX`])
    async fn set_schedule_default(&self) -> Result<()>;

    /// Charge at the given amperage
    async fn set_schedule_amps(&self, amps: i32) -> Result<()>;
}

/// Geo anchor of a charging schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// The vehicle's stored charging-window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSchedule {
    /// Minutes after local midnight
    pub start_time: i64,

    /// Window length in minutes
    pub duration: i64,

    pub location: ScheduleLocation,
    pub amperage: i32,
    pub enabled: bool,
    pub week_days: Vec<String>,
}

/// Build the schedule for a target amperage.
///
/// A non-zero amperage yields an always-active full-week schedule. Zero
/// yields a one-hour window placed away from the current time (18:00 in the
/// first half of the day, 06:00 in the second), which keeps the schedule
/// enabled but never lets it start a charge.
pub fn schedule_for_amperage(
    amps: i32,
    current_hour: u32,
    location: ScheduleLocation,
) -> ChargingSchedule {
    let mut schedule = ChargingSchedule {
        start_time: 0,
        duration: 24 * 60,
        location,
        amperage: AMPS_MAX,
        enabled: true,
        week_days: WEEK_DAYS.iter().map(|d| (*d).to_string()).collect(),
    };

    if amps == 0 {
        schedule.start_time = if current_hour < 12 { 18 * 60 } else { 6 * 60 };
        schedule.duration = 60;
    } else {
        schedule.amperage = amps;
    }
    schedule
}

fn status_is_charging(status: Option<&str>) -> bool {
    status == Some(CHARGER_STATUS_CHARGING)
}

fn status_is_connected(status: Option<&str>) -> bool {
    matches!(
        status,
        Some(CHARGER_STATUS_CHARGING) | Some(CHARGER_STATUS_CONNECTED_IDLE)
    )
}

/// Charger-related vehicle state, fetched fresh for each query
#[derive(Debug, Clone)]
struct VehicleChargeState {
    /// None when the vehicle is unreachable (e.g. service mode)
    charger_status: Option<String>,
    battery_level: Option<f64>,
}

/// Rivian cloud API client
pub struct RivianVehicleClient {
    http: reqwest::Client,
    session: StoredSession,
    vehicle_id: String,
    logger: crate::logging::StructuredLogger,
}

impl RivianVehicleClient {
    /// Establish a session and resolve the account's vehicle.
    ///
    /// Tokens from the session store are tried first; only when they are
    /// missing or rejected does a fresh login run, and the new tokens are
    /// persisted for the next cycle.
    pub async fn connect(config: &RivianConfig, store: &SessionStore) -> Result<Self> {
        let logger = get_logger("vehicle");
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        if let Some(session) = store.load()? {
            match Self::fetch_vehicle_id(&http, &session).await {
                Ok(vehicle_id) => {
                    logger.info("Reusing stored Rivian session");
                    return Ok(Self {
                        http,
                        session,
                        vehicle_id,
                        logger,
                    });
                }
                Err(e) => logger.warn(&format!("Stored Rivian session rejected: {}", e)),
            }
        }

        logger.info("Initializing new Rivian session");
        let session = Self::login(&http, config).await?;
        let vehicle_id = Self::fetch_vehicle_id(&http, &session).await?;
        store.save(&session)?;
        logger.info("Rivian session initialized");

        Ok(Self {
            http,
            session,
            vehicle_id,
            logger,
        })
    }

    async fn login(http: &reqwest::Client, config: &RivianConfig) -> Result<StoredSession> {
        let data = post_graphql(
            http,
            None,
            "CreateCSRFToken",
            serde_json::json!({}),
            CREATE_CSRF_QUERY,
        )
        .await?;
        let csrf = data
            .get("createCsrfToken")
            .cloned()
            .unwrap_or_default();
        let bootstrap = StoredSession {
            app_session_token: json_string(&csrf, "appSessionToken")
                .ok_or_else(|| AethonError::auth("CSRF response missing app session token"))?,
            user_session_token: String::new(),
            csrf_token: json_string(&csrf, "csrfToken")
                .ok_or_else(|| AethonError::auth("CSRF response missing CSRF token"))?,
        };

        let data = post_graphql(
            http,
            Some(&bootstrap),
            "Login",
            serde_json::json!({
                "email": config.username,
                "password": config.password,
            }),
            LOGIN_QUERY,
        )
        .await?;
        let login = data.get("login").cloned().unwrap_or_default();

        if login.get("otpToken").is_some_and(|v| !v.is_null()) {
            return Err(AethonError::auth(
                "Account requires OTP verification; seed the session file with an interactive login first",
            ));
        }

        let user_session_token = json_string(&login, "userSessionToken")
            .ok_or_else(|| AethonError::auth("Login response missing user session token"))?;

        Ok(StoredSession {
            user_session_token,
            ..bootstrap
        })
    }

    async fn fetch_vehicle_id(http: &reqwest::Client, session: &StoredSession) -> Result<String> {
        let data = post_graphql(
            http,
            Some(session),
            "getUserInfo",
            serde_json::json!({}),
            USER_INFO_QUERY,
        )
        .await?;

        data.get("currentUser")
            .and_then(|u| u.get("vehicles"))
            .and_then(|v| v.as_array())
            .and_then(|v| v.first())
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AethonError::api("No vehicles on the Rivian account"))
    }

    async fn fetch_charge_state(&self) -> Result<VehicleChargeState> {
        let data = post_graphql(
            &self.http,
            Some(&self.session),
            "GetVehicleState",
            serde_json::json!({"vehicleID": self.vehicle_id}),
            VEHICLE_STATE_QUERY,
        )
        .await?;
        let state = data.get("vehicleState").cloned().unwrap_or_default();

        let charger_status = state
            .get("chargerStatus")
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if charger_status.is_none() {
            self.logger
                .info("Vehicle charger status missing - might be in service mode");
        }

        let battery_level = state
            .get("batteryLevel")
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_f64());

        Ok(VehicleChargeState {
            charger_status,
            battery_level,
        })
    }

    async fn current_schedules(&self) -> Result<Vec<ChargingSchedule>> {
        let data = post_graphql(
            &self.http,
            Some(&self.session),
            "GetChargingSchedule",
            serde_json::json!({"vehicleId": self.vehicle_id}),
            SCHEDULES_QUERY,
        )
        .await?;

        let schedules = data
            .get("getVehicle")
            .and_then(|v| v.get("chargingSchedules"))
            .cloned()
            .ok_or_else(|| AethonError::api("Vehicle returned no charging schedules"))?;
        Ok(serde_json::from_value(schedules)?)
    }

    /// Replace the vehicle's schedule with one matching the target amperage.
    ///
    /// Skips the write when the vehicle already holds an identical schedule,
    /// so repeated identical commands are externally observable no-ops.
    async fn write_schedule(&self, amps: i32) -> Result<()> {
        let schedules = self.current_schedules().await?;
        let current = schedules
            .into_iter()
            .next()
            .ok_or_else(|| AethonError::api("Vehicle has no charging schedule to replace"))?;

        let desired = schedule_for_amperage(
            amps,
            chrono::Local::now().hour(),
            current.location.clone(),
        );

        if desired == current {
            self.logger
                .info("No change to the charging schedule, not updating");
            return Ok(());
        }

        self.logger
            .info(&format!("Updating charging schedule: {:?}", desired));
        let data = post_graphql(
            &self.http,
            Some(&self.session),
            "SetChargingSchedule",
            serde_json::json!({
                "vehicleId": self.vehicle_id,
                "chargingSchedules": [desired],
            }),
            SET_SCHEDULES_QUERY,
        )
        .await?;

        let success = data
            .get("setChargingSchedules")
            .and_then(|v| v.get("success"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !success {
            return Err(AethonError::api(
                "Vehicle rejected the charging schedule update",
            ));
        }

        self.logger.info("Charging schedule updated");
        Ok(())
    }
}

#[async_trait::async_trait]
impl VehicleClient for RivianVehicleClient {
    async fn is_charger_connected(&self) -> Result<bool> {
        let state = self.fetch_charge_state().await?;
        Ok(status_is_connected(state.charger_status.as_deref()))
    }

    async fn is_charging(&self) -> Result<bool> {
        let state = self.fetch_charge_state().await?;
        Ok(status_is_charging(state.charger_status.as_deref()))
    }

    async fn get_battery_level(&self) -> Result<f64> {
        let state = self.fetch_charge_state().await?;
        state
            .battery_level
            .ok_or_else(|| AethonError::api("Vehicle battery level unavailable"))
    }

    async fn get_current_schedule_amp(&self) -> Result<i32> {
        let schedules = self.current_schedules().await?;
        schedules
            .first()
            .map(|s| s.amperage)
            .ok_or_else(|| AethonError::api("Vehicle returned no charging schedules"))
    }

    async fn set_schedule_off(&self) -> Result<()> {
        self.write_schedule(0).await
    }

    async fn set_schedule_default(&self) -> Result<()> {
        self.write_schedule(AMPS_MAX).await
    }

    async fn set_schedule_amps(&self, amps: i32) -> Result<()> {
        if !(0..=AMPS_MAX).contains(&amps) {
            return Err(AethonError::validation(
                "amps",
                "Amperage outside the charger's range",
            ));
        }
        self.write_schedule(amps).await
    }
}

fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

async fn post_graphql(
    http: &reqwest::Client,
    session: Option<&StoredSession>,
    operation: &str,
    variables: serde_json::Value,
    query: &str,
) -> Result<serde_json::Value> {
    let body = serde_json::json!({
        "operationName": operation,
        "variables": variables,
        "query": query,
    });

    let mut request = http
        .post(GATEWAY_URL)
        .header("apollographql-client-name", APOLLO_CLIENT_NAME)
        .json(&body);
    if let Some(session) = session {
        request = request
            .header("a-sess", &session.app_session_token)
            .header("csrf-token", &session.csrf_token);
        if !session.user_session_token.is_empty() {
            request = request.header("u-sess", &session.user_session_token);
        }
    }

    let resp = request.send().await?;
    if !resp.status().is_success() {
        return Err(AethonError::api(format!(
            "GraphQL request {} failed: {}",
            operation,
            resp.status()
        )));
    }

    let payload: serde_json::Value = resp.json().await?;
    if payload.get("errors").is_some() {
        let message = payload["errors"][0]["message"]
            .as_str()
            .unwrap_or("GraphQL error");
        return Err(AethonError::api(format!(
            "GraphQL request {} failed: {}",
            operation, message
        )));
    }

    payload
        .get("data")
        .cloned()
        .ok_or_else(|| AethonError::api("GraphQL response missing data"))
}
