use std::sync::Mutex;

use aethon::automation::ChargingAutomation;
use aethon::config::Config;
use aethon::controls::AutomationMode;
use aethon::enphase::{AggregateSnapshot, LiveSnapshot, SolarTelemetry};
use aethon::error::{AethonError, Result};
use aethon::hubitat::ToggleSource;
use aethon::vehicle::VehicleClient;

const DAY_HOUR: u32 = 12;
const NIGHT_HOUR: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Issued {
    Off,
    Default,
    Amps(i32),
}

struct FakeVehicle {
    connected: bool,
    charging: bool,
    battery_level: f64,
    schedule_amp: i32,
    commands: Mutex<Vec<Issued>>,
}

impl FakeVehicle {
    fn new() -> Self {
        Self {
            connected: true,
            charging: false,
            battery_level: 80.0,
            schedule_amp: 0,
            commands: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<Issued> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl VehicleClient for FakeVehicle {
    async fn is_charger_connected(&self) -> Result<bool> {
        Ok(self.connected)
    }

    async fn is_charging(&self) -> Result<bool> {
        Ok(self.charging)
    }

    async fn get_battery_level(&self) -> Result<f64> {
        Ok(self.battery_level)
    }

    async fn get_current_schedule_amp(&self) -> Result<i32> {
        Ok(self.schedule_amp)
    }

    async fn set_schedule_off(&self) -> Result<()> {
        self.commands.lock().unwrap().push(Issued::Off);
        Ok(())
    }

    async fn set_schedule_default(&self) -> Result<()> {
        self.commands.lock().unwrap().push(Issued::Default);
        Ok(())
    }

    async fn set_schedule_amps(&self, amps: i32) -> Result<()> {
        self.commands.lock().unwrap().push(Issued::Amps(amps));
        Ok(())
    }
}

struct FakeTelemetry {
    grid_w: f64,
    fail_reads: bool,
    stream_events: Mutex<Vec<&'static str>>,
}

impl FakeTelemetry {
    fn steady(grid_w: f64) -> Self {
        Self {
            grid_w,
            fail_reads: false,
            stream_events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl SolarTelemetry for FakeTelemetry {
    async fn enable_live_stream(&self) -> Result<()> {
        self.stream_events.lock().unwrap().push("enable");
        Ok(())
    }

    async fn disable_live_stream(&self) -> Result<()> {
        self.stream_events.lock().unwrap().push("disable");
        Ok(())
    }

    async fn read_live_snapshot(&self) -> Result<LiveSnapshot> {
        if self.fail_reads {
            return Err(AethonError::api("gateway offline"));
        }
        Ok(LiveSnapshot {
            production_w: 0.0,
            consumption_w: 0.0,
            grid_w: self.grid_w,
            battery_w: 0.0,
            reading_time: 0,
        })
    }

    async fn read_aggregate_snapshot(&self) -> Result<AggregateSnapshot> {
        Ok(AggregateSnapshot {
            production_w: 0.0,
            total_consumption_w: 0.0,
            net_consumption_w: 0.0,
            battery_w: 0.0,
            reading_time: 0,
        })
    }
}

struct FakeToggles {
    limit: f64,
    fail_status: bool,
    messages: Mutex<Vec<(String, i32, i64)>>,
}

impl FakeToggles {
    fn new(limit: f64) -> Self {
        Self {
            limit,
            fail_status: false,
            messages: Mutex::new(Vec::new()),
        }
    }

    fn messages(&self) -> Vec<(String, i32, i64)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToggleSource for FakeToggles {
    async fn is_automation_on(&self) -> Result<bool> {
        Ok(true)
    }

    async fn is_night_charging_on(&self) -> Result<bool> {
        Ok(true)
    }

    async fn night_charging_limit(&self) -> Result<f64> {
        Ok(self.limit)
    }

    async fn set_status_message(&self, text: &str, amps: i32, grid_watts: f64) -> Result<()> {
        if self.fail_status {
            return Err(AethonError::api("hub offline"));
        }
        self.messages
            .lock()
            .unwrap()
            .push((text.to_string(), amps, grid_watts.round() as i64));
        Ok(())
    }
}

fn automation() -> ChargingAutomation {
    ChargingAutomation::new(Config::default())
}

#[tokio::test]
async fn mode_off_issues_schedule_off() {
    let vehicle = FakeVehicle::new();
    let telemetry = FakeTelemetry::steady(0.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::Off,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: automation off".to_string(), 0, 0)]
    );
}

#[tokio::test]
async fn unplugged_charger_issues_schedule_off() {
    let mut vehicle = FakeVehicle::new();
    vehicle.connected = false;
    let telemetry = FakeTelemetry::steady(0.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: not plugged in".to_string(), 0, 0)]
    );
}

#[tokio::test]
async fn solar_only_mode_is_off_at_night() {
    let vehicle = FakeVehicle::new();
    let telemetry = FakeTelemetry::steady(-2000.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            NIGHT_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
    // The night branch never touches the gateway
    assert!(telemetry.stream_events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn night_default_mode_charges_below_the_limit() {
    let mut vehicle = FakeVehicle::new();
    vehicle.battery_level = 40.0;
    let telemetry = FakeTelemetry::steady(0.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::Default,
            NIGHT_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Default]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: enabled (night)".to_string(), 48, 0)]
    );
}

#[tokio::test]
async fn night_default_mode_stops_at_the_limit() {
    let mut vehicle = FakeVehicle::new();
    vehicle.battery_level = 60.0;
    let telemetry = FakeTelemetry::steady(0.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::Default,
            NIGHT_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: disabled (night full)".to_string(), 0, 0)]
    );
}

#[tokio::test]
async fn night_default_mode_without_toggles_uses_fallback_limit() {
    let mut vehicle = FakeVehicle::new();
    vehicle.battery_level = 40.0;
    let telemetry = FakeTelemetry::steady(0.0);

    automation()
        .run_cycle_with(
            AutomationMode::Default,
            NIGHT_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();

    // 40% is below the 50% fallback limit
    assert_eq!(vehicle.commands(), vec![Issued::Default]);
}

#[tokio::test(start_paused = true)]
async fn daytime_surplus_increases_amperage() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 20;
    // -1000 W surplus: delta = +4
    let telemetry = FakeTelemetry::steady(-1000.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Amps(24)]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: enabled".to_string(), 24, -1000)]
    );
}

#[tokio::test(start_paused = true)]
async fn daytime_deadband_reaffirms_current_amperage() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 20;
    // -600 W surplus: delta = +2, inside the deadband
    let telemetry = FakeTelemetry::steady(-600.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Amps(20)]);
}

#[tokio::test(start_paused = true)]
async fn daytime_deadband_reaffirms_off_when_not_charging() {
    let vehicle = FakeVehicle::new();
    // 100 W import: delta = -2, inside the deadband; current amp forced to 0
    let telemetry = FakeTelemetry::steady(100.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
}

#[tokio::test(start_paused = true)]
async fn daytime_import_below_minimum_turns_charging_off() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 10;
    // 500 W import: delta = -4, 10 - 4 = 6 < AMPS_MIN
    let telemetry = FakeTelemetry::steady(500.0);
    let toggles = FakeToggles::new(50.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
    assert_eq!(
        toggles.messages(),
        vec![("Charging: disabled".to_string(), 0, 500)]
    );
}

#[tokio::test(start_paused = true)]
async fn daytime_surplus_clamps_at_the_charger_maximum() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 46;
    // -2000 W surplus: delta = +8, 46 + 8 clamps to 48 = full speed
    let telemetry = FakeTelemetry::steady(-2000.0);

    automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Default]);
}

#[tokio::test]
async fn status_report_failure_does_not_fail_the_cycle() {
    let vehicle = FakeVehicle::new();
    let telemetry = FakeTelemetry::steady(0.0);
    let mut toggles = FakeToggles::new(50.0);
    toggles.fail_status = true;

    automation()
        .run_cycle_with(
            AutomationMode::Off,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            Some(&toggles),
        )
        .await
        .unwrap();

    assert_eq!(vehicle.commands(), vec![Issued::Off]);
}

#[tokio::test(start_paused = true)]
async fn telemetry_failure_aborts_the_cycle_without_a_command() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 16;
    let mut telemetry = FakeTelemetry::steady(0.0);
    telemetry.fail_reads = true;

    let result = automation()
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await;

    assert!(result.is_err());
    assert!(vehicle.commands().is_empty());
    // The live stream is still torn down
    assert_eq!(
        *telemetry.stream_events.lock().unwrap(),
        vec!["enable", "disable"]
    );
}

#[tokio::test(start_paused = true)]
async fn each_cycle_issues_exactly_one_command() {
    let mut vehicle = FakeVehicle::new();
    vehicle.charging = true;
    vehicle.schedule_amp = 20;
    let telemetry = FakeTelemetry::steady(-1000.0);

    let automation = automation();
    automation
        .run_cycle_with(
            AutomationMode::SolarOnly,
            DAY_HOUR,
            &vehicle,
            &telemetry,
            None,
        )
        .await
        .unwrap();
    assert_eq!(vehicle.commands().len(), 1);
}
