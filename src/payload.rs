//! Request bodies and resource paths of the dashboard backend.
//!
//! The shapes here are dictated by the backend's edge functions and REST
//! tables; this crate only mirrors them.

use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::TesterConfig;

/// Remote resources the tester talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Edge function ingesting sensor readings.
    SensorData,
    /// Edge function queuing and serving device commands.
    Commands,
    /// Edge function handling registration and status updates.
    DeviceManagement,
    /// REST table with the latest reading per device and sensor.
    RealtimeCache,
    /// REST table of registered devices.
    Devices,
    /// REST table of irrigation zones.
    Zones,
}

impl Endpoint {
    /// Edge functions the firmware depends on.
    pub const EDGE_FUNCTIONS: [Endpoint; 3] =
        [Endpoint::SensorData, Endpoint::Commands, Endpoint::DeviceManagement];

    pub fn path(self) -> &'static str {
        match self {
            Self::SensorData => "/functions/v1/esp32-data",
            Self::Commands => "/functions/v1/esp32-commands",
            Self::DeviceManagement => "/functions/v1/device-management",
            Self::RealtimeCache => "/rest/v1/realtime_cache",
            Self::Devices => "/rest/v1/devices",
            Self::Zones => "/rest/v1/zones",
        }
    }

    /// Last path segment, e.g. `esp32-data`.
    pub fn name(self) -> &'static str {
        self.path().rsplit('/').next().unwrap_or_default()
    }
}

/// Sensors fitted to the ESP32 board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Moisture,
    Temperature,
    Humidity,
    Light,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Moisture,
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Light,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moisture => "moisture",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
        }
    }

    /// Capitalised name used in step titles.
    pub fn title(self) -> &'static str {
        match self {
            Self::Moisture => "Moisture",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Light => "Light",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "C",
            _ => "%",
        }
    }

    /// Plausible reading range for a garden installation.
    fn range(self) -> (f64, f64) {
        match self {
            Self::Moisture => (20.0, 80.0),
            Self::Temperature => (18.0, 35.0),
            Self::Humidity => (40.0, 90.0),
            Self::Light => (10.0, 95.0),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensor value with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub kind: SensorKind,
    pub value: f64,
}

impl Reading {
    /// A random value inside the sensor's plausible range, rounded to one decimal.
    pub fn realistic(kind: SensorKind) -> Self {
        let (low, high) = kind.range();
        let raw = rand::rng().random_range(low..high);
        Self {
            kind,
            value: (raw * 10.0).round() / 10.0,
        }
    }

    /// A fixed value per sensor, so repeated runs post the same numbers.
    pub fn nominal(kind: SensorKind) -> Self {
        let value = match kind {
            SensorKind::Moisture => 65.5,
            SensorKind::Temperature => 24.0,
            SensorKind::Humidity => 58.0,
            SensorKind::Light => 71.0,
        };
        Self { kind, value }
    }
}

/// Battery and radio state attached to every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub battery_level: u8,
    pub signal_strength: i16,
}

impl Telemetry {
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            battery_level: rng.random_range(70..=100),
            signal_strength: rng.random_range(-70..=-30),
        }
    }

    pub fn nominal() -> Self {
        Self {
            battery_level: 85,
            signal_strength: -45,
        }
    }
}

/// Body of a device registration call.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    pub ip_address: String,
    pub mac_address: String,
    pub firmware_version: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl RegistrationRequest {
    pub fn from_config(config: &TesterConfig) -> Self {
        Self {
            device_id: config.device_id.clone(),
            name: config.device.name.clone(),
            device_type: config.device.device_type.clone(),
            ip_address: config.device.ip_address.clone(),
            mac_address: config.device.mac_address.clone(),
            firmware_version: config.device.firmware_version.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Body of a sensor reading post.
#[derive(Debug, Clone, Serialize)]
pub struct SensorDataRequest {
    pub device_id: String,
    pub zone_id: String,
    pub sensor_type: SensorKind,
    pub value: f64,
    pub unit: String,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub battery_level: u8,
    pub signal_strength: i16,
}

impl SensorDataRequest {
    pub fn new(device_id: &str, zone_id: &str, reading: Reading, telemetry: Telemetry) -> Self {
        Self {
            device_id: device_id.to_string(),
            zone_id: zone_id.to_string(),
            sensor_type: reading.kind,
            value: reading.value,
            unit: reading.kind.unit().to_string(),
            api_key: None,
            battery_level: telemetry.battery_level,
            signal_strength: telemetry.signal_strength,
        }
    }

    /// Embed the access key in the body, as the firmware does.
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

/// Body of a heartbeat / status update.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub device_id: String,
    pub status: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl StatusUpdate {
    pub fn online(device_id: &str, api_key: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: "online".to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// Body of a command submission from the dashboard side.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub device_id: String,
    pub command_type: String,
    pub parameters: Value,
    pub priority: String,
}

impl CommandRequest {
    pub fn get_status(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            command_type: "GET_STATUS".to_string(),
            parameters: Value::Object(Default::default()),
            priority: "normal".to_string(),
        }
    }
}

/// Row inserted when the backend has no device yet.
#[derive(Debug, Clone, Serialize)]
pub struct NewDevice {
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    pub status: String,
}

impl NewDevice {
    /// A throwaway device keyed by the current Unix time.
    pub fn test_device(name: &str) -> Self {
        Self {
            device_id: format!("TEST_DEVICE_{}", chrono::Utc::now().timestamp()),
            name: name.to_string(),
            device_type: "esp32".to_string(),
            status: "online".to_string(),
        }
    }
}

/// Row inserted when the backend has no zone yet.
#[derive(Debug, Clone, Serialize)]
pub struct NewZone {
    pub name: String,
    pub description: String,
    pub soil_type: String,
    pub moisture_threshold: u8,
}

impl NewZone {
    pub fn test_zone(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "Test zone for ESP32 integration testing".to_string(),
            soil_type: "Loamy".to_string(),
            moisture_threshold: 40,
        }
    }
}

/// A command waiting for the device, as returned by command polling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PendingCommand {
    #[serde(default)]
    pub id: Option<Value>,
    /// Absent or `null` when the backend did not record a type.
    #[serde(default)]
    pub command_type: Option<String>,
}

impl PendingCommand {
    /// The command type for display, `Unknown` when unset.
    pub fn type_name(&self) -> &str {
        self.command_type.as_deref().unwrap_or("Unknown")
    }
}
