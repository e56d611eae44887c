//! Tester configuration.
//!
//! [`TesterConfig`] is the single value object handed to the runner. It is
//! assembled by one or more [`ConfigSource`](crate::source::ConfigSource)s and
//! checked by [`validate`] before any request leaves the machine.
//!
//! # Example TOML
//!
//! ```toml
//! base_url = "https://abc123.supabase.co"
//! api_key = "eyJhbGciOi..."
//! device_id = "esp32_garden_001"
//! zone_id = "0b7e6c1e-5d1c-4d8e-9a55-1f2f3a4b5c6d"
//! timeout_secs = 10
//!
//! [device]
//! name = "ESP32 Garden Monitor"
//! firmware_version = "v3.0.0"
//!
//! [pacing]
//! between_readings_ms = 250
//! ```
//!
//! Every key is optional in a file; missing keys keep the value of the
//! layer underneath.

pub mod validate;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub use validate::{ConfigIssue, ValidationPolicy, ValidationReport};

/// Base URL shipped in the firmware config template.
pub const PLACEHOLDER_BASE_URL: &str = "https://your-project-id.supabase.co";
/// Access keys shipped in the template and the old test script.
pub const PLACEHOLDER_API_KEYS: &[&str] = &["your_supabase_anon_key", "your_supabase_anon_key_here"];
/// Zone identifiers shipped in the template and the old test script.
pub const PLACEHOLDER_ZONE_IDS: &[&str] = &["your_zone_uuid", "your_zone_uuid_here"];

/// Device identifier used when none is configured.
pub const DEFAULT_DEVICE_ID: &str = "esp32_test_device";
/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Everything a test run needs to know about the backend and the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    /// Backend project URL, without a trailing slash.
    pub base_url: String,
    /// Anonymous access key sent as `apikey` and as a bearer token.
    pub api_key: String,
    /// Identifier the simulated device registers under.
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// Zone the simulated device reports into.
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Registration profile of the simulated device.
    #[serde(default)]
    pub device: DeviceProfile,
    /// Pauses inserted between dependent steps.
    #[serde(default)]
    pub pacing: Pacing,
}

fn default_device_id() -> String {
    DEFAULT_DEVICE_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Hardware identity reported during device registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Human-readable device name.
    pub name: String,
    /// Hardware family, `esp32` for real boards.
    pub device_type: String,
    /// LAN address the device claims to have.
    pub ip_address: String,
    /// MAC address in `AA:BB:CC:DD:EE:FF` form.
    pub mac_address: String,
    /// Firmware version string reported to the backend.
    pub firmware_version: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            name: "ESP32 Test Device".to_string(),
            device_type: "esp32".to_string(),
            ip_address: "192.168.1.100".to_string(),
            mac_address: "AA:BB:CC:DD:EE:FF".to_string(),
            firmware_version: "v3.0.0-test".to_string(),
        }
    }
}

/// Best-effort delays that give the backend time to process writes before
/// a dependent read. None of them are required for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Pause after device registration.
    pub after_registration_ms: u64,
    /// Pause after each sensor reading.
    pub between_readings_ms: u64,
    /// Pause after command polling.
    pub after_polling_ms: u64,
    /// Deadline for readings to show up in the realtime cache.
    pub cache_wait_ms: u64,
    /// Interval between realtime cache polls.
    pub cache_poll_interval_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_registration_ms: 1000,
            between_readings_ms: 500,
            after_polling_ms: 1000,
            cache_wait_ms: 2000,
            cache_poll_interval_ms: 500,
        }
    }
}

impl Pacing {
    /// No pauses at all, and a single cache read.
    pub fn none() -> Self {
        Self {
            after_registration_ms: 0,
            between_readings_ms: 0,
            after_polling_ms: 0,
            cache_wait_ms: 0,
            cache_poll_interval_ms: 0,
        }
    }

    pub fn after_registration(&self) -> Duration {
        Duration::from_millis(self.after_registration_ms)
    }

    pub fn between_readings(&self) -> Duration {
        Duration::from_millis(self.between_readings_ms)
    }

    pub fn after_polling(&self) -> Duration {
        Duration::from_millis(self.after_polling_ms)
    }

    pub fn cache_wait(&self) -> Duration {
        Duration::from_millis(self.cache_wait_ms)
    }

    pub fn cache_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_poll_interval_ms)
    }
}

impl Default for TesterConfig {
    /// An empty configuration: no URL, no key. Interactive sources fill the gaps.
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            device_id: default_device_id(),
            zone_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            device: DeviceProfile::default(),
            pacing: Pacing::default(),
        }
    }
}

impl TesterConfig {
    /// Create a configuration for the given backend and key with default settings.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut config = Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        };
        config.normalize();
        config
    }

    /// The values shipped in the firmware config template.
    ///
    /// Validation flags every one of them until they are replaced.
    pub fn template() -> Self {
        Self {
            base_url: PLACEHOLDER_BASE_URL.to_string(),
            api_key: PLACEHOLDER_API_KEYS[0].to_string(),
            zone_id: Some(PLACEHOLDER_ZONE_IDS[0].to_string()),
            ..Self::default()
        }
    }

    /// Set the zone identifier.
    pub fn with_zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// Replace the pacing settings.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run the pre-flight checks for this configuration.
    pub fn validate(&self, policy: &ValidationPolicy) -> ValidationReport {
        validate::validate(self, policy)
    }

    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Trim whitespace and the trailing slash from user-supplied values.
    pub fn normalize(&mut self) {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self.api_key = self.api_key.trim().to_string();
        self.device_id = self.device_id.trim().to_string();
        if let Some(zone) = &self.zone_id {
            let zone = zone.trim();
            self.zone_id = if zone.is_empty() {
                None
            } else {
                Some(zone.to_string())
            };
        }
    }
}

/// A sparse set of values layered on top of another configuration.
///
/// Used for config files, environment variables and CLI flags alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Backend project URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Anonymous access key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Device identifier used for registration and readings.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Zone the readings are filed under.
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Replaces the whole device profile when set.
    #[serde(default)]
    pub device: Option<DeviceProfile>,
    /// Replaces the whole pacing table when set. Keys missing from the
    /// table take their defaults.
    #[serde(default)]
    pub pacing: Option<Pacing>,
}

impl ConfigOverrides {
    /// Parse overrides from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load overrides from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        Self::from_toml(&content)
    }

    /// Apply every set value onto `config`.
    pub fn apply(&self, config: &mut TesterConfig) {
        if let Some(url) = &self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(key) = &self.api_key {
            config.api_key.clone_from(key);
        }
        if let Some(device_id) = &self.device_id {
            config.device_id.clone_from(device_id);
        }
        if let Some(zone_id) = &self.zone_id {
            config.zone_id = Some(zone_id.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(pacing) = &self.pacing {
            config.pacing = pacing.clone();
        }
        config.normalize();
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.display().to_string(),
    })
}
