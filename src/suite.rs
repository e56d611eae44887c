//! The two step sequences the binaries run.

use crate::config::TesterConfig;
use crate::payload::{Endpoint, SensorKind};
use crate::report::Hints;
use crate::runner::{Session, TestStep};
use crate::steps::connection::{Heartbeat, PollCommands, RegisterDevice, SendReading};
use crate::steps::integration::{
    CheckCache, DiscoverDevice, DiscoverZone, ProbeBackend, ProbeEdgeFunction, SubmitCommand,
};

/// An ordered list of steps, the session they start from and what to print afterwards.
pub struct Suite {
    /// Short machine name, used in the JSON report.
    pub id: &'static str,
    /// Banner printed above the run.
    pub title: &'static str,
    pub steps: Vec<TestStep>,
    /// Identifiers known before the first step runs.
    pub session: Session,
    pub hints: Hints,
}

impl Suite {
    /// Firmware-side calls for the configured device and zone.
    ///
    /// Registration, one reading per sensor, command polling, heartbeat.
    pub fn connection(config: &TesterConfig) -> Self {
        let pacing = &config.pacing;
        let mut steps = vec![TestStep::new(RegisterDevice).pause_after(pacing.after_registration())];
        for kind in SensorKind::ALL {
            steps.push(TestStep::new(SendReading::simulated(kind)).pause_after(pacing.between_readings()));
        }
        steps.push(TestStep::new(PollCommands::polling()).pause_after(pacing.after_polling()));
        steps.push(TestStep::new(Heartbeat::new()));

        Self {
            id: "connection",
            title: "ESP32 Supabase Integration Test",
            steps,
            session: Session::from_config(config),
            hints: Hints {
                troubleshooting: vec![
                    "Verify Supabase URL and API key",
                    "Ensure edge functions are deployed",
                    "Check Zone ID exists in dashboard",
                    "Verify network connectivity",
                ],
                next_steps: vec!["You can now upload the firmware to your ESP32 device."],
            },
        }
    }

    /// Dashboard-side checks that discover or create their own device and zone.
    pub fn integration(config: &TesterConfig) -> Self {
        let pacing = &config.pacing;
        let mut steps = vec![TestStep::new(ProbeBackend)];
        for endpoint in Endpoint::EDGE_FUNCTIONS {
            steps.push(TestStep::new(ProbeEdgeFunction(endpoint)));
        }
        steps.push(TestStep::new(DiscoverDevice::default()));
        steps.push(TestStep::new(DiscoverZone::default()));
        steps.push(TestStep::new(SendReading::nominal(
            "Sensor Data Transmission",
            SensorKind::Moisture,
        )));
        steps.push(TestStep::new(SubmitCommand));
        steps.push(TestStep::new(PollCommands::retrieval()));
        steps.push(TestStep::new(Heartbeat::device_management()));
        for kind in SensorKind::ALL {
            steps.push(
                TestStep::new(SendReading::nominal(format!("Data Flow - {kind}"), kind))
                    .pause_after(pacing.between_readings()),
            );
        }
        steps.push(TestStep::new(CheckCache));

        Self {
            id: "integration",
            title: "ESP32 Integration Testing Suite",
            steps,
            session: Session::default(),
            hints: Hints {
                troubleshooting: vec![
                    "Check your Supabase project URL and anon key",
                    "Ensure all edge functions are deployed",
                    "Verify database schema matches expected structure",
                    "Check device and zone registration",
                ],
                next_steps: vec![
                    "Upload the ESP32 code to your device",
                    "Configure WiFi and device settings",
                    "Test with real sensors",
                    "Monitor the dashboard for real-time data",
                ],
            },
        }
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(TestStep::name).collect()
    }
}
