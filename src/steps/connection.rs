//! Calls the firmware itself makes against the backend.

use async_trait::async_trait;
use serde_json::Value;

use super::{rejected, send};
use crate::client::ApiRequest;
use crate::payload::{
    Endpoint, PendingCommand, Reading, RegistrationRequest, SensorDataRequest, SensorKind,
    StatusUpdate, Telemetry,
};
use crate::report::StepOutcome;
use crate::runner::{Step, StepContext};

/// Registers the configured device through the device-management function.
pub struct RegisterDevice;

#[async_trait]
impl Step for RegisterDevice {
    fn name(&self) -> String {
        "Device Registration".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let body = RegistrationRequest::from_config(&ctx.config);
        let request = ApiRequest::post(Endpoint::DeviceManagement.path()).json(&body)?;
        let response = match send(ctx, "device registration", request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };

        if !matches!(response.status, 200 | 201) {
            return Ok(rejected("Device registration", &response));
        }
        ctx.session.device_id = Some(body.device_id);
        ctx.session.device_name = Some(body.name);

        let mut outcome = StepOutcome::pass("Device registration successful");
        if let Some(json) = response.json_body() {
            outcome = outcome.with_details(json.clone());
        }
        Ok(outcome)
    }
}

/// Posts one sensor reading for the session's device and zone.
pub struct SendReading {
    name: String,
    kind: SensorKind,
    simulated: bool,
}

impl SendReading {
    /// A randomized reading with random telemetry and the key in the body,
    /// shaped like the firmware's own posts.
    pub fn simulated(kind: SensorKind) -> Self {
        Self {
            name: format!("{} Data", kind.title()),
            kind,
            simulated: true,
        }
    }

    /// A fixed reading under a custom step name.
    pub fn nominal(name: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            simulated: false,
        }
    }
}

#[async_trait]
impl Step for SendReading {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let (device_id, zone_id) = match ctx.session.require_device_and_zone() {
            Ok(ids) => ids,
            Err(outcome) => return Ok(outcome),
        };

        let body = if self.simulated {
            SensorDataRequest::new(device_id, zone_id, Reading::realistic(self.kind), Telemetry::random())
                .with_api_key(&ctx.config.api_key)
        } else {
            SensorDataRequest::new(device_id, zone_id, Reading::nominal(self.kind), Telemetry::nominal())
        };
        let value = body.value;

        let action = format!("{} data", self.kind);
        let request = ApiRequest::post(Endpoint::SensorData.path()).json(&body)?;
        let response = match send(ctx, &action, request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };
        if response.status != 200 {
            return Ok(rejected(&format!("{} data", self.kind.title()), &response));
        }

        let mut message = format!(
            "{} data sent successfully ({value}{})",
            self.kind.title(),
            self.kind.unit()
        );
        let json = response.json_body();
        if json.and_then(|j| j.get("irrigation_needed")).and_then(Value::as_bool) == Some(true) {
            message.push_str(", server recommends irrigation");
        }
        let mut outcome = StepOutcome::pass(message);
        if let Some(server_message) = json.and_then(|j| j.get("message")).and_then(Value::as_str) {
            outcome = outcome.with_details(format!("Response: {server_message}"));
        }
        Ok(outcome)
    }
}

/// Polls the command queue the way the firmware does.
///
/// A 404 means the queue is empty and counts as a pass. When
/// `expect_pending` is set, the step checks for the command submitted earlier
/// in the run and an empty 200 list fails.
pub struct PollCommands {
    name: &'static str,
    expect_pending: bool,
}

impl PollCommands {
    pub fn polling() -> Self {
        Self {
            name: "Command Polling",
            expect_pending: false,
        }
    }

    pub fn retrieval() -> Self {
        Self {
            name: "Command Retrieval",
            expect_pending: true,
        }
    }
}

#[async_trait]
impl Step for PollCommands {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        if self.expect_pending {
            if let Err(outcome) = ctx.session.require_command() {
                return Ok(outcome);
            }
        }
        let device_id = match ctx.session.require_device() {
            Ok(id) => id.to_string(),
            Err(outcome) => return Ok(outcome),
        };

        let request = ApiRequest::get(Endpoint::Commands.path())
            .query("device_id", device_id)
            .query("apiKey", ctx.config.api_key.clone());
        let response = match send(ctx, "command polling", request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };

        match response.status {
            404 => Ok(StepOutcome::pass("No pending commands")),
            200 => {
                let commands: Vec<PendingCommand> = response
                    .json_body()
                    .and_then(|j| j.get("commands"))
                    .map(|c| serde_json::from_value(c.clone()))
                    .transpose()?
                    .unwrap_or_default();
                if commands.is_empty() && self.expect_pending {
                    return Ok(StepOutcome::fail("No commands retrieved"));
                }
                let mut outcome =
                    StepOutcome::pass(format!("Found {} pending commands", commands.len()));
                if !commands.is_empty() {
                    let types: Vec<&str> = commands.iter().map(PendingCommand::type_name).collect();
                    outcome = outcome.with_details(types.join(", "));
                }
                Ok(outcome)
            },
            _ => Ok(rejected("Command polling", &response)),
        }
    }
}

/// Marks the session's device online.
pub struct Heartbeat {
    name: &'static str,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self { name: "Heartbeat" }
    }

    /// The same call, reported as a device-management check.
    pub fn device_management() -> Self {
        Self {
            name: "Device Management",
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for Heartbeat {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let device_id = match ctx.session.require_device() {
            Ok(id) => id,
            Err(outcome) => return Ok(outcome),
        };
        let body = StatusUpdate::online(device_id, &ctx.config.api_key);
        let request = ApiRequest::put(Endpoint::DeviceManagement.path()).json(&body)?;
        let response = match send(ctx, "heartbeat", request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };
        if response.status != 200 {
            return Ok(rejected("Status update", &response));
        }
        Ok(StepOutcome::pass("Device status updated to online"))
    }
}
