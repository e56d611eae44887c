//! Dashboard-side checks: reachability, resource discovery and read-back.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;

use super::{first_row, id_string, rejected, send};
use crate::client::{ApiRequest, ApiResponse};
use crate::payload::{CommandRequest, Endpoint, NewDevice, NewZone};
use crate::report::StepOutcome;
use crate::runner::{Step, StepContext};

/// Reads the realtime cache table to prove the URL and key are accepted.
pub struct ProbeBackend;

#[async_trait]
impl Step for ProbeBackend {
    fn name(&self) -> String {
        "Supabase Connection".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let request = ApiRequest::get(Endpoint::RealtimeCache.path());
        let response = match send(ctx, "connection check", request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };
        if response.status != 200 {
            return Ok(rejected("Connection", &response));
        }
        Ok(StepOutcome::pass("Successfully connected to Supabase"))
    }
}

/// Sends a preflight `OPTIONS` to one edge function.
pub struct ProbeEdgeFunction(pub Endpoint);

#[async_trait]
impl Step for ProbeEdgeFunction {
    fn name(&self) -> String {
        format!("Edge Function: {}", self.0.name())
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let action = format!("{} probe", self.0.name());
        let response = match send(ctx, &action, ApiRequest::options(self.0.path())).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };
        if response.status != 200 {
            return Ok(rejected("Function probe", &response));
        }
        Ok(StepOutcome::pass("Function accessible"))
    }
}

/// What a find-or-create pass settled on.
struct Discovered {
    id: String,
    name: String,
    created: bool,
}

/// List `endpoint`; use the first row, or insert `new_row` when the table is empty.
///
/// Returns the failure outcome on any unexpected status or shape.
async fn find_or_create(
    ctx: &StepContext,
    endpoint: Endpoint,
    label: &str,
    new_row: Value,
) -> Result<Discovered, StepOutcome> {
    let listed = send(ctx, &format!("{label} lookup"), ApiRequest::get(endpoint.path())).await?;
    if listed.status != 200 {
        return Err(rejected(&format!("Access to {label}s"), &listed));
    }

    let (row, created) = match first_row(listed.json_body()) {
        Some(row) => (row.clone(), false),
        None => {
            let request = ApiRequest::post(endpoint.path())
                .header("Prefer", "return=representation")
                .json(&new_row)
                .map_err(|e| StepOutcome::fail(format!("Could not encode new {label}: {e}")))?;
            let inserted: ApiResponse =
                send(ctx, &format!("{label} creation"), request).await?;
            if inserted.status != 201 {
                return Err(rejected(&format!("Creating {label}"), &inserted));
            }
            let row = first_row(inserted.json_body())
                .cloned()
                .ok_or_else(|| StepOutcome::fail(format!("Created {label} was not returned")))?;
            (row, true)
        },
    };

    let id = row
        .get("id")
        .and_then(id_string)
        .ok_or_else(|| StepOutcome::fail(format!("The {label} record has no id")))?;
    let name = row
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unnamed")
        .to_string();
    Ok(Discovered { id, name, created })
}

/// Picks the first registered device, creating a throwaway one if none exist.
pub struct DiscoverDevice {
    pub new_device_name: String,
}

impl Default for DiscoverDevice {
    fn default() -> Self {
        Self {
            new_device_name: "Test_ESP32_Device".to_string(),
        }
    }
}

#[async_trait]
impl Step for DiscoverDevice {
    fn name(&self) -> String {
        "Device Registration".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let new_row = serde_json::to_value(NewDevice::test_device(&self.new_device_name))?;
        let found = match find_or_create(ctx, Endpoint::Devices, "device", new_row).await {
            Ok(found) => found,
            Err(outcome) => return Ok(outcome),
        };

        let message = if found.created {
            format!("Created test device: {}", found.name)
        } else {
            format!("Using existing device: {}", found.name)
        };
        ctx.session.device_id = Some(found.id);
        ctx.session.device_name = Some(found.name);
        Ok(StepOutcome::pass(message))
    }
}

/// Picks the first zone, creating a test zone if none exist.
pub struct DiscoverZone {
    pub new_zone_name: String,
}

impl Default for DiscoverZone {
    fn default() -> Self {
        Self {
            new_zone_name: "Test_Zone".to_string(),
        }
    }
}

#[async_trait]
impl Step for DiscoverZone {
    fn name(&self) -> String {
        "Zone Creation".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let new_row = serde_json::to_value(NewZone::test_zone(&self.new_zone_name))?;
        let found = match find_or_create(ctx, Endpoint::Zones, "zone", new_row).await {
            Ok(found) => found,
            Err(outcome) => return Ok(outcome),
        };

        let message = if found.created {
            format!("Created test zone: {}", found.name)
        } else {
            format!("Using existing zone: {}", found.name)
        };
        ctx.session.zone_id = Some(found.id);
        ctx.session.zone_name = Some(found.name);
        Ok(StepOutcome::pass(message))
    }
}

/// Queues a `GET_STATUS` command for the session's device.
pub struct SubmitCommand;

#[async_trait]
impl Step for SubmitCommand {
    fn name(&self) -> String {
        "Command System".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        let device_id = match ctx.session.require_device() {
            Ok(id) => id,
            Err(outcome) => return Ok(outcome),
        };
        let request = ApiRequest::post(Endpoint::Commands.path())
            .json(&CommandRequest::get_status(device_id))?;
        let response = match send(ctx, "command submission", request).await {
            Ok(response) => response,
            Err(outcome) => return Ok(outcome),
        };
        if response.status != 200 {
            return Ok(rejected("Command sending", &response));
        }

        let command_id = response
            .json_body()
            .and_then(|j| j.pointer("/command/id"))
            .and_then(id_string);
        match command_id {
            Some(id) => {
                let outcome = StepOutcome::pass("Command sent successfully")
                    .with_details(format!("Command ID: {id}"));
                ctx.session.command_id = Some(id);
                Ok(outcome)
            },
            None => Ok(StepOutcome::fail("No command ID returned")),
        }
    }
}

/// Waits for readings to show up in the realtime cache.
///
/// Polls every `pacing.cache_poll_interval` until the table is non-empty or
/// `pacing.cache_wait` has elapsed. Always reads at least once.
pub struct CheckCache;

#[async_trait]
impl Step for CheckCache {
    fn name(&self) -> String {
        "Data Flow - Cache".to_string()
    }

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
        if let Err(outcome) = ctx.session.require_device_and_zone() {
            return Ok(outcome);
        }
        let deadline = Instant::now() + ctx.config.pacing.cache_wait();
        let interval = ctx.config.pacing.cache_poll_interval();

        loop {
            let request = ApiRequest::get(Endpoint::RealtimeCache.path());
            let response = match send(ctx, "cache read", request).await {
                Ok(response) => response,
                Err(outcome) => return Ok(outcome),
            };
            if response.status != 200 {
                return Ok(rejected("Cache access", &response));
            }

            let entries = match response.json_body() {
                Some(Value::Array(rows)) => rows.len(),
                Some(Value::Object(_)) => 1,
                _ => 0,
            };
            if entries > 0 {
                return Ok(StepOutcome::pass(format!(
                    "Data appears in cache: {entries} entries"
                )));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(StepOutcome::fail("No data in cache"));
            }
            let wait = if interval.is_zero() {
                deadline - now
            } else {
                interval.min(deadline - now)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiResponse;
    use crate::config::Pacing;
    use crate::runner::{Session, DEVICE_OR_ZONE_UNAVAILABLE, DEVICE_UNAVAILABLE};
    use crate::steps::test_support::{context, Canned};
    use http::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn seeded() -> Session {
        Session {
            device_id: Some("dev-1".to_string()),
            zone_id: Some("zone-1".to_string()),
            ..Session::default()
        }
    }

    #[tokio::test]
    async fn test_edge_function_probe_uses_options() {
        let adapter = Canned::new(|_| Ok(ApiResponse::from_text(200, "ok")));
        let mut ctx = context(adapter.clone(), Session::default());
        let step = ProbeEdgeFunction(Endpoint::Commands);
        assert_eq!(step.name(), "Edge Function: esp32-commands");
        assert!(step.run(&mut ctx).await.unwrap().success);

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::OPTIONS);
        assert_eq!(seen[0].path, "/functions/v1/esp32-commands");
    }

    #[tokio::test]
    async fn test_discover_uses_existing_device() {
        let adapter = Canned::new(|_| {
            Ok(ApiResponse::json(200, json!([{"id": "uuid-1", "name": "Garden"}])))
        });
        let mut ctx = context(adapter.clone(), Session::default());
        let outcome = DiscoverDevice::default().run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::pass("Using existing device: Garden"));
        assert_eq!(ctx.session.device_id.as_deref(), Some("uuid-1"));
        assert_eq!(adapter.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_discover_creates_zone_when_table_empty() {
        let adapter = Canned::new(|request| {
            if request.method == Method::GET {
                Ok(ApiResponse::json(200, json!([])))
            } else {
                Ok(ApiResponse::json(201, json!([{"id": 7, "name": "Test_Zone"}])))
            }
        });
        let mut ctx = context(adapter.clone(), Session::default());
        let outcome = DiscoverZone::default().run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::pass("Created test zone: Test_Zone"));
        assert_eq!(ctx.session.zone_id.as_deref(), Some("7"));

        let seen = adapter.seen.lock().unwrap();
        let body = seen[1].body.as_ref().unwrap();
        assert_eq!(body["soil_type"], "Loamy");
        assert!(seen[1]
            .headers
            .contains(&("Prefer".to_string(), "return=representation".to_string())));
    }

    #[tokio::test]
    async fn test_discover_fails_on_rejected_insert() {
        let adapter = Canned::new(|request| {
            if request.method == Method::GET {
                Ok(ApiResponse::json(200, json!([])))
            } else {
                Ok(ApiResponse::from_text(403, "permission denied"))
            }
        });
        let mut ctx = context(adapter, Session::default());
        let outcome = DiscoverDevice::default().run(&mut ctx).await.unwrap();
        assert_eq!(outcome.message, "Creating device failed: HTTP 403");
        assert!(ctx.session.device_id.is_none());
    }

    #[tokio::test]
    async fn test_submit_command_stores_id() {
        let adapter = Canned::new(|_| Ok(ApiResponse::json(200, json!({"command": {"id": "cmd-9"}}))));
        let mut ctx = context(adapter, seeded());
        let outcome = SubmitCommand.run(&mut ctx).await.unwrap();
        assert_eq!(outcome.details, Some(json!("Command ID: cmd-9")));
        assert_eq!(ctx.session.command_id.as_deref(), Some("cmd-9"));
    }

    #[tokio::test]
    async fn test_submit_command_without_id_fails() {
        let adapter = Canned::new(|_| Ok(ApiResponse::json(200, json!({"success": true}))));
        let mut ctx = context(adapter, seeded());
        let outcome = SubmitCommand.run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::fail("No command ID returned"));
    }

    #[tokio::test]
    async fn test_submit_command_without_device() {
        let adapter = Canned::new(|_| Ok(ApiResponse::json(200, json!({}))));
        let mut ctx = context(adapter, Session::default());
        let outcome = SubmitCommand.run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::fail(DEVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_cache_polls_until_rows_appear() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let adapter = Canned::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(ApiResponse::json(200, json!([])))
            } else {
                Ok(ApiResponse::json(200, json!([{"sensor_type": "moisture"}])))
            }
        });
        let mut ctx = context(adapter, seeded());
        ctx.config.pacing = Pacing {
            cache_wait_ms: 1000,
            cache_poll_interval_ms: 10,
            ..Pacing::none()
        };
        let outcome = CheckCache.run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::pass("Data appears in cache: 1 entries"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cache_empty_after_deadline_fails() {
        let adapter = Canned::new(|_| Ok(ApiResponse::json(200, json!([]))));
        let mut ctx = context(adapter.clone(), seeded());
        ctx.config.pacing = Pacing::none();
        let outcome = CheckCache.run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::fail("No data in cache"));
        assert_eq!(adapter.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_requires_device_and_zone() {
        let adapter = Canned::new(|_| Ok(ApiResponse::json(200, json!([{}]))));
        let mut ctx = context(adapter, Session::default());
        let outcome = CheckCache.run(&mut ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::fail(DEVICE_OR_ZONE_UNAVAILABLE));
    }
}
