//! Sequential step execution.
//!
//! The [`Runner`] owns the session state shared between steps and is the only
//! place where step failures are caught: an `Err` returned by a step and a
//! panic inside a step both become a failed [`TestResult`] and the run moves on
//! to the next step.

use async_trait::async_trait;
use futures::FutureExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::any::Any;
use std::io::IsTerminal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ApiRequest, ApiResponse, HttpAdapter};
use crate::config::TesterConfig;
use crate::error::TransportError;
use crate::report::{render_result, StepOutcome, TestReport, TestResult};

/// Failure message when a step needs a device that was never registered.
pub const DEVICE_UNAVAILABLE: &str = "Device not available";
/// Failure message when a step needs both a device and a zone.
pub const DEVICE_OR_ZONE_UNAVAILABLE: &str = "Device or zone not available";
/// Failure message when a step needs a previously submitted command.
pub const NO_COMMAND_SUBMITTED: &str = "No command submitted";

/// Identifiers discovered or created during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Device the readings, commands and heartbeats are sent for.
    pub device_id: Option<String>,
    /// Display name of that device, when known.
    pub device_name: Option<String>,
    /// Zone the readings are filed under.
    pub zone_id: Option<String>,
    /// Display name of that zone, when known.
    pub zone_name: Option<String>,
    /// Id of the command queued by the command step, read back later.
    pub command_id: Option<String>,
}

impl Session {
    /// Seed the session with the device and zone named in `config`.
    pub fn from_config(config: &TesterConfig) -> Self {
        Self {
            device_id: Some(config.device_id.clone()),
            device_name: Some(config.device.name.clone()),
            zone_id: config.zone_id.clone(),
            ..Self::default()
        }
    }

    /// The device identifier, or the missing-dependency outcome.
    pub fn require_device(&self) -> Result<&str, StepOutcome> {
        self.device_id
            .as_deref()
            .ok_or_else(|| StepOutcome::fail(DEVICE_UNAVAILABLE))
    }

    /// The device and zone identifiers, or the missing-dependency outcome.
    pub fn require_device_and_zone(&self) -> Result<(&str, &str), StepOutcome> {
        match (self.device_id.as_deref(), self.zone_id.as_deref()) {
            (Some(device), Some(zone)) => Ok((device, zone)),
            _ => Err(StepOutcome::fail(DEVICE_OR_ZONE_UNAVAILABLE)),
        }
    }

    /// The last submitted command identifier, or the missing-dependency outcome.
    pub fn require_command(&self) -> Result<&str, StepOutcome> {
        self.command_id
            .as_deref()
            .ok_or_else(|| StepOutcome::fail(NO_COMMAND_SUBMITTED))
    }
}

/// Everything a step can see while it runs.
pub struct StepContext {
    pub config: TesterConfig,
    pub client: Arc<dyn HttpAdapter>,
    pub session: Session,
}

impl StepContext {
    /// Send a request through the configured adapter.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.client.send(request).await
    }
}

/// One remote check.
///
/// Return `Ok` with a failed [`StepOutcome`] for expected failures such as a
/// rejected request. Anything returned as `Err` is reported as a crash.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> String;

    async fn run(&self, ctx: &mut StepContext) -> anyhow::Result<StepOutcome>;
}

/// A step plus the pause taken after it.
pub struct TestStep {
    step: Box<dyn Step>,
    pause_after: Duration,
}

impl TestStep {
    pub fn new(step: impl Step + 'static) -> Self {
        Self {
            step: Box::new(step),
            pause_after: Duration::ZERO,
        }
    }

    /// Wait `pause` after this step before starting the next one.
    pub fn pause_after(mut self, pause: Duration) -> Self {
        self.pause_after = pause;
        self
    }

    pub fn name(&self) -> String {
        self.step.name()
    }
}

impl<S: Step + 'static> From<S> for TestStep {
    fn from(step: S) -> Self {
        Self::new(step)
    }
}

/// Runs steps one at a time, in order.
pub struct Runner {
    context: StepContext,
    cancel: CancellationToken,
    quiet: bool,
}

impl Runner {
    /// Create a runner with an empty session.
    pub fn new(client: Arc<dyn HttpAdapter>, config: TesterConfig) -> Self {
        Self {
            context: StepContext {
                config,
                client,
                session: Session::default(),
            },
            cancel: CancellationToken::new(),
            quiet: false,
        }
    }

    /// Start from a pre-seeded session.
    pub fn with_session(mut self, session: Session) -> Self {
        self.context.session = session;
        self
    }

    /// Stop the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Do not print anything while running.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Execute `steps` and collect their results.
    ///
    /// Always returns a report. If the cancellation token fires, the step in
    /// flight is dropped without a result and the report is marked interrupted.
    pub async fn run(&mut self, steps: Vec<TestStep>) -> TestReport {
        let mut report = TestReport::new();
        let started = Instant::now();

        for test_step in steps {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let name = test_step.name();
            info!(target: "esp32.tester", step = %name, "Running step");
            let spinner = self.spinner(&name);
            let step_started = Instant::now();

            let execution = AssertUnwindSafe(test_step.step.run(&mut self.context)).catch_unwind();
            let finished = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = execution => Some(result),
            };
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            let Some(finished) = finished else {
                warn!(target: "esp32.tester", step = %name, "Run interrupted");
                report.interrupted = true;
                break;
            };

            let outcome = match finished {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => StepOutcome::fail(format!("Test crashed: {err:#}")),
                Err(panic) => StepOutcome::fail(format!("Test crashed: {}", panic_message(&panic))),
            };
            let result = TestResult::from_outcome(name, outcome, step_started.elapsed());
            info!(
                target: "esp32.tester",
                step = %result.name,
                success = result.success,
                elapsed_ms = result.duration.as_millis() as u64,
                "Step finished"
            );
            if !self.quiet {
                println!("{}", render_result(&result));
            }
            report.add_result(result);

            if !self.pause(test_step.pause_after).await {
                report.interrupted = true;
                break;
            }
        }

        report.duration = started.elapsed();
        report
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn spinner(&self, name: &str) -> Option<ProgressBar> {
        if self.quiet || !std::io::stderr().is_terminal() {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {wide_msg}") {
            spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        spinner.set_message(format!("Testing {name}..."));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, bool);

    #[async_trait]
    impl Step for Fixed {
        fn name(&self) -> String {
            self.0.to_string()
        }

        async fn run(&self, _ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
            Ok(if self.1 {
                StepOutcome::pass("ok")
            } else {
                StepOutcome::fail("nope")
            })
        }
    }

    struct Erroring;

    #[async_trait]
    impl Step for Erroring {
        fn name(&self) -> String {
            "Erroring".to_string()
        }

        async fn run(&self, _ctx: &mut StepContext) -> anyhow::Result<StepOutcome> {
            anyhow::bail!("body was not JSON")
        }
    }

    struct Unreachable;

    #[async_trait]
    impl HttpAdapter for Unreachable {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Connection {
                message: "unreachable".to_string(),
            })
        }
    }

    fn runner() -> Runner {
        Runner::new(Arc::new(Unreachable), TesterConfig::default()).quiet()
    }

    #[tokio::test]
    async fn test_results_keep_step_order() {
        let report = runner()
            .run(vec![Fixed("a", true).into(), Fixed("b", false).into(), Fixed("c", true).into()])
            .await;
        let names: Vec<_> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(report.summary().failed, 1);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_step_error_recorded_as_crash() {
        let report = runner().run(vec![Erroring.into(), Fixed("after", true).into()]).await;
        assert_eq!(report.results[0].message, "Test crashed: body was not JSON");
        assert!(!report.results[0].success);
        assert!(report.results[1].success);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let report = runner()
            .with_cancellation(token)
            .run(vec![Fixed("a", true).into()])
            .await;
        assert!(report.results.is_empty());
        assert!(report.interrupted);
    }

    #[test]
    fn test_session_requirements() {
        let mut session = Session::default();
        assert_eq!(session.require_device().unwrap_err().message, DEVICE_UNAVAILABLE);
        session.device_id = Some("dev".to_string());
        assert_eq!(
            session.require_device_and_zone().unwrap_err().message,
            DEVICE_OR_ZONE_UNAVAILABLE
        );
        session.zone_id = Some("zone".to_string());
        assert_eq!(session.require_device_and_zone().unwrap(), ("dev", "zone"));
        assert_eq!(session.require_command().unwrap_err().message, NO_COMMAND_SUBMITTED);
    }

    #[test]
    fn test_session_seeded_from_config() {
        let config = TesterConfig::new("https://abc.supabase.co", "key").with_zone_id("zone-1");
        let session = Session::from_config(&config);
        assert_eq!(session.device_id.as_deref(), Some("esp32_test_device"));
        assert_eq!(session.zone_id.as_deref(), Some("zone-1"));
        assert!(session.command_id.is_none());
    }
}
