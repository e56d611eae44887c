//! Glue shared by the two binaries: logging, color, interrupt handling and
//! the mapping from a finished run to a process exit code.

use chrono::Local;
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::{HttpAdapter, ReqwestAdapter};
use crate::config::{TesterConfig, ValidationReport};
use crate::report::{render_header, render_summary, write_report, Hints, JsonReport, TestReport};
use crate::runner::Runner;
use crate::suite::Suite;

/// Install the stderr log subscriber.
///
/// Defaults to `warn`, `-v` raises the crate's target to `debug`. `RUST_LOG`
/// directives are honoured on top.
pub fn init_tracing(verbose: bool) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        if let Ok(directive) = "esp32.tester=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Disable color when asked to, or when stdout is not a terminal.
pub fn configure_color(no_color: bool) {
    if no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Print each validation issue. Returns `true` when the configuration is usable.
pub fn report_validation(report: &ValidationReport) -> bool {
    println!("🔍 Validating configuration...");
    if report.is_valid() {
        println!("{}", "✅ Configuration looks good!".green());
        return true;
    }
    println!();
    println!("{}", "⚠️  Configuration Issues Found:".yellow().bold());
    for issue in report.issues() {
        println!("   ❌ {issue}");
    }
    println!();
    println!("{}", "❌ Please fix configuration issues before running tests.".red());
    false
}

/// Exit code used when the user interrupts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptExit {
    Success,
    Failure,
}

impl From<InterruptExit> for ExitCode {
    fn from(exit: InterruptExit) -> Self {
        match exit {
            InterruptExit::Success => ExitCode::SUCCESS,
            InterruptExit::Failure => ExitCode::FAILURE,
        }
    }
}

/// How a binary wants its run finished.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Write the JSON report here once the run ends.
    pub report_path: Option<PathBuf>,
    pub on_interrupt: InterruptExit,
}

/// Cancel `cancel` on the first Ctrl+C.
async fn watch_ctrl_c(cancel: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "esp32.tester", "Failed to install Ctrl+C handler: {}", err);
        return;
    }
    cancel.cancel();
}

/// Start watching for Ctrl+C. Call once, first thing in `main`, so prompts
/// and validation are covered as well as the run itself.
pub fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(cancel.clone()));
    cancel
}

/// Run blocking `work` (terminal prompts) on its own thread.
///
/// Returns `Ok(None)` if `cancel` fires first. The thread is detached rather
/// than joined, since a pending `read_line` never returns on its own.
pub async fn blocking_unless_cancelled<T, F>(
    cancel: &CancellationToken,
    work: F,
) -> anyhow::Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("esp32-tester-input".to_string())
        .spawn(move || {
            let _ = tx.send(work());
        })?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        result = rx => result
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Input thread ended without an answer")),
    }
}

/// Announce an interrupt and map it to the binary's exit code.
pub fn interrupted(on_interrupt: InterruptExit) -> ExitCode {
    println!("\n\n⏹️  Test interrupted by user");
    on_interrupt.into()
}

/// Run `suite` against the backend in `config` with live output.
///
/// `cancel` should come from [`interrupt_token`].
pub async fn run_suite(
    config: TesterConfig,
    suite: Suite,
    options: &RunOptions,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let client: Arc<dyn HttpAdapter> = Arc::new(ReqwestAdapter::from_config(&config)?);

    println!();
    println!(
        "{}",
        render_header(
            suite.title,
            &[
                ("📅 Started", Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
                ("🌐 URL", config.base_url.clone()),
                ("🔑 Device ID", config.device_id.clone()),
                (
                    "📍 Zone ID",
                    config.zone_id.clone().unwrap_or_else(|| "(discovered)".to_string()),
                ),
            ],
        )
    );
    println!();

    info!(target: "esp32.tester", suite = suite.id, steps = suite.steps.len(), "Starting run");
    let target_url = config.base_url.clone();
    let mut runner = Runner::new(client, config)
        .with_session(suite.session)
        .with_cancellation(cancel);
    let report = runner.run(suite.steps).await;

    finish(&report, suite.id, &target_url, &suite.hints, options)
}

fn finish(
    report: &TestReport,
    suite_id: &str,
    target_url: &str,
    hints: &Hints,
    options: &RunOptions,
) -> anyhow::Result<ExitCode> {
    if let Some(path) = &options.report_path {
        let written = write_report(&JsonReport::new(suite_id, target_url, report), path)
            .map_err(|e| anyhow::anyhow!("Failed to write report to {}: {e}", path.display()))?;
        info!(target: "esp32.tester", path = %written.display(), "Report written");
    }

    if report.interrupted {
        return Ok(interrupted(options.on_interrupt));
    }

    println!("{}", render_summary(report, hints));
    if let Some(path) = &options.report_path {
        println!("📄 Report written to {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Print a top-level error and map it to exit code 1.
pub fn fail(err: &anyhow::Error) -> ExitCode {
    eprintln!("\n💥 Unexpected error: {err:#}");
    eprintln!("Please check your configuration and network connection.");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{StepOutcome, TestResult};
    use std::time::Duration;

    fn options(report_path: Option<PathBuf>, on_interrupt: InterruptExit) -> RunOptions {
        RunOptions {
            report_path,
            on_interrupt,
        }
    }

    #[test]
    fn test_completed_run_exits_zero_even_with_failures() {
        let mut report = TestReport::new();
        report.add_result(TestResult::from_outcome(
            "Heartbeat",
            StepOutcome::fail("Status update failed: HTTP 500"),
            Duration::ZERO,
        ));
        let code = finish(
            &report,
            "connection",
            "https://x.co",
            &Default::default(),
            &options(None, InterruptExit::Failure),
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_interrupt_uses_configured_exit() {
        let report = TestReport {
            interrupted: true,
            ..TestReport::new()
        };
        let hints = Default::default();
        let code = finish(&report, "x", "u", &hints, &options(None, InterruptExit::Failure)).unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        let code = finish(&report, "x", "u", &hints, &options(None, InterruptExit::Success)).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_blocking_work_returns_its_answer() {
        let cancel = CancellationToken::new();
        let answer = blocking_unless_cancelled(&cancel, || 42).await.unwrap();
        assert_eq!(answer, Some(42));
    }

    #[tokio::test]
    async fn test_interrupt_abandons_pending_prompt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let answer = tokio::time::timeout(
            Duration::from_secs(5),
            blocking_unless_cancelled(&cancel, || {
                std::thread::sleep(Duration::from_secs(60));
                "too late"
            }),
        )
        .await
        .expect("an interrupt should not wait for the prompt")
        .unwrap();
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn test_interrupt_during_prompt_uses_configured_exit() {
        let cancel = CancellationToken::new();
        let prompt = {
            let cancel = cancel.clone();
            move || {
                cancel.cancel();
                std::thread::sleep(Duration::from_secs(60));
            }
        };
        let answer = blocking_unless_cancelled(&cancel, prompt).await.unwrap();
        assert!(answer.is_none());
        assert_eq!(interrupted(InterruptExit::Failure), ExitCode::FAILURE);
    }

    #[test]
    fn test_report_written_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        finish(
            &TestReport::new(),
            "integration",
            "https://x.co",
            &Default::default(),
            &options(Some(path.clone()), InterruptExit::Failure),
        )
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["suite"], "integration");
    }
}
