//! Test results, run summaries and their console / JSON renderings.
//!
//! The renderers are pure functions returning `String`s so they can be unit
//! tested without a terminal. Color is applied via the `colored` crate, which
//! respects `colored::control::set_override(false)` when `--no-color` is set
//! or stdout is piped.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Schema version of the JSON report.
///
/// Increment when making breaking changes to the report structure.
const SCHEMA_VERSION: &str = "1.0";

/// Width of the `=` rules framing headers and summaries.
const RULE_WIDTH: usize = 60;

/// What a step reports back to the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
    pub details: Option<Value>,
}

impl StepOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details, e.g. the server response.
    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// The recorded result of one step execution. Never modified once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TestResult {
    pub fn from_outcome(name: impl Into<String>, outcome: StepOutcome, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success: outcome.success,
            message: outcome.message,
            timestamp: Utc::now(),
            duration,
            details: outcome.details,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Fraction of passed steps, `0.0..=1.0`. Zero for an empty run.
    pub success_rate: f64,
}

impl Summary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.success).count();
        let success_rate = if total > 0 {
            passed as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            passed,
            failed: total - passed,
            success_rate,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.failed == 0
    }
}

/// Ordered results of one run.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub started_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// The run was cancelled before every step executed.
    pub interrupted: bool,
}

impl Default for TestReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            results: Vec::new(),
            duration: Duration::ZERO,
            interrupted: false,
        }
    }

    pub fn add_result(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(&self.results)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Look up a result by step name.
    pub fn result(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Text printed under the summary: remediation when something failed,
/// follow-ups when everything passed.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    pub troubleshooting: Vec<&'static str>,
    pub next_steps: Vec<&'static str>,
}

/// Render the line printed as soon as a step completes.
pub fn render_result(result: &TestResult) -> String {
    let status = if result.success {
        "✅ PASS".green().bold()
    } else {
        "❌ FAIL".red().bold()
    };
    let mut line = format!("{} {}: {}", status, result.name.bold(), result.message);
    if let Some(details) = &result.details {
        let details = match details {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        line.push_str(&format!("\n   {} {}", "Details:".dimmed(), details));
    }
    line
}

/// Render the banner printed before the first step.
pub fn render_header(title: &str, rows: &[(&str, String)]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone(), format!("🧪 {}", title.bright_cyan().bold()), rule.clone()];
    for (label, value) in rows {
        lines.push(format!("{:<14} {}", format!("{label}:"), value));
    }
    lines.push(rule);
    lines.join("\n")
}

/// Render the end-of-run summary block.
///
/// ```text
/// ============================================================
/// 📊 TEST SUMMARY
/// ============================================================
/// Total Tests: 7
/// ✅ Passed: 5
/// ❌ Failed: 2
/// Success Rate: 71.4%
///
/// Failed Tests:
///   - Command Polling: Rejected by server (HTTP 500)
/// ```
pub fn render_summary(report: &TestReport, hints: &Hints) -> String {
    let summary = report.summary();
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        format!("📊 {}", "TEST SUMMARY".bold()),
        rule.clone(),
    ];

    for result in &report.results {
        let status = if result.success {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        lines.push(format!("{:<28} : {}", result.name, status));
    }
    lines.push(rule.clone());

    lines.push(format!("Total Tests: {}", summary.total));
    lines.push(format!("✅ Passed: {}", summary.passed.to_string().green()));
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().to_string()
    } else {
        summary.failed.to_string()
    };
    lines.push(format!("❌ Failed: {failed}"));
    let rate = format!("{:.1}%", summary.success_rate * 100.0);
    let rate = if summary.all_passed() {
        rate.green().to_string()
    } else {
        rate.yellow().to_string()
    };
    lines.push(format!("🎯 Success Rate: {rate}"));
    lines.push(format!("⏱  Duration: {:.1}s", report.duration.as_secs_f64()));

    if summary.failed > 0 {
        lines.push(String::new());
        lines.push("Failed Tests:".bold().to_string());
        for result in report.failures() {
            lines.push(format!("  - {}: {}", result.name, result.message));
        }
        if !hints.troubleshooting.is_empty() {
            lines.push(String::new());
            lines.push("🔧 Troubleshooting Tips:".bold().to_string());
            for (i, tip) in hints.troubleshooting.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, tip));
            }
        }
    } else if summary.total > 0 {
        lines.push(String::new());
        lines.push(
            "🎉 All tests passed! Your ESP32 integration is working correctly."
                .green()
                .to_string(),
        );
        if !hints.next_steps.is_empty() {
            lines.push(String::new());
            lines.push("Next steps:".bold().to_string());
            for (i, step) in hints.next_steps.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, step));
            }
        }
    }

    lines.push(rule);
    lines.join("\n")
}

/// JSON report written with `--report`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub schema_version: &'static str,
    pub generated_at: String,
    pub suite: &'a str,
    pub target_url: &'a str,
    pub summary: Summary,
    #[serde(flatten)]
    pub report: &'a TestReport,
}

impl<'a> JsonReport<'a> {
    pub fn new(suite: &'a str, target_url: &'a str, report: &'a TestReport) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            suite,
            target_url,
            summary: report.summary(),
            report,
        }
    }
}

/// Write `report` as pretty JSON to `path`, creating parent directories.
pub fn write_report(report: &JsonReport<'_>, path: &Path) -> Result<PathBuf, std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)?;
    Ok(path.to_path_buf())
}
