//! ESP32 Backend Integration Tester
//!
//! This crate checks that a dashboard backend accepts the calls ESP32 firmware
//! makes: device registration, sensor readings, command polling and
//! heartbeats. It ships two binaries (`esp32-connection-test` and
//! `esp32-integration-test`) and can also be used as a library.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use esp32_tester::{ReqwestAdapter, Runner, Suite, TesterConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TesterConfig::new("https://abc123.supabase.co", "anon-key")
//!         .with_zone_id("0b7e6c1e-5d1c-4d8e-9a55-1f2f3a4b5c6d");
//!     let suite = Suite::connection(&config);
//!
//!     let client = Arc::new(ReqwestAdapter::from_config(&config)?);
//!     let report = Runner::new(client, config)
//!         .with_session(suite.session)
//!         .quiet()
//!         .run(suite.steps)
//!         .await;
//!
//!     println!("{} of {} passed", report.summary().passed, report.summary().total);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod report;
pub mod runner;
pub mod source;
pub mod steps;
pub mod suite;

// Re-export commonly used types
pub use client::{ApiRequest, ApiResponse, HttpAdapter, ReqwestAdapter, ResponseBody};
pub use config::{ConfigIssue, TesterConfig, ValidationPolicy, ValidationReport};
pub use error::{ConfigError, TransportError};
pub use report::{StepOutcome, Summary, TestReport, TestResult};
pub use runner::{Runner, Session, Step, StepContext, TestStep};
pub use suite::Suite;
