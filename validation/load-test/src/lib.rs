//! Load testing for the order web app and its REST data API.
//!
//! This crate provides:
//! - The read-only traffic mix (weighted browsing behaviors)
//! - Scenario configuration from YAML, environment and CLI flags
//! - Run orchestration with live progress
//! - Output in multiple formats (console, JSON, CSV)

pub mod config;
pub mod report;
pub mod runner;
pub mod scenario;

pub use config::{ScenarioConfig, TestConfig};
pub use report::ResultsReport;
pub use runner::{LoadRunner, RunSummary};
