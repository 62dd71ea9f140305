//! # svc-triage
//!
//! Incident snapshot collector for a single systemd-managed service.
//!
//! ## Overview
//!
//! svc-triage gathers the operational state of one unit (status, journal,
//! host resources, main process detail and optional hardening posture)
//! into a timestamped bundle directory, then archives it as a `.tar.gz`
//! for offline analysis.
//!
//! ## Features
//!
//! - **Partial-failure tolerance**: a failing or panicking collector never aborts the run
//! - **Bounded parallelism**: collectors overlap their command wait time on a small worker pool
//! - **Bounded commands**: every external command has a timeout and an output cap
//! - **Secret redaction**: optional scrubbing of journal output with a whitelist
//! - **Run summary and metrics**: `meta.json` in every bundle, node_exporter textfile output
//!
//! ## Usage
//!
//! ```no_run
//! use svc_triage::config::ToolkitConfig;
//! use svc_triage::incident::collect_incident;
//! use svc_triage::preflight::check_required_commands;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ToolkitConfig::for_unit("nginx.service");
//! config.validate()?;
//!
//! let missing = check_required_commands();
//! let outcome = collect_incident(&config, &missing)?;
//!
//! println!("{}", outcome.archive.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`collectors`]: The collectors and the orchestrator that runs them
//! - [`config`]: YAML configuration with defaults and validation
//! - [`incident`]: One complete collection run
//! - [`preflight`]: Startup check for required external programs
//! - [`security`]: Secret redaction and bundle path validation
//! - [`utils`]: Command execution, bundle writing, archiving, summary and metrics
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Collectors and the collection orchestrator
pub mod collectors;

/// Configuration loading and validation
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Complete collection run
pub mod incident;

/// Required program lookup
pub mod preflight;

/// Redaction and path validation
pub mod security;

/// Command execution, bundles, archives, summary and metrics
pub mod utils;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
