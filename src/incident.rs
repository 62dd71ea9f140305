//! One complete incident collection run.
//!
//! Creates the bundle, runs the enabled collectors, writes the run summary,
//! archives the bundle and finally updates the textfile metrics.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::collectors::{jobs_for, run, CollectorContext, ExecutionMode, RunReport};
use crate::config::ToolkitConfig;
use crate::constants::{EXIT_FATAL, EXIT_OK, EXIT_PARTIAL_FAILURE};
use crate::security::Redactor;
use crate::utils::bundle::{check_capacity, Bundle};
use crate::utils::command::CommandExecutor;
use crate::utils::metrics::{write_metrics, CollectionMetrics};
use crate::utils::summary::{host_name, RunArguments, RunSummary, ServiceIdentity};

/// Result of a run that produced an archive
#[derive(Debug, Clone)]
pub struct IncidentOutcome {
    pub bundle_dir: PathBuf,
    pub archive: PathBuf,
    pub report: RunReport,
}

/// Run a collection for a validated configuration.
///
/// # Arguments
///
/// * `config` - Validated configuration with command-line overrides applied
/// * `missing_commands` - Required programs found missing at startup
///
/// # Returns
///
/// * `Ok(IncidentOutcome)` - The archive was produced, possibly with failed collectors
/// * `Err` - The bundle could not be created (see [`is_bundle_collision`]),
///   the summary could not be written, or archiving failed
///
/// [`is_bundle_collision`]: crate::utils::bundle::is_bundle_collision
pub fn collect_incident(config: &ToolkitConfig, missing_commands: &[String]) -> Result<IncidentOutcome> {
    let start = Instant::now();
    let service_name = config.service_name();
    let artifacts_dir = &config.output.artifacts_dir;

    let capacity = check_capacity(artifacts_dir, config.output.min_disk_mb);
    if !capacity.ok {
        warn!("Low disk ({}MB free in {})", capacity.available_mb, artifacts_dir.display());
    }

    let bundle = Arc::new(Bundle::create(artifacts_dir, &service_name)?);
    info!("Collecting {} into {}", config.service.unit, bundle.path().display());

    let redactor = config
        .redact
        .enabled
        .then(|| Arc::new(Redactor::new(&config.redact.patterns, &config.redact.whitelist)));
    let executor = Arc::new(CommandExecutor::new()?);
    let ctx = CollectorContext::new(executor, Arc::clone(&bundle), redactor);

    let mode = ExecutionMode::from_flags(config.execution.parallel, config.execution.max_workers);
    let report = run(jobs_for(config, &ctx), mode);

    let summary = RunSummary::new(
        ServiceIdentity {
            name: service_name.clone(),
            unit: config.service.unit.clone(),
        },
        &host_name(),
        RunArguments {
            since: config.logs.since.clone(),
            lines: config.logs.lines,
            redact: config.redact.enabled,
            parallel: config.execution.parallel,
            max_workers: config.execution.max_workers,
        },
        &report,
        missing_commands,
    );
    summary.write_to(&bundle).context("Failed to write run summary")?;

    let archive = bundle.archive().context("Failed to archive bundle")?;

    let bundle_size_bytes = fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    write_metrics(
        &config.output.metrics_dir,
        &CollectionMetrics {
            service: service_name,
            collectors_succeeded: report.succeeded().len(),
            collectors_failed: report.failed().len(),
            duration: start.elapsed(),
            bundle_size_bytes,
        },
    );

    Ok(IncidentOutcome {
        bundle_dir: bundle.path().to_path_buf(),
        archive,
        report,
    })
}

/// Process exit code for the result of [`collect_incident`].
///
/// * `0` - every collector succeeded
/// * `1` - at least one collector failed; the archive was still produced
/// * `3` - the run itself failed (bundle collision, summary or archive error)
///
/// Configuration errors never reach a run and exit with
/// [`EXIT_CONFIG_ERROR`](crate::constants::EXIT_CONFIG_ERROR).
pub fn exit_code(result: &Result<IncidentOutcome>) -> u8 {
    match result {
        Ok(outcome) if outcome.report.all_succeeded() => EXIT_OK,
        Ok(_) => EXIT_PARTIAL_FAILURE,
        Err(_) => EXIT_FATAL,
    }
}
