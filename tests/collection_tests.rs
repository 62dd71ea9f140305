//! Integration tests for orchestrated collection runs.
//!
//! These verify that collectors writing into a shared bundle are isolated
//! from one another, and that a full run produces an archive with a run
//! summary whatever the state of the host.

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;

use svc_triage::collectors::{run, Collector, CollectorContext, ExecutionMode, Job};
use svc_triage::config::ToolkitConfig;
use svc_triage::incident::collect_incident;
use svc_triage::utils::bundle::Bundle;
use svc_triage::utils::command::CommandExecutor;

/// Collector that captures a shell command into its own file, optionally failing afterwards
struct ShellCollector {
    ctx: CollectorContext,
    name: &'static str,
    script: &'static str,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl Collector for ShellCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn collect(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.ctx.run(&["sh", "-c", self.script], 5);
        self.ctx.write(format!("{}/out.txt", self.name), result.combined_output())?;
        if self.fail {
            bail!("{} gave up", self.name);
        }
        Ok(())
    }
}

fn context(temp_dir: &TempDir) -> Result<CollectorContext> {
    let bundle = Bundle::create(temp_dir.path(), "it")?;
    Ok(CollectorContext::new(
        Arc::new(CommandExecutor::new()?),
        Arc::new(bundle),
        None,
    ))
}

fn shell_jobs(ctx: &CollectorContext, calls: &Arc<AtomicUsize>) -> Vec<Job> {
    let specs: [(&'static str, &'static str, bool); 5] = [
        ("alpha", "echo alpha", false),
        ("beta", "sleep 0.2; echo beta", true),
        ("gamma", "echo gamma >&2; exit 7", false),
        ("delta", "sleep 0.1; echo delta", false),
        ("epsilon", "echo epsilon", true),
    ];

    specs
        .iter()
        .map(|&(name, script, fail)| {
            Job::from_collector(ShellCollector {
                ctx: ctx.clone(),
                name,
                script,
                fail,
                calls: Arc::clone(calls),
            })
        })
        .collect()
}

fn set(names: Vec<&str>) -> BTreeSet<String> {
    names.into_iter().map(String::from).collect()
}

fn check_run(mode: ExecutionMode) -> Result<()> {
    let temp_dir = TempDir::new()?;
    let ctx = context(&temp_dir)?;
    let calls = Arc::new(AtomicUsize::new(0));

    let report = run(shell_jobs(&ctx, &calls), mode);

    // Every action ran once and every job is in exactly one list
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    let succeeded = set(report.succeeded());
    let failed = set(report.failed());
    assert!(succeeded.is_disjoint(&failed));
    assert_eq!(succeeded, set(vec!["alpha", "gamma", "delta"]));
    assert_eq!(failed, set(vec!["beta", "epsilon"]));

    // Failed collectors still wrote their files, and nobody overwrote anybody
    for name in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        let content = fs::read_to_string(ctx.bundle.path().join(name).join("out.txt"))?;
        assert!(content.contains(name), "{} output lost: {:?}", name, content);
    }
    Ok(())
}

/// Test partition and isolation with serial execution
#[test]
fn test_serial_collection_isolates_failures() -> Result<()> {
    check_run(ExecutionMode::Serial)
}

/// Test partition and isolation with the worker pool
#[test]
fn test_parallel_collection_isolates_failures() -> Result<()> {
    check_run(ExecutionMode::Parallel { max_workers: 4 })
}

/// Test that a panicking job does not take the run down with it
#[test]
fn test_panicking_job_recorded_as_failed() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let jobs = vec![
        Job::new("panics", || -> Result<()> { panic!("index out of bounds") }),
        Job::new("sleeps", move || {
            std::thread::sleep(Duration::from_millis(50));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    ];

    let report = run(jobs, ExecutionMode::Parallel { max_workers: 2 });
    assert_eq!(report.failed(), vec!["panics"]);
    assert_eq!(report.succeeded(), vec!["sleeps"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

fn quick_config(temp_dir: &TempDir, unit: &str) -> ToolkitConfig {
    let mut config = ToolkitConfig::for_unit(unit);
    config.output.artifacts_dir = temp_dir.path().join("bundles");
    config.output.metrics_dir = temp_dir.path().join("metrics");
    config.output.min_disk_mb = 0;
    config.collector_options.resource.vmstat_samples = 1;
    config.logs.lines = 10;
    config
}

/// Test a full run end to end: bundle, summary, archive and metrics
#[test]
fn test_full_run_produces_archive_and_summary() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::create_dir(temp_dir.path().join("metrics"))?;

    let mut config = quick_config(&temp_dir, "svc-triage-it.service");
    config.collect.hardening = true;
    config.validate()?;

    let missing = vec!["journalctl".to_string()];
    let outcome = collect_incident(&config, &missing)?;

    assert!(outcome.archive.is_file());
    assert!(outcome.archive.to_string_lossy().ends_with("-svc-triage-it.tar.gz"));
    assert_eq!(outcome.report.outcomes().len(), 5);

    let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(outcome.bundle_dir.join("meta.json"))?)?;
    assert_eq!(meta["service"]["unit"], "svc-triage-it.service");
    assert_eq!(meta["service"]["name"], "svc-triage-it");
    assert_eq!(meta["args"]["lines"], 10);
    assert_eq!(meta["missing_commands"], serde_json::json!(["journalctl"]));

    let recorded = meta["collectors"].as_array().unwrap().len() + meta["collectors_failed"].as_array().unwrap().len();
    assert_eq!(recorded, 5);

    // The summary is inside the archive
    let mut archive = Archive::new(GzDecoder::new(fs::File::open(&outcome.archive)?));
    let members: Vec<String> = archive
        .entries()?
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    assert!(members.iter().any(|m| m.ends_with("/meta.json")));
    assert!(members.iter().any(|m| m.ends_with("/resource/host.txt")));
    assert!(members.iter().any(|m| m.ends_with("/systemd/status.txt")));

    let metrics = fs::read_to_string(temp_dir.path().join("metrics/toolkit.prom"))?;
    assert!(metrics.contains("toolkit_collection_total{service=\"svc-triage-it\"} 1"));
    Ok(())
}

/// Test that disabled collectors are not run
#[test]
fn test_only_enabled_collectors_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = quick_config(&temp_dir, "svc-triage-it.service");
    config.collect.systemd = false;
    config.collect.journald = false;
    config.collect.process = false;
    config.execution.parallel = false;

    let outcome = collect_incident(&config, &[])?;

    assert_eq!(outcome.report.succeeded(), vec!["resource"]);
    assert!(!outcome.bundle_dir.join("systemd").exists());
    // No metrics directory, no metrics file
    assert!(!temp_dir.path().join("metrics").exists());
    Ok(())
}
