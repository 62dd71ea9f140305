//! Collectors and the orchestrator that runs them.
//!
//! Each collector gathers one category of diagnostic data about a systemd
//! unit into the bundle:
//!
//! | Collector   | Output                                   |
//! |-------------|------------------------------------------|
//! | `systemd`   | `systemd/{status,show,unit}.txt`         |
//! | `journald`  | `logs/journald.txt`                      |
//! | `resource`  | `resource/{host,mem,disk,net}.txt`       |
//! | `process`   | `process/snapshot.txt`                   |
//! | `hardening` | `hardening/report.{txt,json}`            |
//!
//! Collectors own disjoint output paths, which is what allows the
//! orchestrator to run them concurrently without any locking.

pub mod hardening;
pub mod journald;
pub mod orchestrator;
pub mod process;
pub mod resource;
pub mod systemd;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::ToolkitConfig;
use crate::constants::DEFAULT_MAX_OUTPUT_BYTES;
use crate::security::Redactor;
use crate::utils::bundle::Bundle;
use crate::utils::command::{CommandExecutor, CommandResult};

pub use hardening::HardeningCollector;
pub use journald::JournaldCollector;
pub use orchestrator::{run, Collector, ExecutionMode, Job, JobOutcome, JobStatus, RunReport};
pub use process::ProcessCollector;
pub use resource::ResourceCollector;
pub use systemd::SystemdCollector;

/// Handles shared by every collector of a run.
#[derive(Clone)]
pub struct CollectorContext {
    pub executor: Arc<CommandExecutor>,
    pub bundle: Arc<Bundle>,
    /// Present only when redaction is enabled
    pub redactor: Option<Arc<Redactor>>,
}

impl CollectorContext {
    pub fn new(executor: Arc<CommandExecutor>, bundle: Arc<Bundle>, redactor: Option<Arc<Redactor>>) -> Self {
        Self {
            executor,
            bundle,
            redactor,
        }
    }

    /// Run a command with the default output cap
    pub fn run(&self, command: &[&str], timeout_secs: u64) -> CommandResult {
        self.executor
            .execute(command, Duration::from_secs(timeout_secs), DEFAULT_MAX_OUTPUT_BYTES)
    }

    /// Write text to the bundle as-is
    pub fn write(&self, rel_path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        self.bundle.write_text(rel_path, content, None)
    }

    /// Write text to the bundle, scrubbing it first when redaction is enabled
    pub fn write_redacted(&self, rel_path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        self.bundle.write_text(rel_path, content, self.redactor.as_deref())
    }
}

/// Build one job per collector enabled in `config`.
///
/// Jobs are returned in a fixed order (systemd, journald, resource, process,
/// hardening), which is also the execution order in serial mode.
pub fn jobs_for(config: &ToolkitConfig, ctx: &CollectorContext) -> Vec<Job> {
    let unit = config.service.unit.clone();
    let options = &config.collector_options;
    let mut jobs = Vec::new();

    if config.collect.systemd {
        jobs.push(Job::from_collector(SystemdCollector::new(ctx.clone(), &unit)));
    }
    if config.collect.journald {
        jobs.push(Job::from_collector(JournaldCollector {
            ctx: ctx.clone(),
            unit: unit.clone(),
            since: config.logs.since.clone(),
            lines: config.logs.lines,
            output_format: options.journald.output_format.clone(),
        }));
    }
    if config.collect.resource {
        jobs.push(Job::from_collector(ResourceCollector::new(
            ctx.clone(),
            options.resource.vmstat_samples,
        )));
    }
    if config.collect.process {
        jobs.push(Job::from_collector(ProcessCollector::new(
            ctx.clone(),
            &unit,
            options.process.include_fd_list,
        )));
    }
    if config.collect.hardening {
        jobs.push(Job::from_collector(HardeningCollector::new(
            ctx.clone(),
            &unit,
            options.hardening.fail_on_warn,
        )));
    }

    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_follow_collect_switches() {
        let (_temp, ctx) = crate::test_utils::collector_context(false);
        let mut config = ToolkitConfig::for_unit("nginx.service");

        let names: Vec<String> = jobs_for(&config, &ctx).iter().map(|j| j.name().to_string()).collect();
        assert_eq!(names, vec!["systemd", "journald", "resource", "process"]);

        config.collect.hardening = true;
        config.collect.resource = false;
        let names: Vec<String> = jobs_for(&config, &ctx).iter().map(|j| j.name().to_string()).collect();
        assert_eq!(names, vec!["systemd", "journald", "process", "hardening"]);
    }

    #[test]
    fn test_write_redacted_only_with_redactor() {
        let (_temp, plain) = crate::test_utils::collector_context(false);
        let written = plain.write_redacted("a.txt", "token=abc").unwrap();
        assert_eq!(std::fs::read_to_string(written).unwrap(), "token=abc");

        let (_temp, scrubbing) = crate::test_utils::collector_context(true);
        let written = scrubbing.write_redacted("a.txt", "token=abc").unwrap();
        assert_eq!(std::fs::read_to_string(written).unwrap(), "***REDACTED***");
    }
}
