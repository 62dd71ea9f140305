use std::path::PathBuf;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::collectors::orchestrator::RunReport;
use crate::constants::{GIT_REVISION, RUN_SUMMARY_FILE};
use crate::utils::bundle::Bundle;

/// Service identity recorded in the summary
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub unit: String,
}

/// Effective arguments the run was made with
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunArguments {
    pub since: String,
    pub lines: u32,
    pub redact: bool,
    pub parallel: bool,
    pub max_workers: usize,
}

/// Summary record written to `meta.json` before the bundle is archived.
///
/// # Example Output
///
/// ```json
/// {
///   "collection_id": "550e8400-e29b-41d4-a716-446655440000",
///   "timestamp": "2024-01-15T14:30:52.123456Z",
///   "toolkit_version": "0.3.0",
///   "toolkit_git": "1a2b3c4",
///   "service": { "name": "nginx", "unit": "nginx.service" },
///   "host": "web-01",
///   "args": { "since": "60 min ago", "lines": 5000, "redact": false, "parallel": true, "max_workers": 4 },
///   "collectors": ["resource", "systemd"],
///   "collectors_failed": ["journald"],
///   "missing_commands": []
/// }
/// ```
#[derive(Serialize, Debug, Clone)]
pub struct RunSummary {
    pub collection_id: String,
    pub timestamp: String,
    pub toolkit_version: String,
    pub toolkit_git: String,
    pub service: ServiceIdentity,
    pub host: String,
    pub args: RunArguments,
    pub collectors: Vec<String>,
    pub collectors_failed: Vec<String>,
    pub missing_commands: Vec<String>,
}

impl RunSummary {
    /// Assemble the summary for a finished collection
    pub fn new(
        service: ServiceIdentity,
        host: &str,
        args: RunArguments,
        report: &RunReport,
        missing_commands: &[String],
    ) -> Self {
        Self {
            collection_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            toolkit_version: env!("CARGO_PKG_VERSION").to_string(),
            toolkit_git: GIT_REVISION.to_string(),
            service,
            host: host.to_string(),
            args,
            collectors: report.succeeded().iter().map(|s| s.to_string()).collect(),
            collectors_failed: report.failed().iter().map(|s| s.to_string()).collect(),
            missing_commands: missing_commands.to_vec(),
        }
    }

    /// Write the summary to the bundle root
    pub fn write_to(&self, bundle: &Bundle) -> Result<PathBuf> {
        bundle.write_json(RUN_SUMMARY_FILE, self)
    }
}

/// Name of the host running the collection, or `"unknown"`
pub fn host_name() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
