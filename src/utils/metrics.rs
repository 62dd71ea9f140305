//! Prometheus textfile metrics for node_exporter.
//!
//! After each run a small `toolkit.prom` file is written into the textfile
//! collector directory. When that directory does not exist, node_exporter is
//! assumed not to be set up and nothing is written.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use crate::constants::METRICS_FILE;

/// Figures reported for one collection run
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMetrics {
    pub service: String,
    pub collectors_succeeded: usize,
    pub collectors_failed: usize,
    pub duration: Duration,
    pub bundle_size_bytes: u64,
}

impl CollectionMetrics {
    /// Render in the Prometheus text exposition format
    pub fn render(&self, timestamp_secs: i64) -> String {
        let label = format!("{{service=\"{}\"}}", escape_label(&self.service));
        let gauges: [(&str, &str, &str, String); 6] = [
            (
                "toolkit_collection_total",
                "counter",
                "Total bundle collections",
                "1".to_string(),
            ),
            (
                "toolkit_collection_duration_seconds",
                "gauge",
                "Time to collect bundle",
                format!("{:.2}", self.duration.as_secs_f64()),
            ),
            (
                "toolkit_collectors_success",
                "gauge",
                "Number of collectors that succeeded",
                self.collectors_succeeded.to_string(),
            ),
            (
                "toolkit_collectors_failed",
                "gauge",
                "Number of collectors that failed",
                self.collectors_failed.to_string(),
            ),
            (
                "toolkit_bundle_size_bytes",
                "gauge",
                "Size of generated bundle",
                self.bundle_size_bytes.to_string(),
            ),
            (
                "toolkit_last_collection_timestamp_seconds",
                "gauge",
                "Last collection time",
                timestamp_secs.to_string(),
            ),
        ];

        let mut out = String::new();
        for (i, (name, kind, help, value)) in gauges.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            // Writing into a String cannot fail
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} {}", name, kind);
            let _ = writeln!(out, "{}{} {}", name, label, value);
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Write `toolkit.prom` into `metrics_dir`.
///
/// Returns the written path, or `None` when the directory is missing or the
/// write failed. Failures are logged and never affect the run outcome.
pub fn write_metrics(metrics_dir: &Path, metrics: &CollectionMetrics) -> Option<PathBuf> {
    if !metrics_dir.is_dir() {
        debug!("Metrics directory {} not present, skipping metrics", metrics_dir.display());
        return None;
    }

    let path = metrics_dir.join(METRICS_FILE);
    match fs::write(&path, metrics.render(Utc::now().timestamp())) {
        Ok(()) => {
            debug!("Wrote metrics to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Could not write metrics to {}: {}", path.display(), e);
            None
        }
    }
}
