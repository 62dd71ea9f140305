//! Recent journal entries for the unit.

use std::time::Duration;

use anyhow::Result;
use log::warn;

use super::{Collector, CollectorContext};
use crate::constants::{JOURNAL_MAX_OUTPUT_BYTES, JOURNAL_TIMEOUT_SECS};

/// Collects `journalctl -u <unit>` output into `logs/journald.txt`.
///
/// This is the only collector whose output goes through the redactor.
pub struct JournaldCollector {
    pub ctx: CollectorContext,
    pub unit: String,
    /// Anything `journalctl --since` accepts, e.g. `"60 min ago"`
    pub since: String,
    pub lines: u32,
    pub output_format: String,
}

impl JournaldCollector {
    fn command(&self) -> Vec<String> {
        vec![
            "journalctl".to_string(),
            "-u".to_string(),
            self.unit.clone(),
            "--since".to_string(),
            self.since.clone(),
            // Never page; a pager would hang until the timeout
            "--no-pager".to_string(),
            "-n".to_string(),
            self.lines.to_string(),
            format!("--output={}", self.output_format),
        ]
    }
}

impl Collector for JournaldCollector {
    fn name(&self) -> &'static str {
        "journald"
    }

    fn collect(&self) -> Result<()> {
        let result = self.ctx.executor.execute(
            &self.command(),
            Duration::from_secs(JOURNAL_TIMEOUT_SECS),
            JOURNAL_MAX_OUTPUT_BYTES,
        );

        if result.exit_code != 0 && result.stderr.contains("No entries") {
            warn!(
                "No journal entries for '{}' since {}. Service might be quiet or --since too short.",
                self.unit, self.since
            );
        }

        self.ctx.write_redacted("logs/journald.txt", result.combined_output())?;
        Ok(())
    }
}
