//! systemd unit state: status, properties and the effective unit file.

use anyhow::Result;
use log::warn;

use super::{Collector, CollectorContext};
use crate::constants::SYSTEMCTL_TIMEOUT_SECS;

/// `systemctl status` exit code for an unknown unit
const UNIT_NOT_FOUND_EXIT_CODE: i32 = 4;

pub struct SystemdCollector {
    ctx: CollectorContext,
    unit: String,
}

impl SystemdCollector {
    pub fn new(ctx: CollectorContext, unit: &str) -> Self {
        Self {
            ctx,
            unit: unit.to_string(),
        }
    }

    fn capture(&self, subcommand: &str, extra: &[&str], rel_path: &str) -> Result<i32> {
        let mut command = vec!["systemctl", subcommand, self.unit.as_str()];
        command.extend_from_slice(extra);

        let result = self.ctx.run(&command, SYSTEMCTL_TIMEOUT_SECS);
        self.ctx.write(rel_path, result.combined_output())?;
        Ok(result.exit_code)
    }
}

impl Collector for SystemdCollector {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn collect(&self) -> Result<()> {
        let status = self.capture("status", &["--no-pager"], "systemd/status.txt")?;
        if status == UNIT_NOT_FOUND_EXIT_CODE {
            warn!("'{}' not found. Did you forget .service?", self.unit);
        }

        // Full property dump, useful for restart loops
        self.capture("show", &[], "systemd/show.txt")?;
        self.capture("cat", &[], "systemd/unit.txt")?;
        Ok(())
    }
}
