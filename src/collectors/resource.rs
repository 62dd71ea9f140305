//! Host resource snapshot: identity, memory, disk and network.

use anyhow::Result;

use super::{Collector, CollectorContext};
use crate::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, PROBE_TIMEOUT_SECS};

/// One shell capture written to its own file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Capture {
    rel_path: &'static str,
    script: String,
    timeout_secs: u64,
}

pub struct ResourceCollector {
    ctx: CollectorContext,
    vmstat_samples: u32,
}

impl ResourceCollector {
    pub fn new(ctx: CollectorContext, vmstat_samples: u32) -> Self {
        Self { ctx, vmstat_samples }
    }

    fn captures(&self) -> Vec<Capture> {
        vec![
            // `date` first so the bundle can be lined up with the logs
            Capture {
                rel_path: "resource/host.txt",
                script: "date -Is; hostname; uname -a; uptime".to_string(),
                timeout_secs: PROBE_TIMEOUT_SECS,
            },
            Capture {
                rel_path: "resource/mem.txt",
                script: format!("free -h; echo; vmstat 1 {}", self.vmstat_samples),
                timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            },
            Capture {
                rel_path: "resource/disk.txt",
                script: "df -h; echo; lsblk".to_string(),
                timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            },
            // ss only shows process names as root; partial output is fine
            Capture {
                rel_path: "resource/net.txt",
                script: "ip a; echo; ip r; echo; ss -tulpn".to_string(),
                timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            },
        ]
    }
}

impl Collector for ResourceCollector {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn collect(&self) -> Result<()> {
        for capture in self.captures() {
            let result = self
                .ctx
                .run(&["bash", "-lc", capture.script.as_str()], capture.timeout_secs);
            self.ctx.write(capture.rel_path, result.combined_output())?;
        }
        Ok(())
    }
}
