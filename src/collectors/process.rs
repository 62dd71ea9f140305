//! Snapshot of the unit's main process.
//!
//! Reads `ps` output plus `limits`, `status` and the fd table from procfs.
//! The process may exit or restart while this runs; read failures are
//! written inline into the snapshot instead of failing the collector.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use log::warn;

use super::{Collector, CollectorContext};
use crate::constants::{PROBE_TIMEOUT_SECS, PROC_PATH};

const SNAPSHOT_PATH: &str = "process/snapshot.txt";

const PS_FORMAT: &str = "pid,ppid,user,%cpu,%mem,vsz,rss,stat,start,time,cmd";

/// Extract a running MainPID from `systemctl show --property=MainPID` output.
///
/// `MainPID=0` means the unit has no main process and yields `None`.
pub fn parse_main_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("MainPID="))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

pub struct ProcessCollector {
    ctx: CollectorContext,
    unit: String,
    include_fd_list: bool,
    proc_root: PathBuf,
}

impl ProcessCollector {
    pub fn new(ctx: CollectorContext, unit: &str, include_fd_list: bool) -> Self {
        Self {
            ctx,
            unit: unit.to_string(),
            include_fd_list,
            proc_root: PathBuf::from(PROC_PATH),
        }
    }

    /// Read process files from `proc_root` instead of `/proc`
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    fn main_pid(&self) -> Option<u32> {
        let property = self.ctx.run(
            &["systemctl", "show", self.unit.as_str(), "--property=MainPID"],
            PROBE_TIMEOUT_SECS,
        );
        if !property.success() {
            return None;
        }
        parse_main_pid(&property.stdout)
    }

    fn snapshot(&self, pid: u32) -> String {
        let pid_dir = self.proc_root.join(pid.to_string());
        let mut out = String::new();

        out.push_str(&format!("# Process snapshot for {} (PID {})\n", self.unit, pid));
        out.push_str(&format!("# Captured: {}\n", Utc::now().to_rfc3339()));
        out.push_str("# Warning: data might be inconsistent if process restarted mid-collection\n\n");

        let pid_arg = pid.to_string();
        let ps = self
            .ctx
            .run(&["ps", "-p", pid_arg.as_str(), "-o", PS_FORMAT], PROBE_TIMEOUT_SECS);
        out.push_str("## ps\n");
        if !ps.stdout.is_empty() {
            out.push_str(&ps.stdout);
        } else if !ps.stderr.is_empty() {
            out.push_str(&ps.stderr);
        } else {
            out.push_str("[failed]\n");
        }
        out.push('\n');

        for name in ["limits", "status"] {
            out.push_str(&format!("## /proc/{}/{}\n", pid, name));
            out.push_str(&read_proc_file(&pid_dir.join(name), pid));
            out.push('\n');
        }

        let fd_dir = pid_dir.join("fd");
        match fd_entries(&fd_dir) {
            Ok(entries) => {
                out.push_str(&format!("## Open fds: {}\n", entries.len()));
                if self.include_fd_list {
                    out.push_str("\n## fd list\n");
                    for (fd, target) in entries {
                        out.push_str(&format!("{} -> {}\n", fd, target));
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => out.push_str("## Open fds: [need root]\n"),
            Err(e) if e.kind() == ErrorKind::NotFound => out.push_str("## Open fds: [process gone]\n"),
            Err(e) => out.push_str(&format!("## Open fds: [Error: {}]\n", e)),
        }

        out
    }
}

/// Read a procfs file, rendering failures as a bracketed note
fn read_proc_file(path: &Path, pid: u32) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => "[Permission denied - need root?]".to_string(),
        Err(e) if e.kind() == ErrorKind::NotFound => format!("[Process {} gone]", pid),
        Err(e) => format!("[Error: {}]", e),
    }
}

/// fd numbers with their link targets, sorted numerically
fn fd_entries(fd_dir: &Path) -> io::Result<Vec<(u32, String)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(fd_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let target = fs::read_link(entry.path())
            .map(|t| t.display().to_string())
            .unwrap_or_else(|_| "?".to_string());
        entries.push((name.parse::<u32>().unwrap_or(u32::MAX), target));
    }
    entries.sort();
    Ok(entries)
}

impl Collector for ProcessCollector {
    fn name(&self) -> &'static str {
        "process"
    }

    fn collect(&self) -> Result<()> {
        match self.main_pid() {
            Some(pid) => {
                self.ctx.write(SNAPSHOT_PATH, self.snapshot(pid))?;
            }
            None => {
                warn!("No MainPID for '{}'", self.unit);
                self.ctx.write(
                    SNAPSHOT_PATH,
                    format!("No MainPID for {} - stopped or Type=oneshot?\n", self.unit),
                )?;
            }
        }
        Ok(())
    }
}
