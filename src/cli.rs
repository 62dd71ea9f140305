use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunOverrides;

/// Command-line arguments for the svc-triage tool.
///
/// Collection is driven by a YAML configuration file; the options on
/// `incident collect` override the matching values from that file.
#[derive(Parser, Debug)]
#[clap(
    name = "svc-triage",
    version,
    about = "Incident snapshot collector for systemd services"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Incident response operations
    #[clap(subcommand)]
    Incident(IncidentCommands),

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "incident.yaml")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum IncidentCommands {
    /// Collect a diagnostic bundle for the configured service
    Collect(CollectOpts),
}

/// Options for `incident collect`.
#[derive(ClapArgs, Debug)]
pub struct CollectOpts {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: PathBuf,

    /// Journal window, anything journalctl --since accepts (e.g. "2 hours ago")
    #[clap(long)]
    pub since: Option<String>,

    /// Maximum number of journal lines
    #[clap(long)]
    pub lines: Option<u32>,

    /// Scrub secrets from logs
    #[clap(long)]
    pub redact: bool,

    /// Run collectors one at a time (for debugging)
    #[clap(long)]
    pub serial: bool,

    /// Maximum number of collectors running at once
    #[clap(long)]
    pub workers: Option<usize>,
}

impl CollectOpts {
    /// The subset of options that override configuration values
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            since: self.since.clone(),
            lines: self.lines,
            redact: self.redact,
            serial: self.serial,
            max_workers: self.workers,
        }
    }
}
