//! Global constants for svc-triage.
//!
//! Defaults here are what a configuration file falls back to when a key is
//! absent.

// Command execution
/// Default timeout for a single external command, in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Default cap on captured stdout/stderr per command (2MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 2_000_000;

/// Read chunk size for draining child process pipes (64KB)
pub const PIPE_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Exit code reported for a command that exceeded its timeout (same as GNU timeout)
pub const EXIT_CODE_TIMEOUT: i32 = 124;

/// Exit code reported when the command could be found but not executed
pub const EXIT_CODE_CANNOT_EXECUTE: i32 = 126;

/// Exit code reported when the executable is not on PATH
pub const EXIT_CODE_NOT_FOUND: i32 = 127;

/// Offset added to a terminating signal number (shell convention)
pub const EXIT_CODE_SIGNAL_BASE: i32 = 128;

// Redaction
/// Placeholder substituted for every redacted match
pub const REDACTION_MARKER: &str = "***REDACTED***";

// Orchestration
/// Default width of the collector worker pool
pub const DEFAULT_MAX_WORKERS: usize = 4;

// Bundle layout
/// Timestamp format used in bundle identifiers
pub const BUNDLE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%SZ";

/// Extension of the produced archive
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Run summary file name, written at the bundle root
pub const RUN_SUMMARY_FILE: &str = "meta.json";

/// Default directory for incident bundles
pub const DEFAULT_ARTIFACTS_DIR: &str = "/var/tmp/incident-bundles";

/// Warn when less than this much free space is available (MB)
pub const DEFAULT_MIN_DISK_MB: u64 = 500;

// Logs
pub const DEFAULT_LOG_SINCE: &str = "60 min ago";
pub const DEFAULT_LOG_LINES: u32 = 5000;
pub const DEFAULT_JOURNAL_OUTPUT_FORMAT: &str = "short-iso";

/// journalctl is allowed a longer timeout and a bigger capture than other commands
pub const JOURNAL_TIMEOUT_SECS: u64 = 15;
pub const JOURNAL_MAX_OUTPUT_BYTES: usize = 5_000_000;

/// Timeout for systemctl invocations
pub const SYSTEMCTL_TIMEOUT_SECS: u64 = 8;

/// Timeout for short probes such as ps and MainPID lookup
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Default number of vmstat samples
pub const DEFAULT_VMSTAT_SAMPLES: u32 = 5;

// Metrics
/// node_exporter textfile collector directory
pub const DEFAULT_METRICS_DIR: &str = "/var/lib/node_exporter/textfile_collector";
pub const METRICS_FILE: &str = "toolkit.prom";

// File paths
pub const PROC_PATH: &str = "/proc";
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Binaries the collectors depend on
pub const REQUIRED_COMMANDS: &[&str] = &["systemctl", "journalctl", "bash"];

// Process exit codes of the top-level run
pub const EXIT_OK: u8 = 0;
pub const EXIT_PARTIAL_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_FATAL: u8 = 3;

/// Short git revision captured at build time
pub const GIT_REVISION: &str = env!("SVC_TRIAGE_GIT_HASH");
