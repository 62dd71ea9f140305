use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ARTIFACTS_DIR, DEFAULT_JOURNAL_OUTPUT_FORMAT, DEFAULT_LOG_LINES, DEFAULT_LOG_SINCE,
    DEFAULT_MAX_WORKERS, DEFAULT_METRICS_DIR, DEFAULT_MIN_DISK_MB, DEFAULT_VMSTAT_SAMPLES,
};
use crate::security::validate_service_name;

/// Unit written by `init-config`, to be replaced by the operator
pub const PLACEHOLDER_UNIT: &str = "myapp.service";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ServiceSection {
    /// systemd unit, e.g. `nginx.service`
    #[serde(default)]
    pub unit: String,
    /// Name used for the bundle; derived from `unit` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutputSection {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Free space below this only produces a warning
    #[serde(default = "default_min_disk_mb")]
    pub min_disk_mb: u64,
    /// node_exporter textfile directory; metrics are skipped when it is missing
    #[serde(default = "default_metrics_dir")]
    pub metrics_dir: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACTS_DIR)
}

fn default_min_disk_mb() -> u64 {
    DEFAULT_MIN_DISK_MB
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from(DEFAULT_METRICS_DIR)
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            min_disk_mb: default_min_disk_mb(),
            metrics_dir: default_metrics_dir(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LogsSection {
    #[serde(default = "default_since")]
    pub since: String,
    #[serde(default = "default_lines")]
    pub lines: u32,
}

fn default_since() -> String {
    DEFAULT_LOG_SINCE.to_string()
}

fn default_lines() -> u32 {
    DEFAULT_LOG_LINES
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            since: default_since(),
            lines: default_lines(),
        }
    }
}

fn enabled() -> bool {
    true
}

/// Which collectors run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CollectSection {
    #[serde(default = "enabled")]
    pub systemd: bool,
    #[serde(default = "enabled")]
    pub journald: bool,
    #[serde(default = "enabled")]
    pub resource: bool,
    #[serde(default = "enabled")]
    pub process: bool,
    #[serde(default)]
    pub hardening: bool,
}

impl Default for CollectSection {
    fn default() -> Self {
        Self {
            systemd: true,
            journald: true,
            resource: true,
            process: true,
            hardening: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RedactSection {
    #[serde(default)]
    pub enabled: bool,
    /// Applied after the built-in patterns
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Matches of these are restored after scrubbing
    #[serde(default)]
    pub whitelist: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExecutionSection {
    #[serde(default = "enabled")]
    pub parallel: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            parallel: true,
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JournaldOptions {
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_output_format() -> String {
    DEFAULT_JOURNAL_OUTPUT_FORMAT.to_string()
}

impl Default for JournaldOptions {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResourceOptions {
    #[serde(default = "default_vmstat_samples")]
    pub vmstat_samples: u32,
}

fn default_vmstat_samples() -> u32 {
    DEFAULT_VMSTAT_SAMPLES
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            vmstat_samples: default_vmstat_samples(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    #[serde(default)]
    pub include_fd_list: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct HardeningOptions {
    /// Fail the collector when any check warns
    #[serde(default)]
    pub fail_on_warn: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct CollectorOptions {
    #[serde(default)]
    pub journald: JournaldOptions,
    #[serde(default)]
    pub resource: ResourceOptions,
    #[serde(default)]
    pub process: ProcessOptions,
    #[serde(default)]
    pub hardening: HardeningOptions,
}

/// Complete toolkit configuration.
///
/// Every section is optional in YAML and falls back to its defaults key by
/// key, so a file containing only `service.unit` is a valid configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ToolkitConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logs: LogsSection,
    #[serde(default)]
    pub collect: CollectSection,
    #[serde(default)]
    pub redact: RedactSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub collector_options: CollectorOptions,
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub since: Option<String>,
    pub lines: Option<u32>,
    /// Only ever switches redaction on
    pub redact: bool,
    /// Only ever switches parallel execution off
    pub serial: bool,
    pub max_workers: Option<usize>,
}

impl ToolkitConfig {
    /// Defaults with the given unit filled in
    pub fn for_unit(unit: &str) -> Self {
        Self {
            service: ServiceSection {
                unit: unit.to_string(),
                name: None,
            },
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// `~` in output directories is expanded. The result is not validated;
    /// call [`ToolkitConfig::validate`] once overrides have been applied.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .context(format!("Failed to parse YAML config {}", path.display()))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: ToolkitConfig = if content.trim().is_empty() {
            ToolkitConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.expand_paths();
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Write the default configuration, with a placeholder unit, to `path`
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        Self::for_unit(PLACEHOLDER_UNIT).save_to_yaml_file(path)
    }

    /// Name used for the bundle directory and metrics labels
    pub fn service_name(&self) -> String {
        match &self.service.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.service.unit.replace(".service", ""),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(since) = &overrides.since {
            self.logs.since = since.clone();
        }
        if let Some(lines) = overrides.lines {
            self.logs.lines = lines;
        }
        if overrides.redact {
            self.redact.enabled = true;
        }
        if overrides.serial {
            self.execution.parallel = false;
        }
        if let Some(max_workers) = overrides.max_workers {
            self.execution.max_workers = max_workers;
        }
    }

    /// Reject configurations that cannot produce a usable bundle
    pub fn validate(&self) -> Result<()> {
        if self.service.unit.trim().is_empty() {
            bail!("config.service.unit is required");
        }
        validate_service_name(&self.service_name()).context("Invalid service name")?;
        if self.execution.max_workers == 0 {
            bail!("execution.max_workers must be at least 1");
        }
        if self.logs.lines == 0 {
            bail!("logs.lines must be at least 1");
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.output.artifacts_dir = expand_tilde(&self.output.artifacts_dir);
        self.output.metrics_dir = expand_tilde(&self.output.metrics_dir);
    }
}

/// Replace a leading `~` with `$HOME`; other paths are returned unchanged
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
