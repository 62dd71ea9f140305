//! Basic systemd sandboxing checks for the unit.
//!
//! This is a quick PASS/WARN/FAIL report over a fixed set of unit
//! properties, not a security audit. Checks always run in the order of
//! [`HardeningCheck::ALL`], so reports are stable between runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;

use super::{Collector, CollectorContext};
use crate::constants::{OS_RELEASE_PATH, SYSTEMCTL_TIMEOUT_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    fn symbol(self) -> &'static str {
        match self {
            Verdict::Pass => "[OK]",
            Verdict::Warn => "[!!]",
            Verdict::Fail => "[XX]",
        }
    }
}

/// One hardening property check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardeningCheck {
    NonRootUser,
    PrivateTmp,
    ProtectSystem,
    ProtectHome,
    NoNewPrivileges,
}

impl HardeningCheck {
    /// Every check, in report order
    pub const ALL: [HardeningCheck; 5] = [
        HardeningCheck::NonRootUser,
        HardeningCheck::PrivateTmp,
        HardeningCheck::ProtectSystem,
        HardeningCheck::ProtectHome,
        HardeningCheck::NoNewPrivileges,
    ];

    /// Unit property inspected by this check
    pub fn property(self) -> &'static str {
        match self {
            HardeningCheck::NonRootUser => "User",
            HardeningCheck::PrivateTmp => "PrivateTmp",
            HardeningCheck::ProtectSystem => "ProtectSystem",
            HardeningCheck::ProtectHome => "ProtectHome",
            HardeningCheck::NoNewPrivileges => "NoNewPrivileges",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            HardeningCheck::NonRootUser => "Running as non-root user",
            HardeningCheck::PrivateTmp => "Private /tmp namespace",
            HardeningCheck::ProtectSystem => "Filesystem protection",
            HardeningCheck::ProtectHome => "Home directory protection",
            HardeningCheck::NoNewPrivileges => "Prevent privilege escalation",
        }
    }

    /// Unit file line suggested when the check warns
    pub fn recommendation(self) -> &'static str {
        match self {
            HardeningCheck::NonRootUser => "User=nobody  # or a dedicated service user",
            HardeningCheck::PrivateTmp => "PrivateTmp=yes",
            HardeningCheck::ProtectSystem => "ProtectSystem=strict",
            HardeningCheck::ProtectHome => "ProtectHome=yes",
            HardeningCheck::NoNewPrivileges => "NoNewPrivileges=yes",
        }
    }

    /// Judge a property value. An unset property is passed as `""`.
    pub fn evaluate(self, value: &str) -> (Verdict, String) {
        let lower = value.to_lowercase();
        match self {
            HardeningCheck::NonRootUser => {
                if !value.is_empty() && value != "root" && value != "0" {
                    (Verdict::Pass, format!("Running as non-root user: {}", value))
                } else {
                    let shown = if value.is_empty() { "not set" } else { value };
                    (Verdict::Warn, format!("Running as root (User={})", shown))
                }
            }
            HardeningCheck::PrivateTmp | HardeningCheck::NoNewPrivileges => {
                if matches!(lower.as_str(), "yes" | "true" | "1") {
                    (Verdict::Pass, format!("{} is enabled", self.property()))
                } else {
                    (
                        Verdict::Warn,
                        format!("{} is not enabled (currently: {})", self.property(), value),
                    )
                }
            }
            HardeningCheck::ProtectSystem => {
                if value.is_empty() || lower == "false" {
                    (Verdict::Warn, "ProtectSystem is not set".to_string())
                } else {
                    (Verdict::Pass, format!("ProtectSystem={}", value))
                }
            }
            HardeningCheck::ProtectHome => {
                if matches!(lower.as_str(), "yes" | "true" | "read-only" | "tmpfs") {
                    (Verdict::Pass, format!("ProtectHome={}", value))
                } else {
                    (Verdict::Warn, "ProtectHome is not set (home dirs accessible)".to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    #[serde(skip)]
    pub check: HardeningCheck,
    pub name: String,
    pub status: Verdict,
    pub message: String,
    pub property_value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCounts {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
}

impl VerdictCounts {
    fn tally(results: &[CheckResult]) -> Self {
        let count = |v: Verdict| results.iter().filter(|r| r.status == v).count();
        Self {
            pass: count(Verdict::Pass),
            warn: count(Verdict::Warn),
            fail: count(Verdict::Fail),
        }
    }
}

/// Machine-readable form written to `hardening/report.json`
#[derive(Debug, Clone, Serialize)]
pub struct HardeningReport {
    pub unit: String,
    pub distro: String,
    pub summary: VerdictCounts,
    pub checks: Vec<CheckResult>,
}

/// Parse `systemctl show` output into a property map
pub fn parse_properties(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Run every check against `properties`, in [`HardeningCheck::ALL`] order
pub fn run_checks(properties: &HashMap<String, String>) -> Vec<CheckResult> {
    HardeningCheck::ALL
        .iter()
        .map(|&check| {
            let value = properties.get(check.property()).cloned().unwrap_or_default();
            let (status, message) = check.evaluate(&value);
            CheckResult {
                check,
                name: check.description().to_string(),
                status,
                message,
                property_value: value,
            }
        })
        .collect()
}

/// `PRETTY_NAME` from an os-release file, or empty when unavailable
pub fn distro_name(os_release: &Path) -> String {
    let Ok(content) = fs::read_to_string(os_release) else {
        return String::new();
    };
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim_matches('"').to_string())
        .unwrap_or_default()
}

/// Human-readable report written to `hardening/report.txt`
pub fn render_report(report: &HardeningReport) -> String {
    let rule = "-".repeat(60);
    let banner = "=".repeat(60);
    let mut lines = vec![
        format!("# Hardening Report for {}", report.unit),
        "# This is a basic check, not a full security audit".to_string(),
    ];

    if !report.distro.is_empty() {
        lines.push(format!("# Distro: {}", report.distro));
    }

    lines.push(String::new());
    lines.push("# NOTE: Default values may vary between distros (RHEL vs Ubuntu vs Debian).".to_string());
    lines.push("# Some services may legitimately need root or access to /home.\n".to_string());

    let counts = report.summary;
    lines.push(format!(
        "Summary: {} PASS, {} WARN, {} FAIL\n",
        counts.pass, counts.warn, counts.fail
    ));
    lines.push(format!("{}\n", rule));

    for result in &report.checks {
        lines.push(format!("{} {}", result.status.symbol(), result.name));
        lines.push(format!("    {}\n", result.message));
    }

    if counts.warn > 0 {
        lines.push(format!("\n{}", banner));
        lines.push("RECOMMENDATIONS".to_string());
        lines.push(format!("{}\n", banner));
        lines.push("Consider adding these to your unit file:\n".to_string());
        lines.push("  [Service]".to_string());
        for result in report.checks.iter().filter(|r| r.status == Verdict::Warn) {
            lines.push(format!("  {}", result.check.recommendation()));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub struct HardeningCollector {
    ctx: CollectorContext,
    unit: String,
    fail_on_warn: bool,
    os_release: PathBuf,
}

impl HardeningCollector {
    pub fn new(ctx: CollectorContext, unit: &str, fail_on_warn: bool) -> Self {
        Self {
            ctx,
            unit: unit.to_string(),
            fail_on_warn,
            os_release: PathBuf::from(OS_RELEASE_PATH),
        }
    }
}

impl Collector for HardeningCollector {
    fn name(&self) -> &'static str {
        "hardening"
    }

    fn collect(&self) -> Result<()> {
        let show = self
            .ctx
            .run(&["systemctl", "show", self.unit.as_str()], SYSTEMCTL_TIMEOUT_SECS);
        if !show.success() {
            self.ctx.write(
                "hardening/report.txt",
                format!("Failed to get unit properties: {}\n", show.stderr),
            )?;
            return Ok(());
        }

        let checks = run_checks(&parse_properties(&show.stdout));
        let report = HardeningReport {
            unit: self.unit.clone(),
            distro: distro_name(&self.os_release),
            summary: VerdictCounts::tally(&checks),
            checks,
        };

        self.ctx.write("hardening/report.txt", render_report(&report))?;
        self.ctx.bundle.write_json("hardening/report.json", &report)?;

        if self.fail_on_warn && report.summary.warn > 0 {
            bail!("{} hardening check(s) returned WARN", report.summary.warn);
        }
        Ok(())
    }
}
