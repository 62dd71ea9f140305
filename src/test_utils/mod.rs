//! Test utilities shared by the unit tests.

#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::{NamedTempFile, TempDir};

use crate::collectors::CollectorContext;
use crate::security::Redactor;
use crate::utils::bundle::Bundle;
use crate::utils::command::CommandExecutor;

/// A collector context writing into a fresh bundle under a temporary directory.
///
/// The `TempDir` must outlive the context.
pub fn collector_context(redact: bool) -> (TempDir, CollectorContext) {
    let temp_dir = TempDir::new().unwrap();
    let bundle = Bundle::create(temp_dir.path(), "unit-test").unwrap();
    let redactor = redact.then(|| Arc::new(Redactor::with_defaults()));
    let ctx = CollectorContext::new(
        Arc::new(CommandExecutor::new().unwrap()),
        Arc::new(bundle),
        redactor,
    );
    (temp_dir, ctx)
}

/// Creates a test YAML configuration file for `unit` writing into `artifacts_dir`
pub fn create_test_config(unit: &str, artifacts_dir: &Path) -> Result<NamedTempFile> {
    let config_content = format!(
        "service:\n  unit: {}\noutput:\n  artifacts_dir: {}\n  metrics_dir: {}\n",
        unit,
        artifacts_dir.display(),
        artifacts_dir.join("metrics").display(),
    );

    let file = NamedTempFile::new()?;
    std::fs::write(file.path(), config_content)?;
    Ok(file)
}
