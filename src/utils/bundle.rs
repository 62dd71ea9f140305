//! Incident bundle directory: creation, writing and archiving.
//!
//! A bundle lives at `<artifacts_dir>/<UTC timestamp>-<service>` and is
//! populated by collectors through [`Bundle::write_text`] and
//! [`Bundle::write_json`]. Each collector owns the sub-paths it writes;
//! nothing here serializes concurrent writers.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use sysinfo::{DiskExt, System, SystemExt};
use thiserror::Error;

use crate::constants::{ARCHIVE_EXTENSION, BUNDLE_TIMESTAMP_FORMAT};
use crate::security::{validate_relative_path, validate_service_name, Redactor};
use crate::utils::compress::create_tar_gz;

/// UTC timestamp used in bundle identifiers, e.g. `20240115-143052Z`
pub fn utc_stamp() -> String {
    Utc::now().format(BUNDLE_TIMESTAMP_FORMAT).to_string()
}

/// The bundle directory for this service and second already exists.
///
/// Raised only by the final `create_dir` of [`Bundle::create`]; any other
/// `AlreadyExists` error on the way there is reported as an ordinary failure.
#[derive(Debug, Error)]
#[error("Bundle directory {} already exists", .path.display())]
pub struct BundleCollision {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A bundle directory created for one collection run.
#[derive(Debug, Clone)]
pub struct Bundle {
    id: String,
    root: PathBuf,
}

impl Bundle {
    /// Create a fresh bundle directory under `artifacts_dir`.
    ///
    /// Fails with [`BundleCollision`] when the exact directory is already
    /// present, which happens when two runs for the same service start within
    /// the same second. The name is never uniquified.
    pub fn create(artifacts_dir: &Path, service_name: &str) -> Result<Self> {
        validate_service_name(service_name)?;

        fs::create_dir_all(artifacts_dir).with_context(|| {
            format!("Failed to create artifacts directory {}", artifacts_dir.display())
        })?;

        let id = format!("{}-{}", utc_stamp(), service_name);
        let root = artifacts_dir.join(&id);

        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(source) if source.kind() == ErrorKind::AlreadyExists => {
                return Err(BundleCollision { path: root, source }.into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create bundle directory {}", root.display()));
            }
        }

        info!("Bundle directory created at {}", root.display());
        Ok(Self { id, root })
    }

    /// `<timestamp>-<service>` identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a bundle-relative path, refusing anything outside the bundle
    pub fn resolve(&self, rel_path: impl AsRef<Path>) -> Result<PathBuf> {
        let rel_path = rel_path.as_ref();
        validate_relative_path(rel_path)?;
        Ok(self.root.join(rel_path))
    }

    /// Write text to `rel_path`, creating parent directories.
    ///
    /// Malformed UTF-8 in `content` is replaced rather than rejected. When a
    /// redactor is given the text is scrubbed before it reaches the disk.
    pub fn write_text(
        &self,
        rel_path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
        redactor: Option<&Redactor>,
    ) -> Result<PathBuf> {
        let target = self.resolve(rel_path)?;
        create_parent(&target)?;

        let text = String::from_utf8_lossy(content.as_ref());
        let text = match redactor {
            Some(redactor) => redactor.redact(&text),
            None => text.into_owned(),
        };

        fs::write(&target, text).with_context(|| format!("Failed to write {}", target.display()))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }

    /// Serialize `value` as indented JSON to `rel_path`.
    ///
    /// Struct fields keep their declaration order and map keys are sorted,
    /// so equal values always produce identical files.
    pub fn write_json<T: Serialize + ?Sized>(&self, rel_path: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
        let target = self.resolve(rel_path)?;
        create_parent(&target)?;

        let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
        fs::write(&target, json).with_context(|| format!("Failed to write {}", target.display()))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }

    /// Path the archive of this bundle will be written to
    pub fn archive_path(&self) -> PathBuf {
        self.root.with_extension(ARCHIVE_EXTENSION)
    }

    /// Produce `<bundle>.tar.gz` next to the bundle directory.
    ///
    /// The directory itself is left in place.
    pub fn archive(&self) -> Result<PathBuf> {
        create_tar_gz(&self.root, &self.archive_path())
    }
}

fn create_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// True when `err` is, or was caused by, a [`BundleCollision`]
pub fn is_bundle_collision(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<BundleCollision>())
}

/// Free space available for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityCheck {
    /// False only when free space was measured and is below the minimum
    pub ok: bool,
    /// Free megabytes, or -1 when it could not be determined
    pub available_mb: i64,
}

/// Best-effort free-space check for `path`.
///
/// Any failure to determine free space yields `ok = true, available_mb = -1`:
/// the result is a warning signal and never a reason to skip collection.
pub fn check_capacity(path: &Path, min_mb: u64) -> CapacityCheck {
    match available_mb(path) {
        Some(available) => CapacityCheck {
            ok: available >= min_mb,
            available_mb: i64::try_from(available).unwrap_or(i64::MAX),
        },
        None => CapacityCheck { ok: true, available_mb: -1 },
    }
}

fn available_mb(path: &Path) -> Option<u64> {
    fs::create_dir_all(path).ok()?;
    let path = path.canonicalize().ok()?;

    let mut system = System::new();
    system.refresh_disks_list();
    system.refresh_disks();

    // The disk holding `path` is the one with the longest matching mount point
    system
        .disks()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().components().count())
        .map(|disk| disk.available_space() / (1024 * 1024))
}
