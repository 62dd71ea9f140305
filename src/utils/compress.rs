use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use tar::Builder;
use walkdir::WalkDir;

/// Archive a directory into a gzip-compressed tarball.
///
/// Every member path is prefixed with the directory's own name, so extracting
/// the archive recreates a single top-level folder. Entries are added in
/// sorted order, which keeps archives of identical trees identical.
///
/// # Arguments
///
/// * `source_dir` - Directory to archive
/// * `archive_path` - Where to write the `.tar.gz`
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path to the created archive
/// * `Err` - If the source directory is invalid or any write fails
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use svc_triage::utils::compress::create_tar_gz;
/// let archive = create_tar_gz(
///     Path::new("/var/tmp/incident-bundles/20240115-143052Z-nginx"),
///     Path::new("/var/tmp/incident-bundles/20240115-143052Z-nginx.tar.gz"),
/// )?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn create_tar_gz(source_dir: &Path, archive_path: &Path) -> Result<PathBuf> {
    let start = Instant::now();

    if !source_dir.is_dir() {
        return Err(anyhow!("Not a directory: {}", source_dir.display()));
    }

    let top_level = source_dir
        .file_name()
        .ok_or_else(|| anyhow!("Cannot archive a directory without a name: {}", source_dir.display()))?;

    info!("Archiving {} ...", source_dir.display());

    let file = fs::File::create(archive_path)
        .with_context(|| format!("Failed to create archive {}", archive_path.display()))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut entries = 0usize;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", source_dir.display()))?;
        let rel_path = entry
            .path()
            .strip_prefix(source_dir)
            .context("Walked outside of the source directory")?;
        let member = Path::new(top_level).join(rel_path);

        if entry.file_type().is_dir() {
            builder
                .append_dir(&member, entry.path())
                .with_context(|| format!("Failed to add directory {}", member.display()))?;
        } else {
            builder
                .append_path_with_name(entry.path(), &member)
                .with_context(|| format!("Failed to add {}", member.display()))?;
            entries += 1;
        }
        debug!("Archived {}", member.display());
    }

    let encoder = builder.into_inner().context("Failed to finalize tar stream")?;
    let writer = encoder.finish().context("Failed to finalize gzip stream")?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush archive: {}", e.error()))?
        .sync_all()
        .context("Failed to sync archive to disk")?;

    info!(
        "Archived {} files to {} in {:?}",
        entries,
        archive_path.display(),
        start.elapsed()
    );
    Ok(archive_path.to_path_buf())
}
