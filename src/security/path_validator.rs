//! Path validation for files written into a bundle.
//!
//! Collectors address their output with bundle-relative paths such as
//! `logs/journald.txt`. These helpers make sure such a path cannot escape
//! the bundle directory and that a service name is usable as part of a
//! directory name.

use std::path::{Component, Path};

use anyhow::{bail, Result};

/// Validates a path that will be joined onto a bundle root.
///
/// # Security
///
/// This function rejects:
/// - Absolute paths and Windows prefixes
/// - Path traversal using `..`
/// - Null bytes
/// - Paths with no file component
pub fn validate_relative_path(path: &Path) -> Result<()> {
    if let Some(path_str) = path.to_str() {
        if path_str.contains('\0') {
            bail!("Path contains null bytes");
        }
    }

    let mut has_normal_component = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                bail!("Path traversal attempt detected: {} contains '..'", path.display());
            }
            Component::RootDir | Component::Prefix(_) => {
                bail!("Absolute paths not allowed inside a bundle: {}", path.display());
            }
            Component::CurDir => {}
            Component::Normal(_) => has_normal_component = true,
        }
    }

    if !has_normal_component {
        bail!("Empty path inside a bundle");
    }

    Ok(())
}

/// Validates a service name that becomes part of the bundle directory name.
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Service name is empty");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        bail!("Service name contains a path separator: {:?}", name);
    }
    if name.chars().all(|c| c == '.') {
        bail!("Service name cannot consist only of dots: {:?}", name);
    }
    if name.chars().any(|c| c.is_control()) {
        bail!("Service name contains control characters: {:?}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_accepted() {
        assert!(validate_relative_path(Path::new("logs/journald.txt")).is_ok());
        assert!(validate_relative_path(Path::new("./meta.json")).is_ok());
        assert!(validate_relative_path(Path::new("resource/mem.txt")).is_ok());
    }

    #[test]
    fn test_path_escape_attempts() {
        let escape_attempts = vec![
            "../outside.txt",
            "logs/../../etc/passwd",
            "/etc/passwd",
            "",
            ".",
        ];

        for attempt in escape_attempts {
            assert!(
                validate_relative_path(Path::new(attempt)).is_err(),
                "Failed to catch escape attempt: {}",
                attempt
            );
        }
    }

    #[test]
    fn test_null_bytes_rejected() {
        assert!(validate_relative_path(Path::new("file\0name")).is_err());
    }

    #[test]
    fn test_service_names() {
        assert!(validate_service_name("nginx").is_ok());
        assert!(validate_service_name("my-app@1").is_ok());
        assert!(validate_service_name("api.v2").is_ok());

        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("   ").is_err());
        assert!(validate_service_name("a/b").is_err());
        assert!(validate_service_name("..").is_err());
        assert!(validate_service_name("bad\nname").is_err());
    }
}
