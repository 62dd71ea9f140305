//! Startup check for the external programs collectors depend on.
//!
//! The lookup runs once, before the bundle is created. Missing programs do
//! not stop a run: the affected commands will report exit code 127 and the
//! names are recorded in the run summary.

use std::env;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use log::{debug, warn};

use crate::constants::REQUIRED_COMMANDS;

/// Locate an executable named `command` in a `PATH`-style search list
pub fn find_in_path(command: &str, search_path: &OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .map(|dir| dir.join(command))
        .find(|candidate| {
            candidate
                .metadata()
                .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
}

/// The subset of `commands` not found in `search_path`, in input order
pub fn missing_commands(commands: &[&str], search_path: &OsStr) -> Vec<String> {
    commands
        .iter()
        .filter(|command| find_in_path(command, search_path).is_none())
        .map(|command| command.to_string())
        .collect()
}

/// Check the process `PATH` for every required program, warning about each missing one
pub fn check_required_commands() -> Vec<String> {
    let search_path = env::var_os("PATH").unwrap_or_default();
    let missing = missing_commands(REQUIRED_COMMANDS, &search_path);

    for command in &missing {
        warn!("Required command not found on PATH: {}", command);
    }
    if missing.is_empty() {
        debug!("All required commands found: {:?}", REQUIRED_COMMANDS);
    }
    missing
}
