//! Building blocks shared by the collectors and the binary.
//!
//! ## Components
//!
//! - **Command**: external command execution with timeout and output cap
//! - **Bundle**: bundle directory creation, file writing and archiving
//! - **Compress**: gzip'd tar creation
//! - **Summary**: the `meta.json` run summary
//! - **Metrics**: Prometheus textfile output
//!
//! ## Common Use Cases
//!
//! ### Running a Command
//!
//! ```no_run
//! use std::time::Duration;
//! use svc_triage::utils::command::CommandExecutor;
//!
//! # fn example() -> anyhow::Result<()> {
//! let executor = CommandExecutor::new()?;
//! let result = executor.execute(&["systemctl", "is-active", "nginx"], Duration::from_secs(5), 4096);
//! if result.timed_out {
//!     eprintln!("systemctl hung");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing and Archiving a Bundle
//!
//! ```no_run
//! use std::path::Path;
//! use svc_triage::utils::bundle::Bundle;
//!
//! # fn example() -> anyhow::Result<()> {
//! let bundle = Bundle::create(Path::new("/var/tmp/incident-bundles"), "nginx")?;
//! bundle.write_text("notes.txt", "restarted at 14:02", None)?;
//! let archive = bundle.archive()?;
//! println!("{}", archive.display());
//! # Ok(())
//! # }
//! ```

/// Bundle directory lifecycle and capacity checks
pub mod bundle;

/// External command execution
pub mod command;

/// Tarball creation
pub mod compress;

/// Prometheus textfile metrics
pub mod metrics;

/// Run summary record
pub mod summary;
