//! External command execution with a timeout and an output cap.
//!
//! Every invocation produces a [`CommandResult`]. Nonzero exits, timeouts and
//! missing executables are reported through the exit code instead of an error,
//! so collectors can branch on the outcome uniformly.

use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use crate::constants::{
    EXIT_CODE_CANNOT_EXECUTE, EXIT_CODE_NOT_FOUND, EXIT_CODE_SIGNAL_BASE, EXIT_CODE_TIMEOUT,
    PIPE_READ_CHUNK_SIZE,
};

/// Outcome of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandResult {
    fn not_found(command: Vec<String>) -> Self {
        let program = command.first().cloned().unwrap_or_default();
        Self {
            command,
            exit_code: EXIT_CODE_NOT_FOUND,
            stdout: String::new(),
            stderr: format!("Command not found: {}. Check your PATH or install it.", program),
            timed_out: false,
        }
    }

    fn cannot_execute(command: Vec<String>, error: &std::io::Error) -> Self {
        let program = command.first().cloned().unwrap_or_default();
        Self {
            command,
            exit_code: EXIT_CODE_CANNOT_EXECUTE,
            stdout: String::new(),
            stderr: format!("Failed to execute {}: {}", program, error),
            timed_out: false,
        }
    }

    /// True when the process ran to completion with exit status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// stdout and stderr joined the way collectors store them on disk
    pub fn combined_output(&self) -> String {
        format!("{}\n\n{}", self.stdout, self.stderr)
    }
}

/// Runs external commands on a private tokio runtime.
///
/// `execute` is synchronous and may be called from any number of plain
/// threads at once; each call blocks only the calling thread.
pub struct CommandExecutor {
    runtime: Runtime,
}

impl CommandExecutor {
    /// Create an executor backed by a small multi-threaded runtime
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("command-executor")
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime for command execution")?;
        Ok(Self { runtime })
    }

    /// Run `command` (program followed by its arguments).
    ///
    /// stdout and stderr are each capped at `max_bytes`. On timeout the child
    /// is killed and whatever it had written so far is kept.
    pub fn execute<S: AsRef<str>>(
        &self,
        command: &[S],
        timeout: Duration,
        max_bytes: usize,
    ) -> CommandResult {
        let argv: Vec<String> = command.iter().map(|s| s.as_ref().to_string()).collect();
        debug!("Running {:?} (timeout {:?})", argv, timeout);
        self.runtime.block_on(run_with_timeout(argv, timeout, max_bytes))
    }
}

async fn run_with_timeout(argv: Vec<String>, timeout: Duration, max_bytes: usize) -> CommandResult {
    let Some((program, args)) = argv.split_first() else {
        return CommandResult::not_found(argv);
    };

    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => return CommandResult::not_found(argv),
        Err(e) => {
            warn!("Failed to spawn {}: {}", program, e);
            return CommandResult::cannot_execute(argv, &e);
        }
    };

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(drain(pipe, Arc::clone(&stdout_buf), max_bytes)));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(drain(pipe, Arc::clone(&stderr_buf), max_bytes)));
    }

    // The deadline covers both process exit and reaching EOF on its pipes
    let waited = tokio::time::timeout(timeout, async {
        let status = child.wait().await;
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
        status
    })
    .await;

    let (exit_code, timed_out) = match waited {
        Ok(Ok(status)) => (exit_code_of(status), false),
        Ok(Err(e)) => {
            warn!("Failed waiting on {}: {}", program, e);
            (EXIT_CODE_CANNOT_EXECUTE, false)
        }
        Err(_) => {
            debug!("{} timed out after {:?}, killing it", program, timeout);
            if let Err(e) = child.start_kill() {
                debug!("Failed to kill {}: {}", program, e);
            }
            let _ = child.wait().await;
            (EXIT_CODE_TIMEOUT, true)
        }
    };

    // Grandchildren may still hold the pipes open; stop reading either way
    for reader in &readers {
        reader.abort();
    }

    CommandResult {
        command: argv,
        exit_code,
        stdout: decode_capped(&take_buffer(&stdout_buf), max_bytes),
        stderr: decode_capped(&take_buffer(&stderr_buf), max_bytes),
        timed_out,
    }
}

/// Read a pipe to EOF, keeping at most `max_bytes` and discarding the rest
/// so the child never blocks on a full pipe.
async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Arc<Mutex<Vec<u8>>>, max_bytes: usize) {
    let mut chunk = vec![0u8; PIPE_READ_CHUNK_SIZE];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                let room = max_bytes.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}

fn take_buffer(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    std::mem::take(&mut *buf.lock().unwrap_or_else(PoisonError::into_inner))
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| EXIT_CODE_SIGNAL_BASE + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Decode captured bytes, replacing malformed sequences, and keep the result
/// within `max_bytes`.
///
/// The byte cut happens first, so it may split a multi-byte character; the
/// replacement character that stands in for it can push the text past the
/// cap, in which case it is trimmed back to the last whole character.
pub fn decode_capped(bytes: &[u8], max_bytes: usize) -> String {
    let cut = &bytes[..bytes.len().min(max_bytes)];
    let mut text = String::from_utf8_lossy(cut).into_owned();
    if text.len() > max_bytes {
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn executor() -> CommandExecutor {
        CommandExecutor::new().unwrap()
    }

    #[test]
    fn test_normal_completion() {
        let result = executor().execute(&["sh", "-c", "echo out; echo err >&2; exit 3"], Duration::from_secs(5), 1024);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.timed_out);
        assert!(!result.success());
    }

    #[test]
    fn test_missing_executable() {
        let result = executor().execute(&["definitely-not-a-real-binary-xyz"], Duration::from_secs(5), 1024);
        assert_eq!(result.exit_code, EXIT_CODE_NOT_FOUND);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("definitely-not-a-real-binary-xyz"));
        assert!(!result.timed_out);
    }

    #[test]
    fn test_empty_command_is_not_found() {
        let empty: [&str; 0] = [];
        let result = executor().execute(&empty, Duration::from_secs(1), 1024);
        assert_eq!(result.exit_code, EXIT_CODE_NOT_FOUND);
    }

    #[test]
    fn test_combined_output() {
        let result = executor().execute(&["sh", "-c", "printf a; printf b >&2"], Duration::from_secs(5), 1024);
        assert_eq!(result.combined_output(), "a\n\nb");
    }

    #[test]
    fn test_decode_capped_ascii() {
        assert_eq!(decode_capped(b"abcdef", 4), "abcd");
        assert_eq!(decode_capped(b"abc", 10), "abc");
        assert_eq!(decode_capped(b"abc", 0), "");
    }

    #[test]
    fn test_decode_capped_split_character() {
        // "é" is two bytes; cutting after the first leaves a malformed byte
        let text = decode_capped("aé".as_bytes(), 2);
        assert!(text.len() <= 2);
        assert!(text.starts_with('a'));
    }

    proptest! {
        #[test]
        fn prop_decode_capped_never_exceeds_cap(bytes in proptest::collection::vec(any::<u8>(), 0..256), cap in 0usize..300) {
            prop_assert!(decode_capped(&bytes, cap).len() <= cap);
        }
    }
}
