//! Secret redaction for text written into a bundle.
//!
//! Redaction runs in two passes:
//!
//! 1. **Scrub**: every pattern (the defaults followed by caller-supplied ones)
//!    replaces each of its matches with [`REDACTION_MARKER`].
//! 2. **Restore**: for every whitelist pattern, each match found in the
//!    *original* text replaces the first marker still present in the result.
//!
//! Restoration is positional, not content-aware. When an earlier marker
//! exists than the one produced by the whitelisted text, the earlier marker
//! receives the whitelisted text and the later one stays redacted.
//!
//! ## Pattern dialect
//!
//! Patterns use the `regex` crate syntax. Constructs it does not support,
//! such as lookaround and backreferences, fail to compile and the pattern is
//! skipped. Patterns that can match the empty string also substitute
//! differently from Python's `re.sub`: an empty match directly after a
//! non-empty one is not replaced here. `x*` over `abxd` yields four markers
//! (`M a M b M d M`) where Python yields five (`M a M b M M d M`).
//!
//! Not bulletproof. Always review a bundle before sharing it.

use lazy_static::lazy_static;
use log::warn;
use regex::{NoExpand, Regex};

use crate::constants::REDACTION_MARKER;

/// Source of the built-in scrub patterns, applied before any extra pattern.
pub const DEFAULT_REDACT_PATTERNS: [&str; 5] = [
    // key=value / key: value API keys
    r#"(?i)(api[_-]?key|apikey)[=:\s]+['"]?[\w\-]+['"]?"#,
    // secrets and passwords
    r#"(?i)(secret|password|passwd|pwd)[=:\s]+['"]?[^\s'"]+['"]?"#,
    // bearer / token values
    r#"(?i)(token|bearer)[=:\s]+['"]?[\w\-\.]+['"]?"#,
    // AWS credential-style keys
    r#"(?i)(aws_secret|aws_access)[=:\s]+['"]?[\w\-]+['"]?"#,
    // user:password in a URL authority
    r"://[^:]+:[^@]+@",
];

lazy_static! {
    static ref DEFAULT_PATTERNS: Vec<Regex> = compile_all(&DEFAULT_REDACT_PATTERNS);
}

/// Compile patterns in order, dropping the ones that fail to parse.
fn compile_all<S: AsRef<str>>(sources: &[S]) -> Vec<Regex> {
    sources
        .iter()
        .filter_map(|source| match Regex::new(source.as_ref()) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Ignoring invalid redaction pattern {:?}: {}", source.as_ref(), e);
                None
            }
        })
        .collect()
}

/// Patterns to scrub and patterns to restore, compiled once per run.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<Regex>,
    whitelist: Vec<Regex>,
}

impl Redactor {
    /// Build a redactor from caller-supplied extra patterns and whitelist.
    ///
    /// Extra patterns are appended after the defaults. Malformed patterns in
    /// either list are skipped.
    pub fn new<S: AsRef<str>>(extra_patterns: &[S], whitelist: &[S]) -> Self {
        let mut patterns = DEFAULT_PATTERNS.clone();
        patterns.extend(compile_all(extra_patterns));
        Self {
            patterns,
            whitelist: compile_all(whitelist),
        }
    }

    /// Redactor with only the default patterns and no whitelist
    pub fn with_defaults() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
            whitelist: Vec::new(),
        }
    }

    /// Number of scrub patterns that compiled
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Scrub `text` with every pattern, then restore whitelisted matches.
    ///
    /// Whitelist matches are searched in the original `text` and each fills
    /// the first marker left in the result, whichever secret produced it.
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        for pattern in &self.patterns {
            result = pattern.replace_all(&result, NoExpand(REDACTION_MARKER)).into_owned();
        }

        for pattern in &self.whitelist {
            for found in pattern.find_iter(text) {
                result = result.replacen(REDACTION_MARKER, found.as_str(), 1);
            }
        }

        result
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// One-shot form of [`Redactor::redact`].
///
/// # Example
///
/// ```
/// use svc_triage::security::redactor::redact_text;
///
/// let scrubbed = redact_text("login failed password=hunter2", &[], &[]);
/// assert_eq!(scrubbed, "login failed ***REDACTED***");
/// ```
pub fn redact_text(text: &str, extra_patterns: &[String], whitelist: &[String]) -> String {
    Redactor::new(extra_patterns, whitelist).redact(text)
}
