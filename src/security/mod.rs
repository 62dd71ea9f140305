//! Security utilities applied to bundle contents.
//!
//! This module provides:
//! - Secret redaction for collected text
//! - Path validation so collectors cannot write outside their bundle

pub mod path_validator;
pub mod redactor;

pub use path_validator::{validate_relative_path, validate_service_name};
pub use redactor::{redact_text, Redactor, DEFAULT_REDACT_PATTERNS};
