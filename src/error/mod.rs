//! Error types for credprov.

use thiserror::Error;

/// Primary error type for all credprov operations.
///
/// Pipeline-internal failures never surface through this type: the
/// acquisition chain absorbs them into the `NotApplicable` outcome so the
/// host can try its next provider. `CredProvError` is reserved for the
/// process edge — a malformed second-factor secret and transport I/O
/// faults are the only conditions that escape the absorbing outcomes.
#[derive(Error, Debug)]
pub enum CredProvError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CredProvError>;
