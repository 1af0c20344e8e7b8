use thiserror::Error;

/// Errors that stop a scan before any probe is dispatched.
///
/// Per-port failures (refused, timed out, unreachable) are outcomes, not errors,
/// and never show up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("target host is empty")]
    EmptyHost,

    #[error("invalid port range {start}-{end} (expected 1 <= start <= end <= 65535)")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("invalid concurrency limit {value} (expected 1..={max})")]
    InvalidConcurrency { value: usize, max: usize },

    #[error("could not resolve host {host}: {reason}")]
    UnresolvedHost { host: String, reason: String },
}
