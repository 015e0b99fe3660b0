//! Error types for the scansweep library.
//!
//! Structured, typed errors for all failure scenarios. The library never
//! panics; all errors are returned as `Result` values. The taxonomy follows
//! the engine's degradation rules: scope errors become report warnings,
//! integrity errors drop duplicate candidacy, action errors become failed
//! quarantine records, and configuration errors are fatal before any scan.

use thiserror::Error;

/// The main error type for scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Required configuration is missing or invalid.
    ///
    /// Fatal at orchestrator start, before any task runs.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what is missing or invalid.
        message: String,
    },

    /// A scan target path or enumeration source is unavailable.
    #[error("target '{target}' is unavailable: {reason}")]
    TargetUnavailable {
        /// The path or source that could not be used.
        target: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A host enumeration facility failed entirely.
    #[error("enumeration of {what} failed: {reason}")]
    EnumerationFailed {
        /// What was being enumerated (e.g. "processes").
        what: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The scan was cancelled before completing.
    #[error("scan was cancelled")]
    Cancelled,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl ScanError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a `TargetUnavailable` error.
    pub fn target_unavailable(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TargetUnavailable {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `EnumerationFailed` error.
    pub fn enumeration_failed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnumerationFailed {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error must abort the run before scanning.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Error type for remediation operations.
///
/// Per-finding I/O failures are not surfaced through this type; they are
/// captured as failed `QuarantineRecord` entries so remediation of the
/// remaining findings continues.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// A directory was submitted for cache cleanup without being
    /// classified as a safe cache location by configuration.
    #[error("directory '{path}' is not a configured cache location")]
    UnsafeCacheDir {
        /// The rejected directory.
        path: String,
    },

    /// The quarantine store could not be prepared.
    #[error("failed to prepare quarantine store: {reason}")]
    StorePreparation {
        /// Reason for the failure.
        reason: String,
    },

    /// No quarantined object with the given stored name exists.
    #[error("no quarantined object named '{name}'")]
    NotFound {
        /// The stored name that was looked up.
        name: String,
    },

    /// An I/O error occurred outside per-finding action handling.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for report rendering and persistence.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serializing a report failed.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No persisted report exists for the requested kind.
    #[error("no persisted report for task '{kind}'")]
    NotFound {
        /// The task kind that was looked up.
        kind: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// A specialized `Result` type for remediation operations.
pub type RemediationResult<T> = Result<T, RemediationError>;

/// A specialized `Result` type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;
