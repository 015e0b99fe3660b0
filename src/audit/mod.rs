//! Append-only audit log.
//!
//! Every state-changing action (and every simulated one) is appended as a
//! single JSON line to `audit.jsonl` in the quarantine directory. The log
//! is never rewritten or truncated by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the entry was recorded.
    pub at: DateTime<Utc>,

    /// The run the entry belongs to, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// The event itself.
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// The action an audit entry records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// An orchestrator run started.
    RunStarted {
        /// Task kinds scheduled for the run.
        tasks: Vec<String>,
    },

    /// An orchestrator run finished.
    RunFinished {
        /// Total findings across all tasks.
        findings: usize,
        /// Whether every task ran to completion.
        complete: bool,
    },

    /// A remediation action was executed or simulated.
    Remediation {
        /// The finding the action belongs to.
        finding_id: String,
        /// The acted-on path.
        path: String,
        /// The effective action name.
        action: String,
        /// Whether the action was only simulated.
        dry_run: bool,
        /// Whether the action succeeded.
        succeeded: bool,
        /// Error description for failed actions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A quarantined object was restored.
    Restore {
        /// The stored name inside the quarantine directory.
        stored_name: String,
        /// The path the object was restored to.
        restored_to: String,
    },

    /// A cache directory was cleaned.
    CacheCleanup {
        /// The cleaned directory.
        dir: String,
        /// Number of entries removed (or that would be removed).
        entries_removed: usize,
        /// Bytes reclaimed (or that would be reclaimed).
        bytes_reclaimed: u64,
        /// Whether the cleanup was only simulated.
        dry_run: bool,
    },
}

/// Handle to the append-only audit log file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Opens (or designates) the audit log inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("audit.jsonl"),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry.
    ///
    /// Failures are logged and swallowed: an unwritable audit log must
    /// never block remediation that is already in flight.
    pub fn append(&self, run_id: Option<&str>, event: AuditEvent) {
        let entry = AuditEntry {
            at: Utc::now(),
            run_id: run_id.map(str::to_string),
            event,
        };
        if let Err(e) = self.try_append(&entry) {
            tracing::warn!(
                target: "scansweep::audit",
                path = %self.path.display(),
                error = %e,
                "failed to append audit entry"
            );
        }
    }

    fn try_append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Reads back every entry, in append order.
    pub fn entries(&self) -> std::io::Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping corrupt audit line");
                }
            }
        }
        Ok(entries)
    }
}
