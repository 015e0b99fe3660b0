//! Core types used throughout the scansweep library.
//!
//! This module defines the fundamental data structures shared by every
//! scan task: findings, the subjects they point at, task kinds, severity
//! bands, and run identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::heuristics::RuleMatch;

/// The kind of a scan task.
///
/// Each kind corresponds to one independent producer of findings.
/// New kinds are added by registering a new `ScanTask` implementer;
/// nothing else in the pipeline needs to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Heuristic and signature scan over configured file trees.
    Files,
    /// Scan of running processes.
    Processes,
    /// Scan restricted to processes holding GPU resources.
    Gpu,
    /// Three-stage duplicate-file detection.
    Duplicates,
}

impl TaskKind {
    /// Returns the stable string identifier used in report file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Processes => "processes",
            Self::Gpu => "gpu",
            Self::Duplicates => "duplicates",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The object a finding refers to.
///
/// Subjects carry the observable attributes heuristic rules may inspect.
/// They are immutable snapshots taken at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    /// A file on disk.
    File {
        /// Path of the file.
        path: PathBuf,
        /// Size of the file in bytes at discovery time.
        size: u64,
    },

    /// A running process.
    Process {
        /// Process identifier.
        pid: u32,
        /// Process name as reported by the host.
        name: String,
        /// Resolved executable path, when available.
        exe: Option<PathBuf>,
        /// Joined command line, when available.
        cmdline: Option<String>,
    },

    /// A group of files sharing identical content.
    DuplicateGroup {
        /// Hex digest of the shared full content; doubles as the group id.
        digest: String,
        /// Paths of all members, in discovery order.
        members: Vec<PathBuf>,
        /// Bytes reclaimable by keeping a single member.
        reclaimable_bytes: u64,
    },
}

impl Subject {
    /// Returns the name component relevant for name-based rules.
    pub fn display_name(&self) -> String {
        match self {
            Self::File { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Process { name, .. } => name.clone(),
            Self::DuplicateGroup { digest, .. } => {
                format!("dup:{}", &digest[..digest.len().min(12)])
            }
        }
    }

    /// Returns the filesystem paths remediation may act on.
    ///
    /// For duplicate groups this is every member except the first, so one
    /// copy always survives. Process subjects resolve to their executable
    /// path when known, otherwise nothing.
    pub fn remediation_targets(&self) -> Vec<PathBuf> {
        match self {
            Self::File { path, .. } => vec![path.clone()],
            Self::Process { exe, .. } => exe.iter().cloned().collect(),
            Self::DuplicateGroup { members, .. } => members.iter().skip(1).cloned().collect(),
        }
    }
}

/// Coarse severity band derived from a numeric severity score.
///
/// Used for report summaries; the score itself stays the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityBand {
    /// Score below 0.4.
    Low,
    /// Score in [0.4, 0.7).
    Medium,
    /// Score of 0.7 or above.
    High,
}

impl SeverityBand {
    /// Maps a clamped severity score onto a band.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One flagged subject produced by a scan task.
///
/// Findings are immutable once created. Remediation never modifies a
/// finding; it records its disposition in a separate `QuarantineRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable unique identifier.
    pub id: String,

    /// The task kind that produced this finding.
    pub task: TaskKind,

    /// The subject this finding refers to.
    pub subject: Subject,

    /// Severity score in [0, 1], the clamped sum of rule contributions.
    pub severity: f64,

    /// Human-readable reason for the finding.
    pub reason: String,

    /// Matched rules, in registration order.
    pub rule_hits: Vec<RuleMatch>,

    /// When the finding was discovered.
    pub discovered_at: DateTime<Utc>,
}

impl Finding {
    /// Creates a new finding with a fresh identifier.
    ///
    /// The severity is clamped to [0, 1] on construction.
    pub fn new(
        task: TaskKind,
        subject: Subject,
        severity: f64,
        reason: impl Into<String>,
        rule_hits: Vec<RuleMatch>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task,
            subject,
            severity: severity.clamp(0.0, 1.0),
            reason: reason.into(),
            rule_hits,
            discovered_at: Utc::now(),
        }
    }

    /// Returns the severity band for this finding.
    pub fn band(&self) -> SeverityBand {
        SeverityBand::from_score(self.severity)
    }
}

/// Identifier for one orchestrator run, derived from wall-clock time.
///
/// Two runs started within the same second in the same process receive a
/// disambiguating numeric suffix, so report file names never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

static LAST_RUN_ID: Mutex<Option<(String, u32)>> = Mutex::new(None);

impl RunId {
    /// Generates a fresh run identifier from the current UTC time.
    pub fn generate() -> Self {
        let base = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut guard = LAST_RUN_ID.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some((last, counter)) if *last == base => {
                *counter += 1;
                Self(format!("{base}-{counter}"))
            }
            _ => {
                *guard = Some((base.clone(), 0));
                Self(base)
            }
        }
    }

    /// Creates a run id from a known string, for tests and report lookup.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
