//! Engine configuration.
//!
//! The configuration is resolved by the excluded CLI/config layer and
//! injected into the engine; the core treats it as read-only and never
//! falls back to ambient process state. Validation runs at orchestrator
//! start and is fatal before any scan task executes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::ScanError;
use crate::heuristics::{HeuristicRule, Signature};

/// Resolved configuration consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory persisted reports are written to.
    pub report_dir: PathBuf,

    /// Directory quarantined objects are moved into.
    pub quarantine_dir: PathBuf,

    /// Block size in bytes for staged content hashing.
    pub hash_block_size: usize,

    /// Whether remediation defaults to dry-run.
    pub dry_run_default: bool,

    /// Minimum file size considered by duplicate detection.
    pub duplicate_min_size: u64,

    /// Severity floor below which file and process findings are dropped.
    pub severity_floor: f64,

    /// Heuristic rule set, evaluated in this order.
    pub rules: Vec<HeuristicRule>,

    /// Signature entries matched by digest or filename pattern.
    pub signatures: Vec<Signature>,

    /// Paths scanned by the file and duplicate tasks.
    pub targets: Vec<PathBuf>,

    /// Glob patterns excluded from traversal.
    pub exclusions: Vec<String>,

    /// Directories classified as safe, non-essential cache locations.
    ///
    /// Cache cleanup refuses to touch anything not listed here.
    pub cache_dirs: Vec<PathBuf>,

    /// Bounded timeout applied to external enumeration subprocesses
    /// (the GPU query). Filesystem traversal degrades per entry via
    /// warnings and is not wall-clock bounded.
    #[serde(with = "duration_millis")]
    pub per_item_timeout: Duration,
}

impl EngineConfig {
    /// Creates a configuration with the given required directories and
    /// scan targets, defaulting the remaining knobs.
    pub fn new(
        report_dir: impl Into<PathBuf>,
        quarantine_dir: impl Into<PathBuf>,
        targets: Vec<PathBuf>,
    ) -> Self {
        Self {
            report_dir: report_dir.into(),
            quarantine_dir: quarantine_dir.into(),
            hash_block_size: 64 * 1024,
            dry_run_default: true,
            duplicate_min_size: 1,
            severity_floor: 0.3,
            rules: HeuristicRule::default_rules(),
            signatures: Signature::builtin(),
            targets,
            exclusions: Vec::new(),
            cache_dirs: Vec::new(),
            per_item_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the hashing block size.
    pub fn with_hash_block_size(mut self, size: usize) -> Self {
        self.hash_block_size = size;
        self
    }

    /// Sets the dry-run default.
    pub fn with_dry_run_default(mut self, dry_run: bool) -> Self {
        self.dry_run_default = dry_run;
        self
    }

    /// Sets the duplicate-detection minimum file size.
    pub fn with_duplicate_min_size(mut self, size: u64) -> Self {
        self.duplicate_min_size = size;
        self
    }

    /// Sets the severity floor for file and process findings.
    pub fn with_severity_floor(mut self, floor: f64) -> Self {
        self.severity_floor = floor;
        self
    }

    /// Replaces the heuristic rule set.
    pub fn with_rules(mut self, rules: Vec<HeuristicRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the signature set.
    pub fn with_signatures(mut self, signatures: Vec<Signature>) -> Self {
        self.signatures = signatures;
        self
    }

    /// Adds a traversal exclusion glob.
    pub fn with_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    /// Sets the safe cache directories for cleanup actions.
    pub fn with_cache_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.cache_dirs = dirs;
        self
    }

    /// Sets the per-item enumeration timeout.
    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// Called by the orchestrator before any scan runs; a failure here
    /// aborts the run entirely rather than producing partial behavior.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.report_dir.as_os_str().is_empty() {
            return Err(ScanError::configuration("report directory is required"));
        }
        if self.quarantine_dir.as_os_str().is_empty() {
            return Err(ScanError::configuration("quarantine directory is required"));
        }
        if self.hash_block_size == 0 {
            return Err(ScanError::configuration(
                "hash block size must be greater than zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.severity_floor) {
            return Err(ScanError::configuration(format!(
                "severity floor {} is outside [0, 1]",
                self.severity_floor
            )));
        }
        if self.targets.is_empty() {
            return Err(ScanError::configuration(
                "at least one scan target path is required",
            ));
        }
        for rule in &self.rules {
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(ScanError::configuration(format!(
                    "rule '{}' has weight {} outside [0, 1]",
                    rule.name, rule.weight
                )));
            }
        }
        if self.per_item_timeout.is_zero() {
            return Err(ScanError::configuration(
                "per-item timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serde helper storing `Duration` as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
