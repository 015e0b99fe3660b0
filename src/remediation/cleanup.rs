//! Cache cleanup.
//!
//! Cleanup only ever operates on directories the configuration explicitly
//! classifies as safe cache locations; any other directory is refused
//! before a single entry is touched. The directory itself always survives,
//! only its contents are removed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::audit::AuditEvent;
use crate::core::error::{RemediationError, RemediationResult};
use crate::remediation::RemediationEngine;

/// Result of cleaning one cache directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOutcome {
    /// The cleaned directory.
    pub dir: PathBuf,

    /// Files removed, or that would be removed in dry-run.
    pub entries_removed: usize,

    /// Bytes reclaimed, or that would be reclaimed in dry-run.
    pub bytes_reclaimed: u64,

    /// Whether the cleanup was only simulated.
    pub dry_run: bool,

    /// Entries that could not be inspected or removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RemediationEngine {
    /// Cleans one configured cache directory.
    ///
    /// Returns [`RemediationError::UnsafeCacheDir`] when `dir` is not
    /// listed in the configuration's cache directories.
    pub fn clean_cache(&self, dir: &Path, dry_run: bool) -> RemediationResult<CleanupOutcome> {
        if !self.is_configured_cache_dir(dir) {
            return Err(RemediationError::UnsafeCacheDir {
                path: dir.display().to_string(),
            });
        }

        let mut outcome = CleanupOutcome {
            dir: dir.to_path_buf(),
            entries_removed: 0,
            bytes_reclaimed: 0,
            dry_run,
            warnings: Vec::new(),
        };

        if !dir.exists() {
            return Ok(outcome);
        }

        // Files first, deepest directories afterwards; the root survives.
        for entry in WalkDir::new(dir).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    outcome.warnings.push(format!("walk error: {e}"));
                    continue;
                }
            };
            if entry.path() == dir {
                continue;
            }

            if entry.file_type().is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if dry_run {
                    outcome.entries_removed += 1;
                    outcome.bytes_reclaimed += size;
                } else {
                    match fs::remove_file(entry.path()) {
                        Ok(()) => {
                            outcome.entries_removed += 1;
                            outcome.bytes_reclaimed += size;
                        }
                        Err(e) => outcome.warnings.push(format!(
                            "unable to remove {}: {e}",
                            entry.path().display()
                        )),
                    }
                }
            } else if entry.file_type().is_dir() && !dry_run {
                // Empty by now unless something inside failed to delete.
                if let Err(e) = fs::remove_dir(entry.path()) {
                    outcome.warnings.push(format!(
                        "unable to remove {}: {e}",
                        entry.path().display()
                    ));
                }
            }
        }

        self.audit().append(
            None,
            AuditEvent::CacheCleanup {
                dir: dir.display().to_string(),
                entries_removed: outcome.entries_removed,
                bytes_reclaimed: outcome.bytes_reclaimed,
                dry_run,
            },
        );
        tracing::info!(
            target: "scansweep::audit",
            dir = %dir.display(),
            entries = outcome.entries_removed,
            bytes = outcome.bytes_reclaimed,
            dry_run,
            "cache cleanup"
        );
        Ok(outcome)
    }

    fn is_configured_cache_dir(&self, dir: &Path) -> bool {
        self.config().cache_dirs.iter().any(|configured| {
            if configured == dir {
                return true;
            }
            match (configured.canonicalize(), dir.canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        })
    }
}
