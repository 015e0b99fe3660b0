//! Three-stage duplicate-detection pipeline.
//!
//! Candidates narrow through three stages, each feeding the next:
//!
//! 1. group by exact byte size — unique sizes are discarded immediately;
//! 2. within a size bucket, sub-bucket by a partial digest of the first
//!    hashing block;
//! 3. within a partial-hash bucket of two or more members, confirm true
//!    equality with a full-content digest.
//!
//! Only files surviving stages 1 and 2 incur full-body hashing cost. Files
//! that vanish, change size, or become unreadable between stages are
//! dropped from candidacy and reported as warnings, never treated as
//! matches.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::hashing::{ContentDigest, DigestStage, Digester};

/// One member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Path of the member file.
    pub path: PathBuf,
    /// Size in bytes, identical across the group.
    pub size: u64,
}

/// A set of files confirmed to share identical full content.
///
/// A group is only constructed with two or more members whose full
/// digests are byte-identical; partial-hash collisions never form groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The shared full-content digest.
    pub digest: ContentDigest,
    /// Members in discovery order.
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Returns the number of member files.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Bytes reclaimable by deleting all but one member.
    pub fn reclaimable_bytes(&self) -> u64 {
        match self.members.first() {
            Some(first) => first.size.saturating_mul(self.members.len() as u64 - 1),
            None => 0,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Confirmed duplicate groups, in first-discovery order.
    pub groups: Vec<DuplicateGroup>,
    /// Non-fatal warnings for files dropped from candidacy.
    pub warnings: Vec<String>,
}

/// Runs the three-stage pipeline over candidate paths.
///
/// `min_size` filters out files below the configured duplicate-detection
/// threshold before stage 1.
pub fn find_duplicates(
    paths: &[PathBuf],
    digester: &Digester,
    min_size: u64,
) -> PipelineOutcome {
    let mut outcome = PipelineOutcome::default();

    // Stage 1: size buckets. Unreadable files drop out here.
    let mut size_buckets: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    let mut order: Vec<u64> = Vec::new();
    for path in paths {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                let size = meta.len();
                if size < min_size {
                    continue;
                }
                let bucket = size_buckets.entry(size).or_insert_with(|| {
                    order.push(size);
                    Vec::new()
                });
                bucket.push(path.clone());
            }
            Ok(_) => {}
            Err(e) => {
                outcome
                    .warnings
                    .push(format!("unable to stat {}: {e}", path.display()));
            }
        }
    }

    for size in order {
        let candidates = &size_buckets[&size];
        if candidates.len() < 2 {
            continue;
        }
        tracing::debug!(size, count = candidates.len(), "analysing size bucket");

        // Stage 2: partial-digest sub-buckets.
        let mut partial_buckets: HashMap<ContentDigest, Vec<PathBuf>> = HashMap::new();
        let mut partial_order: Vec<ContentDigest> = Vec::new();
        for path in candidates {
            match digester.digest(path, DigestStage::Partial) {
                Ok(digest) => {
                    let bucket = partial_buckets.entry(digest.clone()).or_insert_with(|| {
                        partial_order.push(digest);
                        Vec::new()
                    });
                    bucket.push(path.clone());
                }
                Err(e) => {
                    outcome
                        .warnings
                        .push(format!("unable to hash {}: {e}", path.display()));
                }
            }
        }

        // Stage 3: full-digest confirmation within surviving sub-buckets.
        for partial in partial_order {
            let bucket = &partial_buckets[&partial];
            if bucket.len() < 2 {
                continue;
            }

            let mut full_groups: HashMap<ContentDigest, Vec<GroupMember>> = HashMap::new();
            let mut full_order: Vec<ContentDigest> = Vec::new();
            for path in bucket {
                // The file may have changed since stage 1; a size mismatch
                // is an integrity error, not a match.
                match std::fs::metadata(path) {
                    Ok(meta) if meta.len() == size => {}
                    Ok(meta) => {
                        outcome.warnings.push(format!(
                            "{} changed size during scan ({} -> {}), dropped",
                            path.display(),
                            size,
                            meta.len()
                        ));
                        continue;
                    }
                    Err(e) => {
                        outcome
                            .warnings
                            .push(format!("unable to stat {}: {e}", path.display()));
                        continue;
                    }
                }

                match digester.digest(path, DigestStage::Full) {
                    Ok(digest) => {
                        let group = full_groups.entry(digest.clone()).or_insert_with(|| {
                            full_order.push(digest);
                            Vec::new()
                        });
                        group.push(GroupMember {
                            path: path.clone(),
                            size,
                        });
                    }
                    Err(e) => {
                        outcome
                            .warnings
                            .push(format!("unable to hash {}: {e}", path.display()));
                    }
                }
            }

            for digest in full_order {
                let members = full_groups.remove(&digest).unwrap_or_default();
                if members.len() >= 2 {
                    outcome.groups.push(DuplicateGroup { digest, members });
                }
            }
        }
    }

    tracing::debug!(
        groups = outcome.groups.len(),
        warnings = outcome.warnings.len(),
        "duplicate pipeline finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_different_sizes_never_grouped() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_file(&dir, "a", b"0123456789"),
            write_file(&dir, "b", b"012345678"),
            write_file(&dir, "c", b"01234567"),
        ];

        let outcome = find_duplicates(&paths, &Digester::new(4), 1);
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn test_identical_twins_form_one_group() {
        // Sizes {10, 10, 12}; the two 10-byte files are byte-identical.
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_file(&dir, "a", b"0123456789"),
            write_file(&dir, "b", b"0123456789"),
            write_file(&dir, "c", b"0123456789xy"),
        ];

        let outcome = find_duplicates(&paths, &Digester::new(4), 1);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].member_count(), 2);
        assert_eq!(outcome.groups[0].reclaimable_bytes(), 10);
    }

    #[test]
    fn test_partial_hash_collision_not_grouped() {
        // Same size, same first block, different tails.
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_file(&dir, "a", b"head-tail-one"),
            write_file(&dir, "b", b"head-tail-two"),
        ];

        let outcome = find_duplicates(&paths, &Digester::new(4), 1);
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn test_min_size_filters_small_files() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_file(&dir, "a", b"tiny"),
            write_file(&dir, "b", b"tiny"),
        ];

        let outcome = find_duplicates(&paths, &Digester::new(4), 100);
        assert!(outcome.groups.is_empty());
    }

    #[test]
    fn test_vanished_file_is_warning_not_match() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a", b"0123456789");
        let b = write_file(&dir, "b", b"0123456789");
        let ghost = dir.path().join("ghost");

        let paths = vec![a, b, ghost];
        let outcome = find_duplicates(&paths, &Digester::new(4), 1);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].member_count(), 2);
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn test_unique_sizes_skip_hashing() {
        // A bucket of one is discarded before any digest work, so a file
        // that exists but cannot be opened produces no hash warning when
        // its size is unique.
        let dir = TempDir::new().unwrap();
        let paths = vec![write_file(&dir, "only", b"unique-size-content")];

        let outcome = find_duplicates(&paths, &Digester::new(4), 1);
        assert!(outcome.groups.is_empty());
        assert!(outcome.warnings.is_empty());
    }
}
