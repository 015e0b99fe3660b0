//! Known-bad signature database.
//!
//! Signatures identify objects by exact content digest or by filename
//! glob. A signature hit is authoritative: it pins the finding severity to
//! the maximum regardless of heuristic scoring.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::core::error::ScanError;

/// One known-bad entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Stable signature identifier.
    pub id: String,

    /// Human-readable description of what this signature detects.
    pub description: String,

    /// Exact hex digest of the flagged content, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Filename globs that identify the flagged object by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filename_patterns: Vec<String>,
}

impl Signature {
    /// The built-in signature set, used when configuration supplies none.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self {
                id: "eicar-test".into(),
                description: "EICAR antivirus test file".into(),
                digest: None,
                filename_patterns: vec!["eicar*.com".into(), "eicar*.txt".into()],
            },
            Self {
                id: "double-extension".into(),
                description: "document name hiding an executable extension".into(),
                digest: None,
                filename_patterns: vec![
                    "*.pdf.exe".into(),
                    "*.doc.exe".into(),
                    "*.jpg.exe".into(),
                    "*.txt.scr".into(),
                ],
            },
        ]
    }
}

/// A match of one signature against one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    /// Identifier of the matched signature.
    pub signature: String,

    /// Description carried over from the signature entry.
    pub description: String,
}

/// Compiled signature database.
///
/// Filename globs are compiled once at construction; lookups are cheap and
/// lock-free thereafter.
#[derive(Debug)]
pub struct SignatureDb {
    signatures: Vec<Signature>,
    globs: Vec<GlobSet>,
}

impl SignatureDb {
    /// Builds a database from the given signature entries.
    ///
    /// Invalid glob patterns are skipped with a warning rather than
    /// failing the whole database.
    pub fn with_signatures(signatures: Vec<Signature>) -> Self {
        let globs = signatures
            .iter()
            .map(|sig| {
                let mut builder = GlobSetBuilder::new();
                for pattern in &sig.filename_patterns {
                    match Glob::new(pattern) {
                        Ok(glob) => {
                            builder.add(glob);
                        }
                        Err(e) => {
                            tracing::warn!(
                                signature = %sig.id,
                                pattern = %pattern,
                                error = %e,
                                "skipping invalid signature pattern"
                            );
                        }
                    }
                }
                builder.build().unwrap_or_else(|_| GlobSet::empty())
            })
            .collect();
        Self { signatures, globs }
    }

    /// Builds a database, failing on any invalid glob pattern.
    pub fn try_with_signatures(signatures: Vec<Signature>) -> Result<Self, ScanError> {
        for sig in &signatures {
            for pattern in &sig.filename_patterns {
                Glob::new(pattern).map_err(|e| {
                    ScanError::configuration(format!(
                        "signature '{}' has invalid pattern '{}': {e}",
                        sig.id, pattern
                    ))
                })?;
            }
        }
        Ok(Self::with_signatures(signatures))
    }

    /// Returns the number of loaded signatures.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Returns `true` if no signatures are loaded.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Returns `true` if any signature carries a content digest.
    ///
    /// Callers use this to skip hashing when no digest could ever match.
    pub fn has_digest_entries(&self) -> bool {
        self.signatures.iter().any(|sig| sig.digest.is_some())
    }

    /// Finds all signatures matching the given filename and optional
    /// content digest.
    pub fn find_matches(&self, filename: &str, digest: Option<&str>) -> Vec<SignatureMatch> {
        let mut matches = Vec::new();
        for (sig, globs) in self.signatures.iter().zip(&self.globs) {
            let digest_hit = match (&sig.digest, digest) {
                (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                _ => false,
            };
            let name_hit = globs.is_match(filename);
            if digest_hit || name_hit {
                matches.push(SignatureMatch {
                    signature: sig.id.clone(),
                    description: sig.description.clone(),
                });
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> SignatureDb {
        SignatureDb::with_signatures(vec![
            Signature {
                id: "by-name".into(),
                description: "named dropper".into(),
                digest: None,
                filename_patterns: vec!["payload-*.bin".into()],
            },
            Signature {
                id: "by-digest".into(),
                description: "known bad content".into(),
                digest: Some("deadbeef".into()),
                filename_patterns: vec![],
            },
        ])
    }

    #[test]
    fn test_filename_pattern_matches() {
        let matches = db().find_matches("payload-2.bin", None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].signature, "by-name");
    }

    #[test]
    fn test_digest_match_is_case_insensitive() {
        let matches = db().find_matches("innocuous.txt", Some("DEADBEEF"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].signature, "by-digest");
    }

    #[test]
    fn test_no_match() {
        assert!(db().find_matches("notes.txt", Some("cafebabe")).is_empty());
    }

    #[test]
    fn test_digest_entry_never_matches_on_name_alone() {
        assert!(db().find_matches("by-digest", None).is_empty());
    }

    #[test]
    fn test_invalid_pattern_rejected_by_strict_constructor() {
        let result = SignatureDb::try_with_signatures(vec![Signature {
            id: "broken".into(),
            description: "bad glob".into(),
            digest: None,
            filename_patterns: vec!["a[".into()],
        }]);
        assert!(result.is_err());
    }
}
