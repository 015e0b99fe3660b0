//! Staged content hashing.
//!
//! This module provides [`Digester`] for computing BLAKE3 content digests
//! in bounded-size blocks, and the three-stage duplicate-detection
//! pipeline in [`pipeline`]. BLAKE3 is used for all digests due to its
//! speed; files are never loaded into memory whole.

pub mod pipeline;

pub use pipeline::{find_duplicates, DuplicateGroup, GroupMember};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Which portion of a file a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestStage {
    /// Only the first hashing block of the file.
    ///
    /// Used to cheaply sub-bucket same-size candidates before paying for
    /// a full-content digest.
    Partial,
    /// The entire file content.
    Full,
}

/// A hex-encoded BLAKE3 content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Returns the digest as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes content digests in bounded-size blocks.
///
/// The block size comes from configuration; a partial digest reads exactly
/// one block, a full digest streams the whole file one block at a time.
#[derive(Debug, Clone)]
pub struct Digester {
    block_size: usize,
}

impl Digester {
    /// Creates a digester with the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Returns the configured block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Computes the digest of `path` for the given stage.
    pub fn digest(&self, path: &Path, stage: DigestStage) -> std::io::Result<ContentDigest> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.block_size];

        match stage {
            DigestStage::Partial => {
                let read = read_block(&mut reader, &mut buffer)?;
                hasher.update(&buffer[..read]);
            }
            DigestStage::Full => loop {
                let read = read_block(&mut reader, &mut buffer)?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
            },
        }

        Ok(ContentDigest(hasher.finalize().to_hex().to_string()))
    }

    /// Computes the full digest of an in-memory buffer.
    ///
    /// Used for signature matching on small inputs and in tests.
    pub fn digest_bytes(&self, data: &[u8]) -> ContentDigest {
        ContentDigest(blake3::hash(data).to_hex().to_string())
    }
}

/// Fills `buffer` as far as possible, tolerating short reads.
fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_full_digest_deterministic() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a", b"hello world");
        let b = write_file(&dir, "b", b"hello world");

        let digester = Digester::new(4);
        let da = digester.digest(&a, DigestStage::Full).unwrap();
        let db = digester.digest(&b, DigestStage::Full).unwrap();
        assert_eq!(da, db);
    }

    #[test]
    fn test_partial_digest_covers_first_block_only() {
        let dir = TempDir::new().unwrap();
        // Identical first 4 bytes, different tails.
        let a = write_file(&dir, "a", b"samehead-one");
        let b = write_file(&dir, "b", b"samehead-two");

        let digester = Digester::new(8);
        let pa = digester.digest(&a, DigestStage::Partial).unwrap();
        let pb = digester.digest(&b, DigestStage::Partial).unwrap();
        assert_eq!(pa, pb);

        let fa = digester.digest(&a, DigestStage::Full).unwrap();
        let fb = digester.digest(&b, DigestStage::Full).unwrap();
        assert_ne!(fa, fb);
    }

    #[test]
    fn test_block_size_does_not_change_full_digest() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a", b"some longer content spanning blocks");

        let small = Digester::new(3).digest(&path, DigestStage::Full).unwrap();
        let large = Digester::new(4096).digest(&path, DigestStage::Full).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let digester = Digester::new(64);
        let result = digester.digest(Path::new("/nonexistent/file"), DigestStage::Full);
        assert!(result.is_err());
    }
}
