//! Heuristic and signature scan over configured file trees.

use async_trait::async_trait;

use crate::core::context::RunContext;
use crate::core::error::{ScanError, ScanResult};
use crate::core::types::{Subject, TaskKind};
use crate::hashing::{DigestStage, Digester};
use crate::tasks::{assess_subject, compile_exclusions, walk_targets, ScanTask, TaskOutput};

/// Scans every configured target tree for suspicious files.
///
/// Each regular file is snapshotted into a [`Subject::File`], checked
/// against the signature database, and scored by the heuristic engine.
/// A signature hit pins the severity to 1.0; otherwise the finding is
/// kept only when the heuristic score reaches the configured floor.
#[derive(Debug, Default)]
pub struct FileScanTask;

impl FileScanTask {
    /// Creates the task.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScanTask for FileScanTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Files
    }

    async fn run(&self, ctx: &RunContext) -> ScanResult<TaskOutput> {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || scan_files(&ctx))
            .await
            .map_err(|e| ScanError::internal(format!("file scan task panicked: {e}")))?
    }
}

fn scan_files(ctx: &RunContext) -> ScanResult<TaskOutput> {
    let exclusions = compile_exclusions(&ctx.config.exclusions)?;
    let traversal = walk_targets(&ctx.config.targets, &exclusions, &ctx.cancel);

    let mut output = TaskOutput::new();
    output.warnings = traversal.warnings;
    output.complete = traversal.complete;

    let digester = Digester::new(ctx.config.hash_block_size);
    let hash_for_signatures = ctx.signatures.has_digest_entries();

    for path in traversal.files {
        if ctx.cancel.is_cancelled() {
            output.complete = false;
            break;
        }

        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                output
                    .warnings
                    .push(format!("unable to stat {}: {e}", path.display()));
                continue;
            }
        };

        let subject = Subject::File {
            path: path.clone(),
            size,
        };

        let digest = if hash_for_signatures {
            match digester.digest(&path, DigestStage::Full) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    output
                        .warnings
                        .push(format!("unable to hash {}: {e}", path.display()));
                    None
                }
            }
        } else {
            None
        };

        if let Some(finding) = assess_subject(
            ctx,
            &subject,
            TaskKind::Files,
            digest.as_ref().map(|d| d.as_str()),
        ) {
            output.findings.push(finding);
        }
    }

    tracing::debug!(
        findings = output.findings.len(),
        warnings = output.warnings.len(),
        complete = output.complete,
        "file scan finished"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::context::CancelToken;
    use crate::heuristics::Signature;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context_for(config: EngineConfig) -> RunContext {
        RunContext::new(Arc::new(config), CancelToken::new())
    }

    #[tokio::test]
    async fn test_flags_suspicious_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dropper.scr"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![dir.path().to_path_buf()]);
        let ctx = context_for(config);

        let output = FileScanTask::new().run(&ctx).await.unwrap();
        assert_eq!(output.findings.len(), 1);
        assert!(output.findings[0].subject.display_name().contains("dropper"));
        assert!(output.complete);
    }

    #[tokio::test]
    async fn test_signature_hit_pins_severity() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.pdf.exe"), b"x").unwrap();

        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![dir.path().to_path_buf()]);
        let ctx = context_for(config);

        let output = FileScanTask::new().run(&ctx).await.unwrap();
        let finding = output
            .findings
            .iter()
            .find(|f| f.subject.display_name() == "report.pdf.exe")
            .expect("signature finding");
        assert_eq!(finding.severity, 1.0);
        assert!(finding.reason.starts_with("signature match"));
    }

    #[tokio::test]
    async fn test_digest_signature_matches_content() {
        let dir = TempDir::new().unwrap();
        let content = b"known bad payload";
        fs::write(dir.path().join("innocent.dat"), content).unwrap();

        let digest = Digester::new(64).digest_bytes(content);
        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![dir.path().to_path_buf()])
            .with_signatures(vec![Signature {
                id: "payload".into(),
                description: "known payload".into(),
                digest: Some(digest.as_str().to_string()),
                filename_patterns: vec![],
            }]);
        let ctx = context_for(config);

        let output = FileScanTask::new().run(&ctx).await.unwrap();
        assert_eq!(output.findings.len(), 1);
        assert_eq!(output.findings[0].severity, 1.0);
    }

    #[tokio::test]
    async fn test_findings_below_floor_are_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("installer.scr"), b"x").unwrap();

        // Floor above the suspicious-extension weight.
        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![dir.path().to_path_buf()])
            .with_severity_floor(0.9);
        let ctx = context_for(config);

        let output = FileScanTask::new().run(&ctx).await.unwrap();
        assert!(output.findings.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_scan_is_incomplete() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.scr"), b"x").unwrap();

        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![dir.path().to_path_buf()]);
        let ctx = RunContext::new(Arc::new(config), CancelToken::new());
        ctx.cancel.cancel();

        let output = FileScanTask::new().run(&ctx).await.unwrap();
        assert!(!output.complete);
        assert!(output.findings.is_empty());
    }
}
