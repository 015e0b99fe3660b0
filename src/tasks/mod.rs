//! Scan tasks.
//!
//! Each scan task is an independent producer of findings behind the
//! [`ScanTask`] trait. Tasks share nothing but the injected [`RunContext`];
//! a failing task never affects its siblings. New task kinds are added by
//! implementing the trait and registering the task with the orchestrator.

pub mod duplicates;
pub mod files;
pub mod gpu;
pub mod processes;

pub use duplicates::DuplicateScanTask;
pub use files::FileScanTask;
pub use gpu::GpuScanTask;
pub use processes::ProcessScanTask;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::core::context::{CancelToken, RunContext};
use crate::core::error::{ScanError, ScanResult};
use crate::core::types::{Finding, TaskKind};

/// The findings and non-fatal diagnostics produced by one task run.
#[derive(Debug, Default)]
pub struct TaskOutput {
    /// Findings in discovery order.
    pub findings: Vec<Finding>,

    /// Non-fatal warnings: unreadable entries, skipped targets, partial
    /// enumeration sources.
    pub warnings: Vec<String>,

    /// `false` when the task stopped early due to cancellation.
    pub complete: bool,
}

impl TaskOutput {
    /// Creates an empty, complete output.
    pub fn new() -> Self {
        Self {
            findings: Vec::new(),
            warnings: Vec::new(),
            complete: true,
        }
    }
}

/// A single scan task.
///
/// Implementations must be stateless between runs; everything a run needs
/// arrives through the context. Errors returned here are annotated on the
/// task's report by the orchestrator without aborting sibling tasks.
#[async_trait]
pub trait ScanTask: Send + Sync {
    /// The kind of this task, used for report naming and aggregation.
    fn kind(&self) -> TaskKind;

    /// Runs the task to completion or cancellation.
    async fn run(&self, ctx: &RunContext) -> ScanResult<TaskOutput>;
}

/// Assesses one subject against signatures (by display name, plus the
/// content digest when the caller has one) and the heuristic engine.
///
/// A signature hit pins the severity to 1.0; otherwise the finding is kept
/// only when the heuristic score reaches the configured floor.
pub(crate) fn assess_subject(
    ctx: &RunContext,
    subject: &crate::core::types::Subject,
    kind: TaskKind,
    digest: Option<&str>,
) -> Option<Finding> {
    let name = subject.display_name();

    let sig_hits = ctx.signatures.find_matches(&name, digest);
    if !sig_hits.is_empty() {
        let reason = sig_hits
            .iter()
            .map(|m| m.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        tracing::info!(
            target: "scansweep::audit",
            subject = %name,
            signatures = sig_hits.len(),
            "signature match"
        );
        return Some(Finding::new(
            kind,
            subject.clone(),
            1.0,
            format!("signature match: {reason}"),
            vec![],
        ));
    }

    let (score, hits) = ctx.heuristics.assess(subject);
    if score >= ctx.config.severity_floor && !hits.is_empty() {
        let reason = hits
            .iter()
            .map(|h| h.rule.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Some(Finding::new(
            kind,
            subject.clone(),
            score,
            format!("heuristic rules matched: {reason}"),
            hits,
        ));
    }
    None
}

/// Compiles the configured exclusion globs.
pub(crate) fn compile_exclusions(patterns: &[String]) -> ScanResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            ScanError::configuration(format!("invalid exclusion pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ScanError::configuration(format!("failed to compile exclusions: {e}")))
}

/// Result of walking the configured target trees.
#[derive(Debug, Default)]
pub(crate) struct Traversal {
    /// Regular files found, in walk order.
    pub files: Vec<PathBuf>,
    /// Warnings for unreadable entries and missing targets.
    pub warnings: Vec<String>,
    /// `false` when the walk stopped early due to cancellation.
    pub complete: bool,
}

/// Walks every configured target, collecting regular files.
///
/// Excluded paths are pruned at directory level where possible; unreadable
/// entries and missing targets degrade to warnings. The cancellation token
/// is checked between entries.
pub(crate) fn walk_targets(
    targets: &[PathBuf],
    exclusions: &GlobSet,
    cancel: &CancelToken,
) -> Traversal {
    let mut traversal = Traversal {
        complete: true,
        ..Default::default()
    };

    'targets: for target in targets {
        if !target.exists() {
            traversal
                .warnings
                .push(format!("target {} does not exist", target.display()));
            continue;
        }

        let walker = WalkDir::new(target)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !exclusions.is_match(entry.path()));

        for entry in walker {
            if cancel.is_cancelled() {
                traversal.complete = false;
                break 'targets;
            }
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    traversal.files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => {
                    traversal.warnings.push(format!("walk error: {e}"));
                }
            }
        }
    }

    traversal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_collects_regular_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let exclusions = compile_exclusions(&[]).unwrap();
        let traversal = walk_targets(
            &[dir.path().to_path_buf()],
            &exclusions,
            &CancelToken::new(),
        );
        assert_eq!(traversal.files.len(), 2);
        assert!(traversal.complete);
    }

    #[test]
    fn test_exclusions_prune_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), b"k").unwrap();
        fs::create_dir(dir.path().join("skipme")).unwrap();
        fs::write(dir.path().join("skipme/hidden.txt"), b"h").unwrap();

        let exclusions = compile_exclusions(&["**/skipme".into()]).unwrap();
        let traversal = walk_targets(
            &[dir.path().to_path_buf()],
            &exclusions,
            &CancelToken::new(),
        );
        assert_eq!(traversal.files.len(), 1);
        assert!(traversal.files[0].ends_with("keep.txt"));
    }

    #[test]
    fn test_missing_target_is_a_warning() {
        let exclusions = compile_exclusions(&[]).unwrap();
        let traversal = walk_targets(
            &[PathBuf::from("/no/such/place")],
            &exclusions,
            &CancelToken::new(),
        );
        assert!(traversal.files.is_empty());
        assert_eq!(traversal.warnings.len(), 1);
        assert!(traversal.complete);
    }

    #[test]
    fn test_cancelled_walk_is_incomplete() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        let exclusions = compile_exclusions(&[]).unwrap();
        let traversal = walk_targets(&[dir.path().to_path_buf()], &exclusions, &cancel);
        assert!(!traversal.complete);
    }

    #[test]
    fn test_assess_subject_matches_digest_signatures() {
        use crate::core::config::EngineConfig;
        use crate::core::context::RunContext;
        use crate::core::types::Subject;
        use crate::heuristics::Signature;
        use std::sync::Arc;

        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![]).with_signatures(vec![
            Signature {
                id: "payload".into(),
                description: "known payload".into(),
                digest: Some("abc123".into()),
                filename_patterns: vec![],
            },
        ]);
        let ctx = RunContext::new(Arc::new(config), CancelToken::new());

        let subject = Subject::File {
            path: PathBuf::from("/data/innocent.dat"),
            size: 1,
        };

        let finding =
            assess_subject(&ctx, &subject, TaskKind::Files, Some("abc123")).expect("finding");
        assert_eq!(finding.severity, 1.0);
        assert!(finding.reason.starts_with("signature match"));

        // Without the digest the same subject matches nothing.
        assert!(assess_subject(&ctx, &subject, TaskKind::Files, None).is_none());
    }

    #[test]
    fn test_invalid_exclusion_is_configuration_error() {
        assert!(matches!(
            compile_exclusions(&["bad[".into()]),
            Err(ScanError::Configuration { .. })
        ));
    }
}
