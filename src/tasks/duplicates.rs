//! Three-stage duplicate-file detection task.

use async_trait::async_trait;

use crate::core::context::RunContext;
use crate::core::error::{ScanError, ScanResult};
use crate::core::types::{Finding, Subject, TaskKind};
use crate::hashing::{find_duplicates, Digester};
use crate::tasks::{compile_exclusions, walk_targets, ScanTask, TaskOutput};

/// Detects groups of byte-identical files under the configured targets.
///
/// Candidate files come from the same traversal rules as the file scan;
/// the staged pipeline then narrows them by size, partial digest, and full
/// digest. Every confirmed group becomes a finding regardless of the
/// severity floor, since a duplicate group is factual rather than
/// suspicion-scored.
#[derive(Debug, Default)]
pub struct DuplicateScanTask;

impl DuplicateScanTask {
    /// Creates the task.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScanTask for DuplicateScanTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Duplicates
    }

    async fn run(&self, ctx: &RunContext) -> ScanResult<TaskOutput> {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || scan_duplicates(&ctx))
            .await
            .map_err(|e| ScanError::internal(format!("duplicate scan task panicked: {e}")))?
    }
}

fn scan_duplicates(ctx: &RunContext) -> ScanResult<TaskOutput> {
    let exclusions = compile_exclusions(&ctx.config.exclusions)?;
    let traversal = walk_targets(&ctx.config.targets, &exclusions, &ctx.cancel);

    let mut output = TaskOutput::new();
    output.warnings = traversal.warnings;
    output.complete = traversal.complete;

    if !output.complete {
        return Ok(output);
    }

    let digester = Digester::new(ctx.config.hash_block_size);
    let outcome = find_duplicates(&traversal.files, &digester, ctx.config.duplicate_min_size);
    output.warnings.extend(outcome.warnings);

    for group in outcome.groups {
        if ctx.cancel.is_cancelled() {
            output.complete = false;
            break;
        }

        let reclaimable = group.reclaimable_bytes();
        let subject = Subject::DuplicateGroup {
            digest: group.digest.as_str().to_string(),
            members: group.members.iter().map(|m| m.path.clone()).collect(),
            reclaimable_bytes: reclaimable,
        };

        let (score, hits) = ctx.heuristics.assess(&subject);
        output.findings.push(Finding::new(
            TaskKind::Duplicates,
            subject,
            score,
            format!(
                "{} identical copies, {} bytes reclaimable",
                group.member_count(),
                reclaimable
            ),
            hits,
        ));
    }

    tracing::debug!(
        findings = output.findings.len(),
        warnings = output.warnings.len(),
        complete = output.complete,
        "duplicate scan finished"
    );
    Ok(output)
}
