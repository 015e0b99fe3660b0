//! Scan of running processes.

use async_trait::async_trait;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};

use crate::core::context::RunContext;
use crate::core::error::{ScanError, ScanResult};
use crate::core::types::{Subject, TaskKind};
use crate::tasks::{assess_subject, ScanTask, TaskOutput};

/// Scans the running process table for suspicious entries.
///
/// Each process is snapshotted into a [`Subject::Process`] carrying its
/// pid, name, resolved executable path, and command line. Snapshots are
/// taken once per run; processes that exit afterwards simply produce
/// findings whose remediation later fails cleanly.
#[derive(Debug, Default)]
pub struct ProcessScanTask;

impl ProcessScanTask {
    /// Creates the task.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScanTask for ProcessScanTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Processes
    }

    async fn run(&self, ctx: &RunContext) -> ScanResult<TaskOutput> {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || scan_processes(&ctx))
            .await
            .map_err(|e| ScanError::internal(format!("process scan task panicked: {e}")))?
    }
}

fn scan_processes(ctx: &RunContext) -> ScanResult<TaskOutput> {
    let refresh =
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_exe(sysinfo::UpdateKind::Always));
    let sys = System::new_with_specifics(refresh);

    let mut output = TaskOutput::new();

    let mut subjects: Vec<Subject> = sys
        .processes()
        .iter()
        .map(|(pid, process)| {
            let cmdline = if process.cmd().is_empty() {
                None
            } else {
                Some(process.cmd().join(" "))
            };
            Subject::Process {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                exe: process.exe().map(|p| p.to_path_buf()),
                cmdline,
            }
        })
        .collect();

    // The process table iterates in hash order; sort for stable reports.
    subjects.sort_by_key(|s| match s {
        Subject::Process { pid, .. } => *pid,
        _ => u32::MAX,
    });

    for subject in subjects {
        if ctx.cancel.is_cancelled() {
            output.complete = false;
            break;
        }
        if let Some(finding) = assess_subject(ctx, &subject, TaskKind::Processes, None) {
            output.findings.push(finding);
        }
    }

    tracing::debug!(
        findings = output.findings.len(),
        complete = output.complete,
        "process scan finished"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::context::CancelToken;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn context() -> RunContext {
        let config = EngineConfig::new("/tmp/r", "/tmp/q", vec![PathBuf::from("/tmp")]);
        RunContext::new(Arc::new(config), CancelToken::new())
    }

    #[test]
    fn test_temp_named_process_is_flagged() {
        let ctx = context();
        let subject = Subject::Process {
            pid: 1234,
            name: "updater.tmp".into(),
            exe: Some(PathBuf::from("/tmp/updater.tmp")),
            cmdline: Some("/tmp/updater.tmp --silent".into()),
        };

        let finding = assess_subject(&ctx, &subject, TaskKind::Processes, None).expect("finding");
        assert_eq!(finding.task, TaskKind::Processes);
        assert!(finding.severity >= 0.6);
        assert!(finding.rule_hits.iter().any(|h| h.rule == "temp-process"));
    }

    #[test]
    fn test_benign_process_is_not_flagged() {
        let ctx = context();
        let subject = Subject::Process {
            pid: 1,
            name: "systemd".into(),
            exe: Some(PathBuf::from("/usr/lib/systemd/systemd")),
            cmdline: None,
        };
        assert!(assess_subject(&ctx, &subject, TaskKind::Processes, None).is_none());
    }

    #[tokio::test]
    async fn test_scan_runs_against_live_process_table() {
        // Enumeration itself must always succeed on a live host; whether
        // anything is flagged depends on what is running.
        let ctx = context();
        let output = ProcessScanTask::new().run(&ctx).await.unwrap();
        assert!(output.complete);
    }
}
