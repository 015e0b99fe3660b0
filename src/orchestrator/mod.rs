//! Scan orchestration.
//!
//! The orchestrator owns the set of registered scan tasks, runs them
//! concurrently over a shared [`RunContext`], and aggregates their reports
//! into one [`MasterReport`] in registration order. Task failures are
//! isolated: a failing task yields an empty, error-annotated report while
//! its siblings run to completion.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditLog};
use crate::core::config::EngineConfig;
use crate::core::context::{CancelToken, RunContext};
use crate::core::error::ScanResult;
use crate::core::types::TaskKind;
use crate::report::{MasterReport, ReportStore, ScanReport};
use crate::tasks::{
    DuplicateScanTask, FileScanTask, GpuScanTask, ProcessScanTask, ScanTask,
};

/// Runs registered scan tasks and aggregates their reports.
pub struct ScanOrchestrator {
    config: Arc<EngineConfig>,
    tasks: Vec<Arc<dyn ScanTask>>,
}

impl ScanOrchestrator {
    /// Creates an orchestrator with no tasks registered.
    ///
    /// Configuration is validated here, before anything can run.
    pub fn new(config: Arc<EngineConfig>) -> ScanResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tasks: Vec::new(),
        })
    }

    /// Creates an orchestrator with the four standard tasks registered.
    pub fn with_default_tasks(config: Arc<EngineConfig>) -> ScanResult<Self> {
        let mut orchestrator = Self::new(config)?;
        orchestrator.register(Arc::new(FileScanTask::new()));
        orchestrator.register(Arc::new(ProcessScanTask::new()));
        orchestrator.register(Arc::new(GpuScanTask::new()));
        orchestrator.register(Arc::new(DuplicateScanTask::new()));
        Ok(orchestrator)
    }

    /// Registers a task. Reports aggregate in registration order.
    pub fn register(&mut self, task: Arc<dyn ScanTask>) {
        self.tasks.push(task);
    }

    /// Returns the number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Runs every registered task concurrently, persists one report per
    /// task plus the master report, and returns the master report.
    ///
    /// Aggregation order is registration order regardless of task
    /// completion order. Report persistence failures degrade to warnings;
    /// the in-memory master report is always complete.
    pub async fn run(&self, cancel: CancelToken) -> ScanResult<MasterReport> {
        let ctx = RunContext::new(self.config.clone(), cancel);
        let run_id = ctx.run_id.clone();
        let run_started = Utc::now();

        let store = match ReportStore::new(&self.config.report_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "report store unavailable, reports will not be persisted");
                None
            }
        };

        let audit = AuditLog::new(&self.config.quarantine_dir);
        if std::fs::create_dir_all(&self.config.quarantine_dir).is_ok() {
            audit.append(
                Some(run_id.as_str()),
                AuditEvent::RunStarted {
                    tasks: self.tasks.iter().map(|t| t.kind().to_string()).collect(),
                },
            );
        }

        tracing::info!(
            target: "scansweep::audit",
            run_id = %run_id,
            tasks = self.tasks.len(),
            "scan run started"
        );

        let results = join_all(self.tasks.iter().map(|task| {
            let ctx = ctx.clone();
            let kind = task.kind();
            let task = task.clone();
            async move {
                let started_at = Utc::now();
                let result = task.run(&ctx).await;
                (kind, started_at, result)
            }
        }))
        .await;

        let mut reports = Vec::with_capacity(results.len());
        for (kind, started_at, result) in results {
            let scope = self.scope_for(kind);
            let report = match result {
                Ok(output) => ScanReport::from_output(&run_id, kind, scope, started_at, output),
                Err(e) => {
                    tracing::warn!(task = %kind, error = %e, "scan task failed");
                    ScanReport::failed(&run_id, kind, scope, started_at, e.to_string())
                }
            };
            if let Some(store) = &store {
                if let Err(e) = store.persist(&report) {
                    tracing::warn!(task = %kind, error = %e, "failed to persist report");
                }
            }
            reports.push(report);
        }

        let master = MasterReport::new(&run_id, run_started, reports);
        if let Some(store) = &store {
            if let Err(e) = store.persist_master(&master) {
                tracing::warn!(error = %e, "failed to persist master report");
            }
        }

        audit.append(
            Some(run_id.as_str()),
            AuditEvent::RunFinished {
                findings: master.total_findings(),
                complete: master.complete(),
            },
        );
        tracing::info!(
            target: "scansweep::audit",
            run_id = %run_id,
            findings = master.total_findings(),
            complete = master.complete(),
            "scan run finished"
        );
        Ok(master)
    }

    /// Describes what a task of this kind looks at, for report headers.
    fn scope_for(&self, kind: TaskKind) -> String {
        match kind {
            TaskKind::Files | TaskKind::Duplicates => self
                .config
                .targets
                .iter()
                .map(|t| t.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            TaskKind::Processes => "running processes".to_string(),
            TaskKind::Gpu => "gpu compute processes".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ScanError;
    use crate::core::types::{Finding, Subject};
    use crate::tasks::TaskOutput;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct StubTask {
        kind: TaskKind,
        outcome: Result<usize, String>,
    }

    #[async_trait]
    impl ScanTask for StubTask {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        async fn run(&self, _ctx: &RunContext) -> ScanResult<TaskOutput> {
            match &self.outcome {
                Ok(count) => {
                    let mut output = TaskOutput::new();
                    for i in 0..*count {
                        output.findings.push(Finding::new(
                            self.kind,
                            Subject::File {
                                path: PathBuf::from(format!("/x/{i}")),
                                size: 1,
                            },
                            0.5,
                            "stub",
                            vec![],
                        ));
                    }
                    Ok(output)
                }
                Err(message) => Err(ScanError::enumeration_failed("stub", message.clone())),
            }
        }
    }

    fn config(dir: &TempDir) -> Arc<EngineConfig> {
        Arc::new(EngineConfig::new(
            dir.path().join("reports"),
            dir.path().join("quarantine"),
            vec![dir.path().to_path_buf()],
        ))
    }

    #[tokio::test]
    async fn test_failing_task_does_not_abort_siblings() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = ScanOrchestrator::new(config(&dir)).unwrap();
        orchestrator.register(Arc::new(StubTask {
            kind: TaskKind::Files,
            outcome: Ok(2),
        }));
        orchestrator.register(Arc::new(StubTask {
            kind: TaskKind::Gpu,
            outcome: Err("driver exploded".into()),
        }));
        orchestrator.register(Arc::new(StubTask {
            kind: TaskKind::Duplicates,
            outcome: Ok(1),
        }));

        let master = orchestrator.run(CancelToken::new()).await.unwrap();
        assert_eq!(master.reports.len(), 3);

        assert_eq!(master.reports[0].findings.len(), 2);
        assert!(master.reports[1].findings.is_empty());
        assert!(master.reports[1]
            .error
            .as_deref()
            .unwrap()
            .contains("driver exploded"));
        assert_eq!(master.reports[2].findings.len(), 1);
        assert!(!master.complete());
        assert_eq!(master.errors.len(), 1);
        assert_eq!(master.total_findings(), 3);
    }

    #[tokio::test]
    async fn test_reports_come_back_in_registration_order() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = ScanOrchestrator::new(config(&dir)).unwrap();
        for kind in [TaskKind::Duplicates, TaskKind::Files, TaskKind::Processes] {
            orchestrator.register(Arc::new(StubTask {
                kind,
                outcome: Ok(0),
            }));
        }

        let master = orchestrator.run(CancelToken::new()).await.unwrap();
        let kinds: Vec<_> = master.reports.iter().map(|r| r.task).collect();
        assert_eq!(
            kinds,
            vec![TaskKind::Duplicates, TaskKind::Files, TaskKind::Processes]
        );
    }

    #[tokio::test]
    async fn test_task_and_master_reports_are_persisted() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut orchestrator = ScanOrchestrator::new(config.clone()).unwrap();
        orchestrator.register(Arc::new(StubTask {
            kind: TaskKind::Files,
            outcome: Ok(1),
        }));

        let master = orchestrator.run(CancelToken::new()).await.unwrap();

        let store = ReportStore::new(&config.report_dir).unwrap();
        let run_id = crate::core::types::RunId::from_string(master.run_id.clone());
        let persisted = store.load(&run_id, TaskKind::Files).unwrap();
        assert_eq!(persisted.findings.len(), 1);

        let persisted_master = store.load_master(&run_id).unwrap();
        assert_eq!(persisted_master.total_findings(), 1);
    }

    #[test]
    fn test_invalid_configuration_is_fatal() {
        let dir = TempDir::new().unwrap();
        let bad = EngineConfig::new(
            dir.path().join("reports"),
            dir.path().join("quarantine"),
            vec![],
        );
        assert!(matches!(
            ScanOrchestrator::new(Arc::new(bad)),
            Err(ScanError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_tasks_are_registered() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ScanOrchestrator::with_default_tasks(config(&dir)).unwrap();
        assert_eq!(orchestrator.task_count(), 4);
    }
}
