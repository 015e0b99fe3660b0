//! Scan reports.
//!
//! Every task run produces exactly one [`ScanReport`], even when the task
//! fails or is cancelled; one [`MasterReport`] per run owns them all.
//! Reports are immutable once built; persistence and retrieval live in
//! [`store`].

pub mod store;

pub use store::ReportStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{Finding, RunId, SeverityBand, Subject, TaskKind};
use crate::tasks::TaskOutput;

/// Aggregate counts over a set of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of findings.
    pub total: usize,
    /// Findings in the low band.
    pub low: usize,
    /// Findings in the medium band.
    pub medium: usize,
    /// Findings in the high band.
    pub high: usize,
    /// Total bytes reclaimable across duplicate-group findings.
    pub reclaimable_bytes: u64,
}

impl ReportSummary {
    fn compute(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Default::default()
        };
        for finding in findings {
            match finding.band() {
                SeverityBand::Low => summary.low += 1,
                SeverityBand::Medium => summary.medium += 1,
                SeverityBand::High => summary.high += 1,
            }
            if let Subject::DuplicateGroup {
                reclaimable_bytes, ..
            } = &finding.subject
            {
                summary.reclaimable_bytes += reclaimable_bytes;
            }
        }
        summary
    }

    fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.low += other.low;
        self.medium += other.medium;
        self.high += other.high;
        self.reclaimable_bytes += other.reclaimable_bytes;
    }
}

/// The complete result of one task within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// The run this report belongs to.
    pub run_id: String,

    /// The task that produced this report.
    pub task: TaskKind,

    /// Description of what the task looked at.
    pub scope: String,

    /// When the task started.
    pub started_at: DateTime<Utc>,

    /// When the report was assembled.
    pub finished_at: DateTime<Utc>,

    /// `false` when the task was cancelled before finishing.
    pub complete: bool,

    /// Error annotation when the task failed outright.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Non-fatal warnings accumulated during the scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Findings in discovery order.
    pub findings: Vec<Finding>,

    /// Aggregate counts.
    pub summary: ReportSummary,
}

impl ScanReport {
    /// Builds a report from a successful task run.
    pub fn from_output(
        run_id: &RunId,
        task: TaskKind,
        scope: impl Into<String>,
        started_at: DateTime<Utc>,
        output: TaskOutput,
    ) -> Self {
        let summary = ReportSummary::compute(&output.findings);
        Self {
            run_id: run_id.as_str().to_string(),
            task,
            scope: scope.into(),
            started_at,
            finished_at: Utc::now(),
            complete: output.complete,
            error: None,
            warnings: output.warnings,
            findings: output.findings,
            summary,
        }
    }

    /// Builds an empty report annotated with the task's error.
    pub fn failed(
        run_id: &RunId,
        task: TaskKind,
        scope: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.as_str().to_string(),
            task,
            scope: scope.into(),
            started_at,
            finished_at: Utc::now(),
            complete: false,
            error: Some(error.into()),
            warnings: Vec::new(),
            findings: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    /// Renders the field-complete, machine-parseable form.
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Renders a human-readable summary of this report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "run {} / {} ({}) — {} finding(s)",
            self.run_id, self.task, self.scope, self.summary.total
        ));
        if !self.complete {
            out.push_str(" [incomplete]");
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("\n  error: {error}"));
        }
        out.push_str(&format!(
            "\n  severity: {} high, {} medium, {} low",
            self.summary.high, self.summary.medium, self.summary.low
        ));
        if self.summary.reclaimable_bytes > 0 {
            out.push_str(&format!(
                "\n  reclaimable: {} bytes",
                self.summary.reclaimable_bytes
            ));
        }
        for finding in &self.findings {
            out.push_str(&format!(
                "\n  [{}] {} — {}",
                finding.band(),
                finding.subject.display_name(),
                finding.reason
            ));
        }
        for warning in &self.warnings {
            out.push_str(&format!("\n  warning: {warning}"));
        }
        out
    }
}

/// The aggregate of every task report from one orchestrator run.
///
/// The master report exclusively owns its task reports; aggregation order
/// is the order tasks were requested, independent of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterReport {
    /// Identifier of the run, used for persistence naming.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// Per-task reports, in request order.
    pub reports: Vec<ScanReport>,

    /// Error annotations from failed tasks, in request order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Global counts across all task reports.
    pub summary: ReportSummary,
}

impl MasterReport {
    /// Assembles the master report from the run's task reports.
    pub fn new(run_id: &RunId, started_at: DateTime<Utc>, reports: Vec<ScanReport>) -> Self {
        let mut summary = ReportSummary::default();
        let mut errors = Vec::new();
        for report in &reports {
            summary.merge(&report.summary);
            if let Some(error) = &report.error {
                errors.push(format!("{}: {error}", report.task));
            }
        }
        Self {
            run_id: run_id.as_str().to_string(),
            started_at,
            finished_at: Utc::now(),
            reports,
            errors,
            summary,
        }
    }

    /// Returns `true` when every task finished without error or
    /// cancellation.
    pub fn complete(&self) -> bool {
        self.reports.iter().all(|r| r.complete && r.error.is_none())
    }

    /// Iterates all findings across all task reports, in report order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.reports.iter().flat_map(|r| r.findings.iter())
    }

    /// Total number of findings across all task reports.
    pub fn total_findings(&self) -> usize {
        self.summary.total
    }

    /// Renders the field-complete, machine-parseable form.
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Renders a human-readable summary of the whole run.
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "run {} — {} finding(s) across {} task(s)",
            self.run_id,
            self.summary.total,
            self.reports.len()
        );
        if !self.complete() {
            out.push_str(" [incomplete]");
        }
        for error in &self.errors {
            out.push_str(&format!("\n  error: {error}"));
        }
        for report in &self.reports {
            out.push('\n');
            out.push_str(&report.render_text());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn finding(severity: f64) -> Finding {
        Finding::new(
            TaskKind::Files,
            Subject::File {
                path: PathBuf::from("/tmp/x.bin"),
                size: 1,
            },
            severity,
            "test",
            vec![],
        )
    }

    fn report_with(findings: Vec<Finding>) -> ScanReport {
        let output = TaskOutput {
            findings,
            warnings: vec![],
            complete: true,
        };
        ScanReport::from_output(
            &RunId::from_string("testrun"),
            TaskKind::Files,
            "/scan",
            Utc::now(),
            output,
        )
    }

    #[test]
    fn test_summary_counts_bands() {
        let findings = vec![finding(0.1), finding(0.5), finding(0.9), finding(0.95)];
        let summary = ReportSummary::compute(&findings);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.high, 2);
    }

    #[test]
    fn test_summary_accumulates_reclaimable_bytes() {
        let group = Finding::new(
            TaskKind::Duplicates,
            Subject::DuplicateGroup {
                digest: "d".into(),
                members: vec![PathBuf::from("a"), PathBuf::from("b")],
                reclaimable_bytes: 123,
            },
            0.0,
            "dupes",
            vec![],
        );
        let summary = ReportSummary::compute(&[group]);
        assert_eq!(summary.reclaimable_bytes, 123);
    }

    #[test]
    fn test_failed_report_is_empty_and_annotated() {
        let report = ScanReport::failed(
            &RunId::from_string("testrun"),
            TaskKind::Gpu,
            "gpu processes",
            Utc::now(),
            "driver unavailable",
        );
        assert!(report.findings.is_empty());
        assert_eq!(report.error.as_deref(), Some("driver unavailable"));
        assert!(!report.complete);
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn test_render_text_mentions_incomplete() {
        let output = TaskOutput {
            findings: vec![finding(0.8)],
            warnings: vec!["w".into()],
            complete: false,
        };
        let report = ScanReport::from_output(
            &RunId::from_string("testrun"),
            TaskKind::Files,
            "/scan",
            Utc::now(),
            output,
        );
        let text = report.render_text();
        assert!(text.contains("[incomplete]"));
        assert!(text.contains("warning: w"));
    }

    #[test]
    fn test_master_report_merges_summaries_and_errors() {
        let run_id = RunId::from_string("testrun");
        let ok = report_with(vec![finding(0.9), finding(0.2)]);
        let bad = ScanReport::failed(&run_id, TaskKind::Gpu, "gpu", Utc::now(), "boom");

        let master = MasterReport::new(&run_id, Utc::now(), vec![ok, bad]);
        assert_eq!(master.total_findings(), 2);
        assert_eq!(master.summary.high, 1);
        assert_eq!(master.errors, vec!["gpu: boom".to_string()]);
        assert!(!master.complete());
        assert_eq!(master.findings().count(), 2);
    }

    #[test]
    fn test_report_round_trip() {
        let report = report_with(vec![finding(0.5)]);
        let json = serde_json::to_string(&report).unwrap();
        let back: ScanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, "testrun");
        assert_eq!(back.summary, report.summary);
    }

    #[test]
    fn test_master_report_round_trip() {
        let run_id = RunId::from_string("testrun");
        let master = MasterReport::new(&run_id, Utc::now(), vec![report_with(vec![finding(0.5)])]);
        let json = serde_json::to_string(&master).unwrap();
        let back: MasterReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, "testrun");
        assert_eq!(back.reports.len(), 1);
    }
}
