//! Quarantine and remediation.
//!
//! Remediation runs in two phases. The planning phase computes every
//! decision — effective action, quarantine destination, planned failure —
//! without touching the filesystem; the execution phase then applies the
//! plan, or skips it entirely in dry-run mode. Dry-run and live runs over
//! the same findings therefore make byte-identical decisions.
//!
//! Findings are never modified; every action (including simulated ones)
//! produces a [`QuarantineRecord`] and an audit log entry.

pub mod cleanup;

pub use cleanup::CleanupOutcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditLog};
use crate::core::config::EngineConfig;
use crate::core::context::CancelToken;
use crate::core::error::{RemediationError, RemediationResult};
use crate::core::types::{Finding, RunId};
use crate::report::{MasterReport, ScanReport};

/// The action requested for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Move the object into the quarantine store.
    Quarantine,
    /// Permanently delete the object.
    Delete,
}

impl RemediationAction {
    /// Returns the stable string name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarantine => "quarantine",
            Self::Delete => "delete",
        }
    }
}

/// The terminal state of a remediation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The action was planned but not executed (dry run).
    Simulated,
    /// The object was moved into quarantine.
    Quarantined,
    /// The object was deleted.
    Deleted,
    /// The action failed; the object is untouched.
    Failed,
}

/// A remediation request.
///
/// Deletion requires explicit confirmation; an unconfirmed delete request
/// degrades to quarantine rather than failing. The dry-run flag falls back
/// to the configured default when unset.
#[derive(Debug, Clone, Copy)]
pub struct RemediationRequest {
    action: RemediationAction,
    confirmed: bool,
    dry_run: Option<bool>,
}

impl RemediationRequest {
    /// Requests quarantine.
    pub fn quarantine() -> Self {
        Self {
            action: RemediationAction::Quarantine,
            confirmed: false,
            dry_run: None,
        }
    }

    /// Requests deletion. Unconfirmed deletes degrade to quarantine.
    pub fn delete() -> Self {
        Self {
            action: RemediationAction::Delete,
            confirmed: false,
            dry_run: None,
        }
    }

    /// Confirms a destructive action.
    pub fn with_confirmation(mut self) -> Self {
        self.confirmed = true;
        self
    }

    /// Overrides the configured dry-run default.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

/// One remediation decision and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    /// Unique record identifier.
    pub id: String,

    /// The run this record belongs to.
    pub run_id: String,

    /// The finding this record acts on.
    pub finding_id: String,

    /// The acted-on path.
    pub source: PathBuf,

    /// The effective action, after any degradation.
    pub action: RemediationAction,

    /// Destination name inside the quarantine store, for quarantines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_name: Option<String>,

    /// Whether the action succeeded (or, in dry-run, would have been
    /// attempted).
    pub succeeded: bool,

    /// Error description for failed actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Whether the action was only simulated.
    pub dry_run: bool,

    /// When the record was created.
    pub recorded_at: DateTime<Utc>,
}

impl QuarantineRecord {
    /// Returns the terminal state of this record.
    pub fn disposition(&self) -> Disposition {
        if !self.succeeded {
            Disposition::Failed
        } else if self.dry_run {
            Disposition::Simulated
        } else {
            match self.action {
                RemediationAction::Quarantine => Disposition::Quarantined,
                RemediationAction::Delete => Disposition::Deleted,
            }
        }
    }
}

/// The records produced by one remediation run.
#[derive(Debug)]
pub struct RemediationOutcome {
    /// One record per planned action that ran (or was simulated), in
    /// plan order.
    pub records: Vec<QuarantineRecord>,

    /// `false` when the run was cancelled before every planned action
    /// was processed. Records produced before the cancel are kept.
    pub complete: bool,
}

/// Sidecar metadata stored next to each quarantined object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedObject {
    /// Name of the object inside the quarantine directory.
    pub stored_name: String,

    /// The path the object was taken from.
    pub original_path: PathBuf,

    /// The finding that caused the quarantine.
    pub finding_id: String,

    /// The run the quarantine happened in.
    pub run_id: String,

    /// When the object was quarantined.
    pub quarantined_at: DateTime<Utc>,
}

/// One planned action, computed before any filesystem mutation.
#[derive(Debug, Clone)]
struct PlannedAction {
    finding_id: String,
    source: PathBuf,
    action: RemediationAction,
    stored_name: Option<String>,
    failure: Option<String>,
}

/// Executes remediation actions against findings.
#[derive(Debug)]
pub struct RemediationEngine {
    config: Arc<EngineConfig>,
    audit: AuditLog,
}

impl RemediationEngine {
    /// Creates an engine, preparing the quarantine store directory.
    pub fn new(config: Arc<EngineConfig>) -> RemediationResult<Self> {
        fs::create_dir_all(&config.quarantine_dir).map_err(|e| {
            RemediationError::StorePreparation {
                reason: format!(
                    "cannot create {}: {e}",
                    config.quarantine_dir.display()
                ),
            }
        })?;
        let audit = AuditLog::new(&config.quarantine_dir);
        Ok(Self { config, audit })
    }

    /// Returns the audit log handle.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Remediates every finding, producing one record per actionable path.
    ///
    /// Findings without any actionable filesystem path still produce one
    /// failed record, so callers can account for every submitted finding.
    /// Per-path failures never abort the remaining actions. The
    /// cancellation token is checked between actions; a cancelled run
    /// keeps the records produced so far and is marked incomplete.
    pub fn remediate(
        &self,
        run_id: &RunId,
        findings: &[Finding],
        request: RemediationRequest,
        cancel: &CancelToken,
    ) -> RemediationOutcome {
        let dry_run = request.dry_run.unwrap_or(self.config.dry_run_default);
        let plan = self.plan(findings, request);

        let mut complete = true;
        let mut records = Vec::with_capacity(plan.len());
        for planned in plan {
            if cancel.is_cancelled() {
                tracing::info!(
                    target: "scansweep::audit",
                    run_id = %run_id,
                    processed = records.len(),
                    "remediation cancelled"
                );
                complete = false;
                break;
            }

            let record = if dry_run {
                self.simulate(run_id, planned)
            } else {
                self.execute(run_id, planned)
            };

            self.audit.append(
                Some(run_id.as_str()),
                AuditEvent::Remediation {
                    finding_id: record.finding_id.clone(),
                    path: record.source.display().to_string(),
                    action: record.action.as_str().to_string(),
                    dry_run: record.dry_run,
                    succeeded: record.succeeded,
                    error: record.error.clone(),
                },
            );
            records.push(record);
        }
        RemediationOutcome { records, complete }
    }

    /// Remediates every finding in a task report, in report order.
    pub fn remediate_report(
        &self,
        report: &ScanReport,
        request: RemediationRequest,
        cancel: &CancelToken,
    ) -> RemediationOutcome {
        let run_id = RunId::from_string(report.run_id.clone());
        self.remediate(&run_id, &report.findings, request, cancel)
    }

    /// Remediates every finding in a master report, task by task in
    /// aggregation order.
    pub fn remediate_master(
        &self,
        master: &MasterReport,
        request: RemediationRequest,
        cancel: &CancelToken,
    ) -> RemediationOutcome {
        let run_id = RunId::from_string(master.run_id.clone());
        let findings: Vec<Finding> = master.findings().cloned().collect();
        self.remediate(&run_id, &findings, request, cancel)
    }

    /// Computes the full plan without touching the filesystem.
    fn plan(&self, findings: &[Finding], request: RemediationRequest) -> Vec<PlannedAction> {
        let effective = match request.action {
            RemediationAction::Delete if !request.confirmed => {
                tracing::info!(
                    target: "scansweep::audit",
                    "unconfirmed delete degraded to quarantine"
                );
                RemediationAction::Quarantine
            }
            action => action,
        };

        let mut reserved: HashSet<String> = HashSet::new();
        let mut plan = Vec::new();

        for finding in findings {
            let targets = finding.subject.remediation_targets();
            if targets.is_empty() {
                plan.push(PlannedAction {
                    finding_id: finding.id.clone(),
                    source: PathBuf::new(),
                    action: effective,
                    stored_name: None,
                    failure: Some("no actionable filesystem path".to_string()),
                });
                continue;
            }

            for source in targets {
                let failure = if source.exists() {
                    None
                } else {
                    Some(format!("{} does not exist", source.display()))
                };

                let stored_name = match (effective, &failure) {
                    (RemediationAction::Quarantine, None) => {
                        Some(self.reserve_stored_name(&source, &mut reserved))
                    }
                    _ => None,
                };

                plan.push(PlannedAction {
                    finding_id: finding.id.clone(),
                    source,
                    action: effective,
                    stored_name,
                    failure,
                });
            }
        }
        plan
    }

    /// Picks a destination name unique against both the store's current
    /// contents and the names already reserved within this plan.
    fn reserve_stored_name(&self, source: &Path, reserved: &mut HashSet<String>) -> String {
        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let mut candidate = base.clone();
        let mut counter = 1u32;
        while reserved.contains(&candidate) || self.config.quarantine_dir.join(&candidate).exists()
        {
            candidate = format!("{base}.{counter}");
            counter += 1;
        }
        reserved.insert(candidate.clone());
        candidate
    }

    fn simulate(&self, run_id: &RunId, planned: PlannedAction) -> QuarantineRecord {
        let succeeded = planned.failure.is_none();
        self.record(run_id, planned, succeeded, None, true)
    }

    fn execute(&self, run_id: &RunId, planned: PlannedAction) -> QuarantineRecord {
        if planned.failure.is_some() {
            return self.record(run_id, planned, false, None, false);
        }

        let result = match planned.action {
            RemediationAction::Quarantine => {
                let stored_name = planned
                    .stored_name
                    .clone()
                    .unwrap_or_else(|| "unnamed".to_string());
                self.quarantine_one(run_id, &planned, &stored_name)
            }
            RemediationAction::Delete => fs::remove_file(&planned.source),
        };

        match result {
            Ok(()) => self.record(run_id, planned, true, None, false),
            Err(e) => {
                let error = e.to_string();
                self.record(run_id, planned, false, Some(error), false)
            }
        }
    }

    fn quarantine_one(
        &self,
        run_id: &RunId,
        planned: &PlannedAction,
        stored_name: &str,
    ) -> std::io::Result<()> {
        let destination = self.config.quarantine_dir.join(stored_name);
        move_file(&planned.source, &destination)?;

        let meta = QuarantinedObject {
            stored_name: stored_name.to_string(),
            original_path: planned.source.clone(),
            finding_id: planned.finding_id.clone(),
            run_id: run_id.as_str().to_string(),
            quarantined_at: Utc::now(),
        };
        let meta_path = self.meta_path(stored_name);
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(meta_path, json)
    }

    fn record(
        &self,
        run_id: &RunId,
        planned: PlannedAction,
        succeeded: bool,
        error: Option<String>,
        dry_run: bool,
    ) -> QuarantineRecord {
        let error = error.or(planned.failure);
        QuarantineRecord {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.as_str().to_string(),
            finding_id: planned.finding_id,
            source: planned.source,
            action: planned.action,
            stored_name: planned.stored_name,
            succeeded,
            error,
            dry_run,
            recorded_at: Utc::now(),
        }
    }

    /// Lists every object currently held in quarantine.
    pub fn list_quarantined(&self) -> RemediationResult<Vec<QuarantinedObject>> {
        let mut objects = Vec::new();
        for entry in fs::read_dir(&self.config.quarantine_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".meta.json") {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            match serde_json::from_slice::<QuarantinedObject>(&bytes) {
                Ok(meta) => objects.push(meta),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "skipping corrupt quarantine metadata");
                }
            }
        }
        objects.sort_by(|a, b| a.stored_name.cmp(&b.stored_name));
        Ok(objects)
    }

    /// Restores a quarantined object to its original path.
    ///
    /// Fails if no such object exists or if the original path is occupied
    /// again; a restore never overwrites.
    pub fn restore(&self, stored_name: &str) -> RemediationResult<PathBuf> {
        let meta_path = self.meta_path(stored_name);
        if !meta_path.exists() {
            return Err(RemediationError::NotFound {
                name: stored_name.to_string(),
            });
        }

        let bytes = fs::read(&meta_path)?;
        let meta: QuarantinedObject = serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if meta.original_path.exists() {
            return Err(RemediationError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", meta.original_path.display()),
            )));
        }

        let stored = self.config.quarantine_dir.join(stored_name);
        move_file(&stored, &meta.original_path)?;
        fs::remove_file(&meta_path)?;

        self.audit.append(
            Some(&meta.run_id),
            AuditEvent::Restore {
                stored_name: stored_name.to_string(),
                restored_to: meta.original_path.display().to_string(),
            },
        );
        Ok(meta.original_path)
    }

    fn meta_path(&self, stored_name: &str) -> PathBuf {
        self.config
            .quarantine_dir
            .join(format!("{stored_name}.meta.json"))
    }
}

/// Moves a file, falling back to copy-and-remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
