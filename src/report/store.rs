//! Report persistence.
//!
//! Reports are written as pretty-printed JSON under the configured report
//! directory: one file per task per run named `{run_id}-{task}.json`, and
//! one master report named `{run_id}-master.json`. The newest report for
//! a task is found by ordering run identifiers by their timestamp part
//! and then by the numeric same-second suffix.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{ReportError, ReportResult};
use crate::core::types::{RunId, TaskKind};
use crate::report::{MasterReport, ScanReport};

const MASTER_SUFFIX: &str = "master";

/// Filesystem-backed store for scan reports.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> ReportResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists a task report, returning the path it was written to.
    pub fn persist(&self, report: &ScanReport) -> ReportResult<PathBuf> {
        let path = self.path_for(&report.run_id, report.task.as_str());
        self.write_json(&path, report)?;
        tracing::info!(
            target: "scansweep::audit",
            run_id = %report.run_id,
            task = %report.task,
            path = %path.display(),
            findings = report.summary.total,
            "report persisted"
        );
        Ok(path)
    }

    /// Persists a master report, returning the path it was written to.
    pub fn persist_master(&self, report: &MasterReport) -> ReportResult<PathBuf> {
        let path = self.path_for(&report.run_id, MASTER_SUFFIX);
        self.write_json(&path, report)?;
        tracing::info!(
            target: "scansweep::audit",
            run_id = %report.run_id,
            path = %path.display(),
            findings = report.summary.total,
            "master report persisted"
        );
        Ok(path)
    }

    /// Loads the task report for a specific run.
    pub fn load(&self, run_id: &RunId, task: TaskKind) -> ReportResult<ScanReport> {
        let path = self.path_for(run_id.as_str(), task.as_str());
        if !path.exists() {
            return Err(ReportError::NotFound {
                kind: task.as_str().to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the master report for a specific run.
    pub fn load_master(&self, run_id: &RunId) -> ReportResult<MasterReport> {
        let path = self.path_for(run_id.as_str(), MASTER_SUFFIX);
        if !path.exists() {
            return Err(ReportError::NotFound {
                kind: MASTER_SUFFIX.to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the most recent persisted report for a task.
    pub fn latest(&self, task: TaskKind) -> ReportResult<ScanReport> {
        let path = self.latest_path(task.as_str())?.ok_or_else(|| {
            ReportError::NotFound {
                kind: task.as_str().to_string(),
            }
        })?;
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the most recent persisted master report.
    pub fn latest_master(&self) -> ReportResult<MasterReport> {
        let path = self
            .latest_path(MASTER_SUFFIX)?
            .ok_or_else(|| ReportError::NotFound {
                kind: MASTER_SUFFIX.to_string(),
            })?;
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The file is written to a temporary name first and renamed into
    /// place, so readers never observe a half-written report.
    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> ReportResult<()> {
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn latest_path(&self, kind: &str) -> ReportResult<Option<PathBuf>> {
        let suffix = format!("-{kind}.json");
        let mut best: Option<(RunIdKey, PathBuf)> = None;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(run_id) = name.strip_suffix(&suffix) else {
                continue;
            };
            let key = RunIdKey::parse(run_id);
            if best.as_ref().map(|(b, _)| key > *b).unwrap_or(true) {
                best = Some((key, entry.path()));
            }
        }
        Ok(best.map(|(_, path)| path))
    }

    fn path_for(&self, run_id: &str, kind: &str) -> PathBuf {
        self.dir.join(format!("{run_id}-{kind}.json"))
    }
}

/// Recency key for a run id: the timestamp part, then the numeric
/// disambiguation suffix.
///
/// Same-second runs carry a `-{n}` suffix, and a plain string comparison
/// would order `{base}-1` below `{base}` (and `-10` below `-2`). The
/// unsuffixed first run of a second counts as suffix zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RunIdKey {
    base: String,
    suffix: u64,
}

impl RunIdKey {
    fn parse(run_id: &str) -> Self {
        if let Some((base, counter)) = run_id.rsplit_once('-') {
            if let Ok(suffix) = counter.parse::<u64>() {
                return Self {
                    base: base.to_string(),
                    suffix,
                };
            }
        }
        Self {
            base: run_id.to_string(),
            suffix: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskOutput;
    use chrono::Utc;
    use tempfile::TempDir;

    fn report(run_id: &str, task: TaskKind) -> ScanReport {
        ScanReport::from_output(
            &RunId::from_string(run_id),
            task,
            "/scan",
            Utc::now(),
            TaskOutput::new(),
        )
    }

    #[test]
    fn test_persist_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        let path = store
            .persist(&report("20260828T100000Z", TaskKind::Files))
            .unwrap();
        assert!(path.exists());

        let loaded = store
            .load(&RunId::from_string("20260828T100000Z"), TaskKind::Files)
            .unwrap();
        assert_eq!(loaded.run_id, "20260828T100000Z");
        assert_eq!(loaded.task, TaskKind::Files);
    }

    #[test]
    fn test_latest_picks_newest_run() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        store
            .persist(&report("20260828T100000Z", TaskKind::Files))
            .unwrap();
        store
            .persist(&report("20260828T110000Z", TaskKind::Files))
            .unwrap();
        store
            .persist(&report("20260828T120000Z", TaskKind::Gpu))
            .unwrap();

        let latest = store.latest(TaskKind::Files).unwrap();
        assert_eq!(latest.run_id, "20260828T110000Z");
    }

    #[test]
    fn test_latest_prefers_suffixed_same_second_run() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        // Two runs started within the same second: the disambiguating
        // suffix marks the later one.
        store
            .persist(&report("20260828T100000Z", TaskKind::Files))
            .unwrap();
        store
            .persist(&report("20260828T100000Z-1", TaskKind::Files))
            .unwrap();

        let latest = store.latest(TaskKind::Files).unwrap();
        assert_eq!(latest.run_id, "20260828T100000Z-1");
    }

    #[test]
    fn test_latest_orders_suffixes_numerically() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        for run in ["20260828T100000Z-2", "20260828T100000Z-10"] {
            store.persist(&report(run, TaskKind::Files)).unwrap();
        }

        let latest = store.latest(TaskKind::Files).unwrap();
        assert_eq!(latest.run_id, "20260828T100000Z-10");
    }

    #[test]
    fn test_later_second_beats_earlier_suffixed_run() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        store
            .persist(&report("20260828T100000Z-3", TaskKind::Files))
            .unwrap();
        store
            .persist(&report("20260828T100001Z", TaskKind::Files))
            .unwrap();

        let latest = store.latest(TaskKind::Files).unwrap();
        assert_eq!(latest.run_id, "20260828T100001Z");
    }

    #[test]
    fn test_master_report_round_trips_through_store() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();

        let run_id = RunId::from_string("20260828T100000Z");
        let master = MasterReport::new(
            &run_id,
            Utc::now(),
            vec![report("20260828T100000Z", TaskKind::Files)],
        );
        store.persist_master(&master).unwrap();

        let loaded = store.load_master(&run_id).unwrap();
        assert_eq!(loaded.reports.len(), 1);

        let latest = store.latest_master().unwrap();
        assert_eq!(latest.run_id, "20260828T100000Z");
    }

    #[test]
    fn test_latest_for_missing_task_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.latest(TaskKind::Duplicates),
            Err(ReportError::NotFound { .. })
        ));
        assert!(matches!(
            store.latest_master(),
            Err(ReportError::NotFound { .. })
        ));
    }

    #[test]
    fn test_persist_logs_to_the_audit_target() {
        use std::io;
        use std::sync::{Arc, Mutex};

        #[derive(Clone)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let capture = Capture(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();

        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            store
                .persist(&report("20260828T100000Z", TaskKind::Files))
                .unwrap();
        });

        let logged = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("scansweep::audit"));
        assert!(logged.contains("report persisted"));
        assert!(logged.contains("20260828T100000Z"));
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        store
            .persist(&report("20260828T100000Z", TaskKind::Files))
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
