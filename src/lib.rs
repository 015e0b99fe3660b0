//! # scansweep
//!
//! An embeddable scan-and-remediate engine: heuristic and signature
//! scanning of file trees, running processes, and GPU-attached processes,
//! staged duplicate-file detection, per-task reports, and an auditable
//! quarantine store with dry-run-by-default remediation.
//!
//! ## Architecture
//!
//! - **Scan tasks** ([`tasks`]) are independent finding producers behind
//!   the [`tasks::ScanTask`] trait.
//! - The **orchestrator** ([`orchestrator`]) runs registered tasks
//!   concurrently and aggregates one [`report::ScanReport`] per task.
//! - The **heuristic engine** ([`heuristics`]) scores subjects with an
//!   ordered, append-only rule registry; the signature database provides
//!   exact known-bad matches.
//! - **Hashing** ([`hashing`]) supplies staged BLAKE3 digests and the
//!   three-stage duplicate pipeline.
//! - **Remediation** ([`remediation`]) plans before it mutates, defaults
//!   to dry-run, and records every action in an append-only audit log
//!   ([`audit`]).
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use scansweep::{CancelToken, EngineConfig, ScanOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(EngineConfig::new(
//!     "/var/lib/scansweep/reports",
//!     "/var/lib/scansweep/quarantine",
//!     vec![PathBuf::from("/home")],
//! ));
//!
//! let orchestrator = ScanOrchestrator::with_default_tasks(config)?;
//! let outcome = orchestrator.run(CancelToken::new()).await?;
//!
//! for report in &outcome.reports {
//!     println!("{}", report.render_text());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod core;
pub mod hashing;
pub mod heuristics;
pub mod orchestrator;
pub mod remediation;
pub mod report;
pub mod tasks;

pub use crate::core::{
    CancelToken, EngineConfig, Finding, RemediationError, RemediationResult, ReportError,
    ReportResult, RunContext, RunId, ScanError, ScanResult, SeverityBand, Subject, TaskKind,
};
pub use crate::orchestrator::ScanOrchestrator;
pub use crate::remediation::{
    Disposition, QuarantineRecord, RemediationAction, RemediationEngine, RemediationOutcome,
    RemediationRequest,
};
pub use crate::report::{MasterReport, ReportStore, ScanReport};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditLog};
    pub use crate::core::{
        CancelToken, EngineConfig, Finding, RunContext, RunId, ScanError, ScanResult,
        SeverityBand, Subject, TaskKind,
    };
    pub use crate::hashing::{DigestStage, Digester};
    pub use crate::heuristics::{
        HeuristicEngine, HeuristicRule, RuleMatch, RulePredicate, Signature, SignatureDb,
    };
    pub use crate::orchestrator::ScanOrchestrator;
    pub use crate::remediation::{
        CleanupOutcome, Disposition, QuarantineRecord, QuarantinedObject, RemediationAction,
        RemediationEngine, RemediationOutcome, RemediationRequest,
    };
    pub use crate::report::{MasterReport, ReportStore, ScanReport};
    pub use crate::tasks::{
        DuplicateScanTask, FileScanTask, GpuScanTask, ProcessScanTask, ScanTask, TaskOutput,
    };
}
