//! Per-run context injected into every component entry point.
//!
//! Scan tasks, the orchestrator, and the remediation engine receive a
//! `RunContext` instead of reading ambient process state. Its lifecycle is
//! owned by the caller (the excluded CLI layer, or the orchestrator when it
//! builds one per run).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::types::RunId;
use crate::heuristics::{HeuristicEngine, SignatureDb};

/// Cooperative cancellation token.
///
/// Checked between per-item units of work; a cancelled run keeps the
/// partial results produced so far and marks its reports incomplete.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Shared context for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Resolved, validated configuration.
    pub config: Arc<EngineConfig>,

    /// Identifier of this run, used for report naming.
    pub run_id: RunId,

    /// Heuristic engine built from the configured rule set.
    pub heuristics: Arc<HeuristicEngine>,

    /// Signature database built from the configured signatures.
    pub signatures: Arc<SignatureDb>,

    /// Cancellation token for this run.
    pub cancel: CancelToken,
}

impl RunContext {
    /// Builds a context for a fresh run from a validated configuration.
    pub fn new(config: Arc<EngineConfig>, cancel: CancelToken) -> Self {
        let heuristics = Arc::new(HeuristicEngine::with_rules(config.rules.clone()));
        let signatures = Arc::new(SignatureDb::with_signatures(config.signatures.clone()));
        Self {
            config,
            run_id: RunId::generate(),
            heuristics,
            signatures,
            cancel,
        }
    }
}
