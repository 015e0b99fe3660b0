//! Core types, configuration, and error handling.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - `Finding`, `Subject`, `TaskKind`, `RunId`
//! - [`config`] - The injected, read-only `EngineConfig`
//! - [`context`] - Per-run `RunContext` and cancellation
//! - [`error`] - Structured error types

pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use context::{CancelToken, RunContext};
pub use error::{
    RemediationError, RemediationResult, ReportError, ReportResult, ScanError, ScanResult,
};
pub use types::{Finding, RunId, SeverityBand, Subject, TaskKind};
