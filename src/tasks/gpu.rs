//! Scan of processes holding GPU resources.
//!
//! GPU-attached processes are enumerated through the `nvidia-smi` tool in
//! machine-readable CSV mode. Hosts without the tool, without a GPU, or
//! with an unresponsive driver degrade to an empty result with a recorded
//! reason; this task never fails a run.

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::context::RunContext;
use crate::core::error::ScanResult;
use crate::core::types::{Subject, TaskKind};
use crate::tasks::{assess_subject, ScanTask, TaskOutput};

const QUERY_ARGS: &[&str] = &[
    "--query-compute-apps=pid,process_name,used_memory",
    "--format=csv,noheader,nounits",
];

/// One GPU-attached process as reported by the enumeration tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuProcess {
    /// Process identifier.
    pub pid: u32,
    /// Process name or executable path.
    pub name: String,
    /// GPU memory in use, in MiB.
    pub used_memory_mib: u64,
}

/// Scans processes currently holding GPU compute resources.
#[derive(Debug)]
pub struct GpuScanTask {
    command: String,
}

impl Default for GpuScanTask {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuScanTask {
    /// Creates the task with the standard enumeration tool.
    pub fn new() -> Self {
        Self {
            command: "nvidia-smi".to_string(),
        }
    }

    /// Overrides the enumeration command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

#[async_trait]
impl ScanTask for GpuScanTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Gpu
    }

    async fn run(&self, ctx: &RunContext) -> ScanResult<TaskOutput> {
        let mut output = TaskOutput::new();

        let invocation = Command::new(&self.command).args(QUERY_ARGS).output();
        let result = tokio::time::timeout(ctx.config.per_item_timeout, invocation).await;

        let stdout = match result {
            Err(_) => {
                output.warnings.push(format!(
                    "gpu enumeration timed out after {:?}",
                    ctx.config.per_item_timeout
                ));
                return Ok(output);
            }
            Ok(Err(e)) => {
                output
                    .warnings
                    .push(format!("gpu enumeration unavailable: {e}"));
                return Ok(output);
            }
            Ok(Ok(out)) if !out.status.success() => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                output.warnings.push(format!(
                    "gpu enumeration failed ({}): {}",
                    out.status,
                    stderr.trim()
                ));
                return Ok(output);
            }
            Ok(Ok(out)) => String::from_utf8_lossy(&out.stdout).into_owned(),
        };

        let (processes, parse_warnings) = parse_compute_apps(&stdout);
        output.warnings.extend(parse_warnings);

        for process in processes {
            if ctx.cancel.is_cancelled() {
                output.complete = false;
                break;
            }
            let subject = Subject::Process {
                pid: process.pid,
                name: basename(&process.name),
                exe: Some(process.name.clone().into()),
                cmdline: None,
            };
            if let Some(mut finding) = assess_subject(ctx, &subject, TaskKind::Gpu, None) {
                finding.reason = format!(
                    "{} (holding {} MiB of gpu memory)",
                    finding.reason, process.used_memory_mib
                );
                output.findings.push(finding);
            }
        }

        tracing::debug!(
            findings = output.findings.len(),
            warnings = output.warnings.len(),
            "gpu scan finished"
        );
        Ok(output)
    }
}

/// Parses `pid, process_name, used_memory` CSV lines.
///
/// Malformed lines are skipped with a warning; the name field may itself
/// contain commas, so it is reassembled from the middle fields.
fn parse_compute_apps(stdout: &str) -> (Vec<GpuProcess>, Vec<String>) {
    let mut processes = Vec::new();
    let mut warnings = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            warnings.push(format!("unparseable gpu process line: '{line}'"));
            continue;
        }

        let pid = fields[0].parse::<u32>();
        let used = fields[fields.len() - 1].parse::<u64>();
        match (pid, used) {
            (Ok(pid), Ok(used_memory_mib)) => {
                let name = fields[1..fields.len() - 1].join(", ");
                processes.push(GpuProcess {
                    pid,
                    name,
                    used_memory_mib,
                });
            }
            _ => warnings.push(format!("unparseable gpu process line: '{line}'")),
        }
    }

    (processes, warnings)
}

fn basename(name: &str) -> String {
    std::path::Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
