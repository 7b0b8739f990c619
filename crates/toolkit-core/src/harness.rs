//! Reliability harness.
//!
//! Runs every check in order and collects one record per check. A check that
//! returns `Err` or panics becomes a failed record; the remaining checks still run.

use crate::checks::{CheckError, CheckId, Workspace};
use crate::report::CheckOutcome;
use chrono::Utc;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Result of one harness entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Rendered report, or the error that stopped the check.
    pub output: String,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run one check, converting errors and panics into a failed record.
pub fn run_isolated<F>(name: &str, check: F) -> CheckRecord
where
    F: FnOnce() -> Result<CheckOutcome, CheckError>,
{
    let start = Utc::now();
    let result = catch_unwind(AssertUnwindSafe(check));
    let duration_ms = (Utc::now() - start).num_milliseconds().max(0) as u64;

    let (passed, output) = match result {
        Ok(Ok(outcome)) => (outcome.passed, outcome.render()),
        Ok(Err(err)) => {
            warn!(check = name, error = %err, "check errored");
            (false, format!("error: {err}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(check = name, panic = %message, "check panicked");
            (false, format!("panic: {message}"))
        }
    };
    debug!(check = name, passed, duration_ms, "check finished");

    CheckRecord {
        name: name.to_string(),
        passed,
        duration_ms,
        output,
    }
}

/// All records from one harness run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessReport {
    pub records: Vec<CheckRecord>,
}

impl HarnessReport {
    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.passed()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.records.iter().map(|r| r.duration_ms).sum()
    }

    pub fn success(&self) -> bool {
        self.records.iter().all(|r| r.passed)
    }

    pub fn render(&self) -> String {
        let secs = |ms: u64| ms as f64 / 1000.0;
        let mut lines = vec![
            "Toolkit reliability harness".to_string(),
            format!("Checks: {}", self.records.len()),
            String::new(),
        ];
        for record in &self.records {
            let status = if record.passed { "PASS" } else { "FAIL" };
            lines.push(format!(
                "[{status}] {} ({:.2}s)",
                record.name,
                secs(record.duration_ms)
            ));
            lines.extend(record.output.lines().map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("  {line}")
                }
            }));
        }
        lines.push(String::new());
        lines.push("Reliability harness summary".to_string());
        lines.push(format!("- Passed: {}", self.passed()));
        lines.push(format!("- Failed: {}", self.failed()));
        lines.push(format!("- Total checks: {}", self.records.len()));
        lines.push(format!(
            "- Total duration: {:.2}s",
            secs(self.total_duration_ms())
        ));
        lines.push(String::new());
        lines.push(if self.success() {
            "Reliability harness passed.".to_string()
        } else {
            "Reliability harness failed.".to_string()
        });
        lines.join("\n")
    }
}

/// Run every check in harness order.
pub fn run_harness(workspace: &Workspace) -> HarnessReport {
    info!(root = %workspace.root.display(), checks = CheckId::ALL.len(), "running harness");
    let records = CheckId::ALL
        .iter()
        .map(|id| run_isolated(id.name(), || id.run(workspace)))
        .collect();
    let report = HarnessReport { records };
    info!(
        passed = report.passed(),
        failed = report.failed(),
        "harness finished"
    );
    report
}
