//! Benchmark module
//!
//! One-shot synthetic load generators (CPU, RAM, disk write, disk read and a
//! GPU proxy), each timed and judged against a single fixed time budget.

pub mod engine;
pub mod syscheck;
pub mod workloads;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use engine::BenchmarkEngine;
pub use workloads::WorkloadProfile;

/// Time budget every benchmark kind is judged against (inclusive)
pub const EXPECTED_DURATION: Duration = Duration::from_secs(30);

/// The five fixed load generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BenchmarkKind {
    Cpu,
    Ram,
    DiskWrite,
    DiskRead,
    /// Arithmetic proxy; never touches a graphics device
    Gpu,
}

impl BenchmarkKind {
    pub const ALL: [BenchmarkKind; 5] = [
        BenchmarkKind::Cpu,
        BenchmarkKind::Ram,
        BenchmarkKind::DiskWrite,
        BenchmarkKind::DiskRead,
        BenchmarkKind::Gpu,
    ];

    /// Label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "CPU",
            BenchmarkKind::Ram => "RAM",
            BenchmarkKind::DiskWrite => "Disk Write",
            BenchmarkKind::DiskRead => "Disk Read",
            BenchmarkKind::Gpu => "GPU",
        }
    }

    /// Subsystem named in the over-budget advisory
    fn subsystem(&self) -> &'static str {
        match self {
            BenchmarkKind::Cpu => "CPU",
            BenchmarkKind::Ram => "RAM",
            BenchmarkKind::DiskWrite | BenchmarkKind::DiskRead => "disk",
            BenchmarkKind::Gpu => "GPU",
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    WithinBudget,
    ExceededBudget,
}

impl Verdict {
    /// Pure function of elapsed time against [`EXPECTED_DURATION`]
    pub fn classify(elapsed: Duration) -> Self {
        if elapsed <= EXPECTED_DURATION {
            Verdict::WithinBudget
        } else {
            Verdict::ExceededBudget
        }
    }
}

/// Faults raised while a load generator runs
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Out of memory. {0}")]
    ResourceExhaustion(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    RuntimeFault(String),
}

/// Outcome of one run; written to the log once and never changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub kind: BenchmarkKind,
    pub elapsed: Duration,
    pub verdict: Verdict,
    pub failure_reason: Option<String>,
}

impl BenchmarkResult {
    pub fn completed(kind: BenchmarkKind, elapsed: Duration) -> Self {
        Self {
            kind,
            elapsed,
            verdict: Verdict::classify(elapsed),
            failure_reason: None,
        }
    }

    pub fn failed(kind: BenchmarkKind, elapsed: Duration, reason: String) -> Self {
        Self {
            kind,
            elapsed,
            verdict: Verdict::classify(elapsed),
            failure_reason: Some(reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure_reason.is_some()
    }

    /// Human-readable log lines for this result
    pub fn log_lines(&self) -> Vec<String> {
        if let Some(reason) = &self.failure_reason {
            return vec![format!("{} stress test failed: {}", self.kind.label(), reason)];
        }

        let summary = format!(
            "{} stress test completed in {:.2} seconds.",
            self.kind.label(),
            self.elapsed.as_secs_f64()
        );
        let advisory = match self.verdict {
            Verdict::WithinBudget => {
                "Test completed successfully within the expected time.".to_string()
            }
            Verdict::ExceededBudget => format!(
                "Test took longer than expected. Your {} might be under heavy load or not performing optimally.",
                self.kind.subsystem()
            ),
        };
        vec![summary, advisory]
    }
}

/// Per-kind run state: `Idle -> Running -> Completed | Failed`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BenchmarkState {
    #[default]
    Idle,
    Running,
    Completed(BenchmarkResult),
    Failed(BenchmarkResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_boundary_is_inclusive_at_thirty_seconds() {
        assert_eq!(
            Verdict::classify(Duration::from_millis(30_000)),
            Verdict::WithinBudget
        );
        assert_eq!(
            Verdict::classify(Duration::from_millis(30_010)),
            Verdict::ExceededBudget
        );
        assert_eq!(Verdict::classify(Duration::ZERO), Verdict::WithinBudget);
    }

    #[test]
    fn completed_result_reports_two_decimal_seconds() {
        let result = BenchmarkResult::completed(BenchmarkKind::DiskWrite, Duration::from_millis(12_346));
        assert_eq!(
            result.log_lines(),
            vec![
                "Disk Write stress test completed in 12.35 seconds.".to_string(),
                "Test completed successfully within the expected time.".to_string(),
            ]
        );
    }

    #[test]
    fn over_budget_result_carries_advisory() {
        let result = BenchmarkResult::completed(BenchmarkKind::DiskRead, Duration::from_millis(30_010));
        assert_eq!(result.verdict, Verdict::ExceededBudget);
        assert_eq!(
            result.log_lines()[1],
            "Test took longer than expected. Your disk might be under heavy load or not performing optimally."
        );
    }

    #[test]
    fn failed_result_logs_reason() {
        let reason = BenchmarkError::ResourceExhaustion("allocation of 1048576 bytes failed".into());
        let result = BenchmarkResult::failed(BenchmarkKind::Ram, Duration::from_millis(5), reason.to_string());
        assert!(result.is_failure());
        assert_eq!(
            result.log_lines(),
            vec!["RAM stress test failed: Out of memory. allocation of 1048576 bytes failed".to_string()]
        );
    }
}
