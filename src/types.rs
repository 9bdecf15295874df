use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A sample program chosen by the registry. Never mutated after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDescriptor {
    /// File name, used as the `sample` column.
    pub id: String,
    pub path: PathBuf,
}

/// Why a single sample run counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFailure {
    TimedOut,
    NonZeroExit { code: i32 },
    Signaled { signal: i32 },
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailure::TimedOut => write!(f, "timed out"),
            RunFailure::NonZeroExit { code } => write!(f, "exited with code {}", code),
            RunFailure::Signaled { signal } => write!(f, "killed by signal {}", signal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Success,
    Failure(RunFailure),
}

impl SampleStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SampleStatus::Success)
    }

    /// Column value in the report: `success` or `failure`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Success => "success",
            SampleStatus::Failure(_) => "failure",
        }
    }
}

/// Outcome of one child-process execution, owned by whoever requested the run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub sample_id: String,
    /// Monotonic time from just before spawn until exit or forced termination.
    pub elapsed: Duration,
    pub status: SampleStatus,
    pub stdout: String,
    pub stderr: String,
    pub output_truncated: bool,
}

/// Heap counters read inside the measured process.
///
/// `heap_used_bytes <= heap_total_bytes` holds whenever `degraded` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub heap_used_bytes: u64,
    pub heap_total_bytes: u64,
    #[serde(skip)]
    pub degraded: bool,
}

impl MemorySnapshot {
    /// Builds a snapshot, degrading it when the counters contradict each other.
    pub fn new(heap_used_bytes: u64, heap_total_bytes: u64) -> Self {
        if heap_used_bytes > heap_total_bytes {
            return Self::unavailable();
        }
        Self {
            heap_used_bytes,
            heap_total_bytes,
            degraded: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            heap_used_bytes: 0,
            heap_total_bytes: 0,
            degraded: true,
        }
    }
}

/// One row of the report. Heap fields are `None` when they could not be measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRecord {
    pub sample: String,
    pub wall_clock_millis: u64,
    pub heap_used_bytes: Option<u64>,
    pub heap_total_bytes: Option<u64>,
    pub degraded: bool,
    pub status: SampleStatus,
}

/// Everything one pipeline invocation produced, in registry order.
#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<MetricsRecord>,
}

impl Report {
    pub fn new(records: Vec<MetricsRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            records,
        }
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.status.is_success()).count()
    }

    pub fn degraded(&self) -> usize {
        self.records.iter().filter(|r| r.degraded).count()
    }
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Default,
    Short,
}
