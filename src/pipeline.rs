use tracing::{debug, info, warn};

use crate::aggregate;
use crate::errors::BenchError;
use crate::interrupt::interrupt_requested;
use crate::probe;
use crate::runner::ProcessRunner;
use crate::types::{Report, SampleDescriptor, SampleStatus};

const STDERR_TAIL_LINES: usize = 5;

/// Run every sample in order, one at a time, and collect a report.
///
/// Per-sample failures end up in the report. Spawn failures and interrupts abort the whole run.
pub fn run_pipeline(samples: &[SampleDescriptor], runner: &ProcessRunner) -> Result<Report, BenchError> {
    let mut records = Vec::with_capacity(samples.len());

    for (i, sample) in samples.iter().enumerate() {
        if interrupt_requested() {
            return Err(BenchError::Interrupted);
        }

        info!(sample = %sample.id, index = i, total = samples.len(), "running sample");

        let run = runner.run(sample)?;
        let reading = probe::read_reported(&run.stdout);
        let record = aggregate::combine(sample, &run, &reading.snapshot);

        match run.status {
            SampleStatus::Success => {
                info!(sample = %sample.id, wall_clock_ms = record.wall_clock_millis, "sample succeeded");
            }
            SampleStatus::Failure(failure) => {
                warn!(sample = %sample.id, wall_clock_ms = record.wall_clock_millis, "sample failed: {}", failure);
                let tail = stderr_tail(&run.stderr, STDERR_TAIL_LINES);
                if !tail.is_empty() {
                    debug!(sample = %sample.id, "stderr tail:\n{}", tail);
                }
            }
        }

        if record.degraded {
            warn!(sample = %sample.id, "heap counters unavailable; record marked degraded");
        }
        if run.output_truncated {
            debug!(sample = %sample.id, "captured output truncated");
        }

        records.push(record);
    }

    Ok(Report::new(records))
}

/// Last `lines` lines of a captured stream.
pub fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
