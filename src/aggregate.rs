use std::time::Duration;

use crate::types::{MemorySnapshot, MetricsRecord, RunResult, SampleDescriptor};

/// Whole milliseconds in `nanos`, truncating.
pub fn nanos_to_millis(nanos: u128) -> u64 {
    u64::try_from(nanos / 1_000_000).unwrap_or(u64::MAX)
}

pub fn duration_to_millis(elapsed: Duration) -> u64 {
    nanos_to_millis(elapsed.as_nanos())
}

/// Merge one sample's measurements into a report row.
///
/// Pure: every field comes from `run` or `snapshot`. A degraded snapshot
/// leaves both heap fields unset instead of carrying its zeros forward.
pub fn combine(sample: &SampleDescriptor, run: &RunResult, snapshot: &MemorySnapshot) -> MetricsRecord {
    let (heap_used_bytes, heap_total_bytes) = if snapshot.degraded {
        (None, None)
    } else {
        (Some(snapshot.heap_used_bytes), Some(snapshot.heap_total_bytes))
    };

    MetricsRecord {
        sample: sample.id.clone(),
        wall_clock_millis: duration_to_millis(run.elapsed),
        heap_used_bytes,
        heap_total_bytes,
        degraded: snapshot.degraded,
        status: run.status,
    }
}
