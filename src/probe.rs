//! Memory probe.
//!
//! Heap counters must be read inside the process being measured. The child
//! writes a single probe line to its stdout and the parent picks it out of the
//! captured output:
//!
//! ```text
//! @@samplebench-memory {"heap_used_bytes":1048576,"heap_total_bytes":4194304}
//! ```

use std::io::Write;

use tracing::warn;

use crate::types::MemorySnapshot;

pub const MARKER: &str = "@@samplebench-memory";

/// Source of coarse memory counters for the current process, as `(used, total)` bytes.
pub trait MemoryCounters {
    fn read(&self) -> std::io::Result<(u64, u64)>;
}

/// Reads `/proc/self/statm`: resident set as used, total program size as total.
pub struct StatmCounters;

impl MemoryCounters for StatmCounters {
    fn read(&self) -> std::io::Result<(u64, u64)> {
        let raw = std::fs::read_to_string("/proc/self/statm")?;
        parse_statm(&raw, page_size())
    }
}

#[cfg(unix)]
fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

#[cfg(not(unix))]
fn page_size() -> u64 {
    4096
}

pub(crate) fn parse_statm(raw: &str, page_size: u64) -> std::io::Result<(u64, u64)> {
    let mut fields = raw.split_whitespace().map(|f| f.parse::<u64>());
    match (fields.next(), fields.next()) {
        (Some(Ok(size)), Some(Ok(resident))) => Ok((
            resident.saturating_mul(page_size),
            size.saturating_mul(page_size),
        )),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "malformed statm",
        )),
    }
}

/// Snapshot of this process's counters. Never fails; unreadable counters yield a degraded snapshot.
pub fn snapshot() -> MemorySnapshot {
    snapshot_with(&StatmCounters)
}

pub fn snapshot_with(counters: &dyn MemoryCounters) -> MemorySnapshot {
    match counters.read() {
        Ok((used, total)) => MemorySnapshot::new(used, total),
        Err(_) => MemorySnapshot::unavailable(),
    }
}

/// Probe line for a snapshot, or `None` when there is nothing real to report.
pub fn format_line(snapshot: &MemorySnapshot) -> Option<String> {
    if snapshot.degraded {
        return None;
    }
    let payload = serde_json::to_string(snapshot).ok()?;
    Some(format!("{} {}", MARKER, payload))
}

/// Take a snapshot and write the probe line to stdout.
///
/// Meant to be called by Rust samples right before they exit.
pub fn report() -> MemorySnapshot {
    let snap = snapshot();
    if let Some(line) = format_line(&snap) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
    snap
}

/// What the parent recovered from a child's stdout.
#[derive(Debug, Clone)]
pub struct ProbeReading {
    pub snapshot: MemorySnapshot,
    /// The captured stdout with probe text removed.
    pub stdout: String,
}

/// Extract the last valid probe line from captured stdout.
///
/// A missing or unusable probe line yields a degraded snapshot.
pub fn read_reported(stdout: &str) -> ProbeReading {
    let mut found: Option<MemorySnapshot> = None;
    let mut rejected = false;
    let mut cleaned = String::with_capacity(stdout.len());

    for line in stdout.split_inclusive('\n') {
        let Some(idx) = line.find(MARKER) else {
            cleaned.push_str(line);
            continue;
        };

        let prefix = &line[..idx];
        if !prefix.is_empty() {
            cleaned.push_str(prefix);
            if line.ends_with('\n') {
                cleaned.push('\n');
            }
        }

        let payload = line[idx + MARKER.len()..].trim();
        match serde_json::from_str::<MemorySnapshot>(payload) {
            Ok(raw) => {
                let snap = MemorySnapshot::new(raw.heap_used_bytes, raw.heap_total_bytes);
                if snap.degraded {
                    rejected = true;
                } else {
                    found = Some(snap);
                }
            }
            Err(_) => rejected = true,
        }
    }

    if found.is_none() && rejected {
        warn!("probe line present but unusable; heap counters marked unavailable");
    }

    ProbeReading {
        snapshot: found.unwrap_or_else(MemorySnapshot::unavailable),
        stdout: cleaned,
    }
}
