use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::BenchError;
use crate::types::{MetricsRecord, Report};

/// Column order of the CSV report. Fixed; consumers index by position.
pub const COLUMNS: [&str; 6] = [
    "sample",
    "wallClockMillis",
    "heapUsedBytes",
    "heapTotalBytes",
    "degraded",
    "exitStatus",
];

/// Quote a field per RFC 4180 when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_row(record: &MetricsRecord) -> String {
    [
        csv_field(&record.sample),
        record.wall_clock_millis.to_string(),
        optional(record.heap_used_bytes),
        optional(record.heap_total_bytes),
        record.degraded.to_string(),
        record.status.as_str().to_string(),
    ]
    .join(",")
}

/// Serialise the report: header row, then one row per record in order.
pub fn to_csv(report: &Report) -> String {
    let mut out = COLUMNS.join(",");
    out.push('\n');
    for record in &report.records {
        out.push_str(&csv_row(record));
        out.push('\n');
    }
    out
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Fail early if the report could not be written to `path`.
pub fn check_destination(path: &Path) -> Result<(), BenchError> {
    let parent = parent_dir(path);
    if !parent.is_dir() {
        return Err(BenchError::ReportWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent.display()),
            ),
        });
    }
    Ok(())
}

/// Temp file for the report. Created 0666 minus the umask, like a plain
/// `File::create`, rather than tempfile's owner-only default.
#[cfg(unix)]
fn temp_report(dir: PathBuf) -> std::io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt as _;

    tempfile::Builder::new()
        .prefix(".samplebench-")
        .permissions(std::fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn temp_report(dir: PathBuf) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new().prefix(".samplebench-").tempfile_in(dir)
}

/// An existing report keeps its mode when replaced.
fn keep_existing_mode(tmp: &NamedTempFile, path: &Path) -> std::io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => tmp.as_file().set_permissions(meta.permissions()),
        _ => Ok(()),
    }
}

/// Write the report to `path` atomically.
///
/// The CSV goes to a temporary file next to `path` which is renamed into place
/// only after everything has been written and synced. On failure the temporary
/// file is removed and any existing report is untouched.
pub fn write_report(report: &Report, path: &Path) -> Result<(), BenchError> {
    let io_err = |source: std::io::Error| BenchError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = temp_report(parent_dir(path)).map_err(io_err)?;
    keep_existing_mode(&tmp, path).map_err(io_err)?;
    tmp.write_all(to_csv(report).as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
