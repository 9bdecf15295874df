use std::path::Path;

use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::types::{MetricsRecord, Report, SampleStatus};

const UNAVAILABLE: &str = "n/a";

/// Human-readable byte count using binary units: "512 B", "3.4 MiB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

fn heap_cell(value: Option<u64>) -> String {
    value.map(format_bytes).unwrap_or_else(|| UNAVAILABLE.to_string())
}

/// Status text for the console; failures carry their reason.
fn status_text(record: &MetricsRecord) -> String {
    match record.status {
        SampleStatus::Success => "ok".to_string(),
        SampleStatus::Failure(failure) => failure.to_string(),
    }
}

fn style_index() -> Style {
    Style::new().cyan().bold()
}

fn style_dim_italic() -> Style {
    Style::new().dimmed().italic()
}

fn colored_status(record: &MetricsRecord, text: &str) -> String {
    match record.status {
        SampleStatus::Success => text
            .if_supports_color(Stream::Stdout, |s| s.green())
            .to_string(),
        SampleStatus::Failure(_) => text
            .if_supports_color(Stream::Stdout, |s| s.red())
            .to_string(),
    }
}

/// Aligned table with header and a footer naming the written report.
pub fn format_default(report: &Report, destination: &Path) -> String {
    let mut out = String::new();

    let header = format!("Benchmark results ({} samples):", report.records.len());
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push_str("\n\n");

    if !report.records.is_empty() {
        let index_width = if report.records.len() <= 10 { 1 } else { 2 };
        let name_width = report
            .records
            .iter()
            .map(|r| r.sample.chars().count())
            .max()
            .unwrap_or(0);
        let wall_width = report
            .records
            .iter()
            .map(|r| format!("{}ms", r.wall_clock_millis).len())
            .max()
            .unwrap_or(0);

        let idx_style = style_index();
        let dim_it = style_dim_italic();

        for (i, record) in report.records.iter().enumerate() {
            let idx_colored = format!("{:>width$}", i, width = index_width)
                .if_supports_color(Stream::Stdout, |s| s.style(idx_style))
                .to_string();

            let name_colored = format!("{:<width$}", record.sample, width = name_width)
                .if_supports_color(Stream::Stdout, |s| s.white())
                .to_string();

            let wall = format!("{}ms", record.wall_clock_millis);
            let wall_colored = format!("{:>width$}", wall, width = wall_width)
                .if_supports_color(Stream::Stdout, |s| s.yellow())
                .to_string();

            let heap = format!(
                "{:>10} / {:<10}",
                heap_cell(record.heap_used_bytes),
                heap_cell(record.heap_total_bytes)
            );
            let heap_colored = if record.degraded {
                heap.if_supports_color(Stream::Stdout, |s| s.style(dim_it))
                    .to_string()
            } else {
                heap
            };

            let status_colored = colored_status(record, &status_text(record));

            out.push_str(&format!(
                "  {}  {}  {}  {}  {}\n",
                idx_colored, name_colored, wall_colored, heap_colored, status_colored
            ));
        }

        out.push('\n');
    }

    let failures = report.failures();
    let degraded = report.degraded();
    if failures > 0 || degraded > 0 {
        let summary = format!("{} failed, {} degraded", failures, degraded);
        out.push_str(
            &summary
                .if_supports_color(Stream::Stdout, |s| s.red())
                .to_string(),
        );
        out.push('\n');
    }

    let footer = format!("Report written to {}", destination.display());
    out.push_str(
        &footer
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    out
}

/// Compact single-line-per-sample output, no header/footer.
pub fn format_short(report: &Report) -> String {
    let name_width = report
        .records
        .iter()
        .map(|r| r.sample.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for record in &report.records {
        let heap = match (record.heap_used_bytes, record.heap_total_bytes) {
            (Some(used), Some(total)) => format!("{}/{}", used, total),
            _ => UNAVAILABLE.to_string(),
        };
        let status = colored_status(record, record.status.as_str());
        out.push_str(&format!(
            "{:<width$} {}ms {} {}\n",
            record.sample,
            record.wall_clock_millis,
            heap,
            status,
            width = name_width
        ));
    }
    out
}

#[derive(Serialize)]
struct JsonReport {
    generated_at: String,
    samples: usize,
    failures: usize,
    records: Vec<JsonRecord>,
}

#[derive(Serialize)]
struct JsonRecord {
    sample: String,
    wall_clock_millis: u64,
    heap_used_bytes: Option<u64>,
    heap_total_bytes: Option<u64>,
    degraded: bool,
    exit_status: &'static str,
    failure: Option<String>,
}

pub fn format_json(report: &Report) -> String {
    let records: Vec<JsonRecord> = report
        .records
        .iter()
        .map(|r| JsonRecord {
            sample: r.sample.clone(),
            wall_clock_millis: r.wall_clock_millis,
            heap_used_bytes: r.heap_used_bytes,
            heap_total_bytes: r.heap_total_bytes,
            degraded: r.degraded,
            exit_status: r.status.as_str(),
            failure: match r.status {
                SampleStatus::Success => None,
                SampleStatus::Failure(f) => Some(f.to_string()),
            },
        })
        .collect();

    let json = JsonReport {
        generated_at: report.generated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        samples: records.len(),
        failures: report.failures(),
        records,
    };

    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}
