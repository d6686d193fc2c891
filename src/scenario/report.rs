//! Human-readable transcripts of scenario history.

use std::fmt::Write as _;

use crate::core::config::ReportConfig;
use crate::invocation::record::InvocationRecord;

/// Render `records` as a numbered transcript.
///
/// ```text
/// Observed scenario:
///
/// 1. repo.load("a") -> returns 1  at tests/orders.rs:41
/// 2. repo.save("a", 2) -> default null  at tests/orders.rs:42
/// ```
#[must_use]
pub fn render(records: &[InvocationRecord], config: &ReportConfig) -> String {
    if records.is_empty() {
        return "Observed scenario: no invocations recorded.\n".to_string();
    }
    let mut out = String::from("Observed scenario:\n\n");
    let shown = match config.max_invocations {
        0 => records.len(),
        max => max.min(records.len()),
    };
    for record in &records[..shown] {
        out.push_str(&render_line(record, config.show_locations));
        out.push('\n');
    }
    if shown < records.len() {
        let _ = writeln!(out, "... and {} more", records.len() - shown);
    }
    out
}

/// One transcript line, without trailing newline.
#[must_use]
pub fn render_line(record: &InvocationRecord, show_location: bool) -> String {
    let mut line = format!("{}. {record}", record.sequence());
    if show_location {
        let location = record.location();
        let _ = write!(line, "  at {}:{}", location.file(), location.line());
    }
    line
}

/// Indented block of records used in assertion failures.
pub(crate) fn render_block(title: &str, records: &[&InvocationRecord], show_location: bool) -> String {
    let mut out = format!("{title}:\n");
    for record in records {
        let _ = writeln!(out, "  {}", render_line(record, show_location));
    }
    out.push('\n');
    out
}
