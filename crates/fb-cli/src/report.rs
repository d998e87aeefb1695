//! Billing report output.
//!
//! CSV is one `user,totalSessions,totalDurationSeconds` line per billed user,
//! in the order users were first billed. JSON is the full summary, including
//! the observation window.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use fb_core::BillingSummary;

use crate::config::{Config, OutputFormat};

/// CSV header. Durations for unmatched sessions are conservative, so the
/// total is a minimum.
pub const CSV_HEADER: &str = "User,TotalSessions,MinimumTotalDuration";

// ========== CSV Output ==========

/// Formats the summary as CSV lines.
pub fn format_csv(summary: &BillingSummary, header: bool) -> String {
    let mut output = String::new();
    if header {
        let _ = writeln!(output, "{CSV_HEADER}");
    }
    for totals in &summary.users {
        let _ = writeln!(
            output,
            "{},{},{}",
            totals.user, totals.session_count, totals.total_seconds
        );
    }
    output
}

// ========== JSON Output ==========

/// Formats the summary as pretty-printed JSON.
pub fn format_json(summary: &BillingSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize billing summary")
}

// ========== Public Interface ==========

/// Writes the summary in the configured format.
pub fn write_report<W: Write>(
    writer: &mut W,
    summary: &BillingSummary,
    config: &Config,
) -> Result<()> {
    match config.format {
        OutputFormat::Csv => write!(writer, "{}", format_csv(summary, config.header))?,
        OutputFormat::Json => writeln!(writer, "{}", format_json(summary)?)?,
    }
    writer.flush().context("failed to flush report")?;
    Ok(())
}
