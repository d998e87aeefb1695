//! End-to-end billing of a session log: validate, then reconcile.

use std::path::Path;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::event::Event;
use crate::reconcile::{BillingSummary, reconcile};
use crate::validate::parse_line;

/// Parses every well-formed line of `input`, in order.
///
/// Malformed lines are recorded on `sink` with their 1-based line number.
pub fn parse_events(input: &str, sink: &mut dyn DiagnosticSink) -> Vec<Event> {
    input
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match parse_line(line) {
            Ok(event) => Some(event),
            Err(error) => {
                sink.record(Diagnostic::MalformedLine {
                    line_number: idx + 1,
                    error,
                });
                None
            }
        })
        .collect()
}

/// Bills the sessions described by the lines of `input`.
pub fn bill_lines(input: &str, sink: &mut dyn DiagnosticSink) -> BillingSummary {
    let events = parse_events(input, sink);
    if events.is_empty() {
        sink.record(Diagnostic::NoValidEvents);
        return BillingSummary::default();
    }
    reconcile(&events, sink)
}

/// Bills the session log at `path`.
///
/// A file that cannot be read yields an empty summary and a
/// [`Diagnostic::ReadFailed`].
pub fn bill_file(path: &Path, sink: &mut dyn DiagnosticSink) -> BillingSummary {
    match std::fs::read_to_string(path) {
        Ok(input) => bill_lines(&input, sink),
        Err(e) => {
            sink.record(Diagnostic::ReadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
            BillingSummary::default()
        }
    }
}
