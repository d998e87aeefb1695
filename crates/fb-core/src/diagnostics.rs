//! Diagnostics emitted while billing a log.
//!
//! Diagnostics are observability only: recording one never changes the
//! computed totals. Callers inject a [`DiagnosticSink`]; the CLI uses
//! [`TracingSink`], tests collect into a `Vec<Diagnostic>`.

use std::path::PathBuf;

use crate::reconcile::SkipReason;
use crate::validate::LineError;

/// Something worth reporting that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The input could not be read; the run produced no totals.
    ReadFailed { path: PathBuf, message: String },

    /// A line was not a well-formed event and was dropped.
    MalformedLine { line_number: usize, error: LineError },

    /// No line in the input was well-formed.
    NoValidEvents,

    /// An event was excluded from reconciliation.
    EventSkipped(SkipReason),
}

/// Receives diagnostics as they are produced.
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ReadFailed { path, message } => {
                tracing::error!(path = %path.display(), error = %message, "error reading file");
            }
            Diagnostic::MalformedLine { line_number, error } => {
                tracing::debug!(line_number, error = %error, "skipping malformed line");
            }
            Diagnostic::NoValidEvents => {
                tracing::warn!("no valid data found in the file");
            }
            Diagnostic::EventSkipped(reason) => {
                tracing::warn!(reason = %reason, "skipping event");
            }
        }
    }
}
