//! Core domain logic for fair billing.
//!
//! This crate contains the fundamental types and logic for:
//! - Validation: turning raw log lines into session events
//! - Reconciliation: pairing `Start`/`End` events per user into billed sessions
//! - Diagnostics: reporting dropped lines and skipped events without
//!   affecting the totals

pub mod action;
mod billing;
pub mod diagnostics;
pub mod event;
pub mod reconcile;
pub mod types;
pub mod validate;

pub use action::{SessionAction, UnknownAction};
pub use billing::{bill_file, bill_lines, parse_events};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use event::{BillableEvent, Event};
pub use reconcile::{
    BillingSummary, ChargeKind, ObservationWindow, Reconciler, SessionCharge, SkipReason,
    UserTotals, reconcile,
};
pub use types::{UserId, ValidationError};
pub use validate::{LineError, parse_line, validate_line};
