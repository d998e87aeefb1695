//! Session reconciliation.
//!
//! Pairs `Start`/`End` events per user and bills each session in whole
//! seconds, even when one side of the pair is missing from the log.
//!
//! # Algorithm Summary
//!
//! 1. Take the observation window from the first and last events by
//!    position (not by time; input order is never re-sorted)
//! 2. `Start` pushes onto the user's FIFO queue of pending starts
//! 3. `End` closes the oldest pending start, or bills from the window start
//!    when the user has nothing pending
//! 4. Starts still pending after the pass are billed through the window end

use std::collections::{HashMap, VecDeque};

use chrono::NaiveTime;
use serde::Serialize;
use thiserror::Error;

use crate::action::SessionAction;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::event::BillableEvent;
use crate::types::UserId;

/// Bounds used to bill sessions the log only evidences from one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObservationWindow {
    /// Timestamp of the first event in input order.
    pub first: NaiveTime,
    /// Timestamp of the last event in input order.
    pub last: NaiveTime,
}

impl ObservationWindow {
    /// Window spanning the first and last events by position.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_events<E: BillableEvent>(events: &[E]) -> Option<Self> {
        let first = events.first()?.timestamp();
        let last = events.last()?.timestamp();
        Some(Self { first, last })
    }
}

/// How a session's bounds were determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeKind {
    /// Both `Start` and `End` were in the log.
    Matched,
    /// `End` with no pending `Start`; billed from the window start.
    UnmatchedEnd,
    /// `Start` never closed; billed through the window end.
    UnmatchedStart,
}

/// One session folded into a user's totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCharge {
    pub user: UserId,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub seconds: u64,
    pub kind: ChargeKind,
}

impl SessionCharge {
    fn new(
        user: &UserId,
        start: NaiveTime,
        end: NaiveTime,
        kind: ChargeKind,
    ) -> Result<Self, SkipReason> {
        let seconds = end.signed_duration_since(start).num_seconds();
        let seconds = u64::try_from(seconds).map_err(|_| SkipReason::OutOfOrder {
            user: user.clone(),
            start,
            end,
        })?;
        Ok(Self {
            user: user.clone(),
            start,
            end,
            seconds,
            kind,
        })
    }
}

/// Why an event was left out of the totals.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The session would end before it starts. Only happens when the log is
    /// not in time order.
    #[error("session for {user} would end at {end} before it starts at {start}")]
    OutOfOrder {
        user: UserId,
        start: NaiveTime,
        end: NaiveTime,
    },
}

/// Billed totals for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTotals {
    pub user: UserId,
    pub session_count: u64,
    pub total_seconds: u64,
}

impl UserTotals {
    const fn new(user: UserId) -> Self {
        Self {
            user,
            session_count: 0,
            total_seconds: 0,
        }
    }
}

/// Result of a reconciliation run.
///
/// Users appear in the order they were first billed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingSummary {
    /// `None` when there were no events to reconcile.
    pub window: Option<ObservationWindow>,
    pub users: Vec<UserTotals>,
}

impl BillingSummary {
    /// Totals for a single user, if they were billed at all.
    pub fn get(&self, user: &str) -> Option<&UserTotals> {
        self.users.iter().find(|totals| totals.user.as_str() == user)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

/// Map keyed by user that iterates in insertion order.
#[derive(Debug)]
struct UserMap<V> {
    index: HashMap<UserId, usize>,
    entries: Vec<(UserId, V)>,
}

impl<V> UserMap<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn get_mut(&mut self, user: &UserId) -> Option<&mut V> {
        let &slot = self.index.get(user)?;
        Some(&mut self.entries[slot].1)
    }

    fn get_or_insert_with(&mut self, user: &UserId, init: impl FnOnce() -> V) -> &mut V {
        let slot = match self.index.get(user) {
            Some(&slot) => slot,
            None => {
                self.entries.push((user.clone(), init()));
                let slot = self.entries.len() - 1;
                self.index.insert(user.clone(), slot);
                slot
            }
        };
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(UserId, V)> {
        self.entries
    }
}

/// Per-run reconciliation state.
///
/// Owns the open-session queues and the running totals. Feed events in log
/// order with [`ingest`](Self::ingest), then call
/// [`finalize`](Self::finalize) to bill whatever is still open.
#[derive(Debug)]
pub struct Reconciler {
    window: ObservationWindow,
    open: UserMap<VecDeque<NaiveTime>>,
    totals: UserMap<UserTotals>,
}

impl Reconciler {
    pub fn new(window: ObservationWindow) -> Self {
        Self {
            window,
            open: UserMap::new(),
            totals: UserMap::new(),
        }
    }

    /// Reconciler whose window spans `events`, or `None` if there are none.
    pub fn for_events<E: BillableEvent>(events: &[E]) -> Option<Self> {
        ObservationWindow::from_events(events).map(Self::new)
    }

    /// Applies one event.
    ///
    /// Returns the charge billed by an `End`, `None` for a `Start`. A skipped
    /// `End` leaves the user's pending starts untouched.
    pub fn ingest<E: BillableEvent>(
        &mut self,
        event: &E,
    ) -> Result<Option<SessionCharge>, SkipReason> {
        let user = event.user();
        let timestamp = event.timestamp();

        match event.action() {
            SessionAction::Start => {
                self.open
                    .get_or_insert_with(user, VecDeque::new)
                    .push_back(timestamp);
                Ok(None)
            }
            SessionAction::End => {
                let pending = self.open.get_mut(user).and_then(|queue| queue.front().copied());
                let charge = match pending {
                    Some(start) => {
                        let charge =
                            SessionCharge::new(user, start, timestamp, ChargeKind::Matched)?;
                        if let Some(queue) = self.open.get_mut(user) {
                            queue.pop_front();
                        }
                        charge
                    }
                    None => SessionCharge::new(
                        user,
                        self.window.first,
                        timestamp,
                        ChargeKind::UnmatchedEnd,
                    )?,
                };
                self.fold(&charge);
                Ok(Some(charge))
            }
        }
    }

    /// Bills every still-open session through the window end and returns
    /// the totals.
    pub fn finalize(mut self, sink: &mut dyn DiagnosticSink) -> BillingSummary {
        let last = self.window.last;
        let open = std::mem::replace(&mut self.open, UserMap::new());

        for (user, starts) in open.into_entries() {
            for start in starts {
                match SessionCharge::new(&user, start, last, ChargeKind::UnmatchedStart) {
                    Ok(charge) => self.fold(&charge),
                    Err(reason) => sink.record(Diagnostic::EventSkipped(reason)),
                }
            }
        }

        BillingSummary {
            window: Some(self.window),
            users: self
                .totals
                .into_entries()
                .into_iter()
                .map(|(_, totals)| totals)
                .collect(),
        }
    }

    fn fold(&mut self, charge: &SessionCharge) {
        let totals = self
            .totals
            .get_or_insert_with(&charge.user, || UserTotals::new(charge.user.clone()));
        totals.session_count += 1;
        totals.total_seconds += charge.seconds;
    }
}

/// Reconciles a whole event sequence in one pass.
///
/// Events must already be validated and in log order. Skipped events are
/// recorded on `sink`; the pass always runs to completion.
pub fn reconcile<E: BillableEvent>(events: &[E], sink: &mut dyn DiagnosticSink) -> BillingSummary {
    let Some(mut reconciler) = Reconciler::for_events(events) else {
        return BillingSummary::default();
    };

    for event in events {
        if let Err(reason) = reconciler.ingest(event) {
            sink.record(Diagnostic::EventSkipped(reason));
        }
    }

    reconciler.finalize(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use proptest::prelude::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").expect("valid test time")
    }

    fn start(time: &str, user: &str) -> Event {
        Event::new(t(time), UserId::new(user).unwrap(), SessionAction::Start)
    }

    fn end(time: &str, user: &str) -> Event {
        Event::new(t(time), UserId::new(user).unwrap(), SessionAction::End)
    }

    fn totals(summary: &BillingSummary, user: &str) -> (u64, u64) {
        let totals = summary
            .get(user)
            .unwrap_or_else(|| panic!("{user} should be billed"));
        (totals.total_seconds, totals.session_count)
    }

    fn run(events: &[Event]) -> (BillingSummary, Vec<Diagnostic>) {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let summary = reconcile(events, &mut diagnostics);
        (summary, diagnostics)
    }

    #[test]
    fn matched_sessions_per_user() {
        let events = [
            start("09:00:00", "user1"),
            end("09:01:00", "user1"),
            start("09:30:00", "user2"),
            end("09:30:30", "user2"),
        ];
        let (summary, diagnostics) = run(&events);

        assert_eq!(totals(&summary, "user1"), (60, 1));
        assert_eq!(totals(&summary, "user2"), (30, 1));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unmatched_end_bills_from_first_event() {
        let events = [
            end("10:00:00", "user1"),
            start("10:01:00", "user1"),
            end("10:01:45", "user1"),
        ];
        let (summary, _) = run(&events);

        assert_eq!(totals(&summary, "user1"), (45, 2));
    }

    #[test]
    fn unmatched_end_as_first_event_is_zero() {
        let (summary, _) = run(&[end("12:34:56", "solo")]);

        assert_eq!(totals(&summary, "solo"), (0, 1));
    }

    #[test]
    fn unmatched_end_uses_window_start_from_any_user() {
        let events = [start("09:00:00", "alice"), end("09:05:00", "bob")];
        let (summary, _) = run(&events);

        assert_eq!(totals(&summary, "bob"), (300, 1));
        // alice's start is billed through the last event
        assert_eq!(totals(&summary, "alice"), (300, 1));
    }

    #[test]
    fn end_closes_oldest_pending_start() {
        let window = ObservationWindow {
            first: t("10:00:00"),
            last: t("10:01:00"),
        };
        let mut reconciler = Reconciler::new(window);

        assert_eq!(reconciler.ingest(&start("10:00:00", "u")), Ok(None));
        assert_eq!(reconciler.ingest(&start("10:00:10", "u")), Ok(None));
        let charge = reconciler.ingest(&end("10:00:30", "u")).unwrap().unwrap();

        assert_eq!(charge.start, t("10:00:00"));
        assert_eq!(charge.seconds, 30);
        assert_eq!(charge.kind, ChargeKind::Matched);

        let summary = reconciler.finalize(&mut Vec::<Diagnostic>::new());
        // 30s matched + 50s for the 10:00:10 start left open until 10:01:00
        assert_eq!(totals(&summary, "u"), (80, 2));
    }

    #[test]
    fn trailing_start_bills_through_last_event() {
        let events = [
            start("08:00:00", "a"),
            start("08:10:00", "b"),
            end("08:15:00", "a"),
            start("08:20:00", "a"),
        ];
        let (summary, _) = run(&events);

        // a: 900s matched, then the final start closes at itself
        assert_eq!(totals(&summary, "a"), (900, 2));
        assert_eq!(totals(&summary, "b"), (600, 1));
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let (summary, diagnostics) = run(&[]);

        assert!(summary.is_empty());
        assert_eq!(summary.window, None);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn users_ordered_by_first_charge() {
        let events = [
            start("09:00:00", "a"),
            start("09:01:00", "b"),
            end("09:02:00", "b"),
            start("09:03:00", "c"),
            end("09:04:00", "c"),
        ];
        let (summary, _) = run(&events);

        let order: Vec<&str> = summary.users.iter().map(|u| u.user.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
    }

    #[test]
    fn leftover_starts_follow_queue_creation_order() {
        let events = [
            start("09:00:00", "late"),
            start("09:01:00", "early"),
            start("09:02:00", "late"),
        ];
        let (summary, _) = run(&events);

        let order: Vec<&str> = summary.users.iter().map(|u| u.user.as_str()).collect();
        assert_eq!(order, ["late", "early"]);
        assert_eq!(totals(&summary, "late"), (120, 2));
        assert_eq!(totals(&summary, "early"), (60, 1));
    }

    #[test]
    fn window_uses_position_not_time() {
        let events = [start("10:00:00", "u"), end("11:00:00", "u"), start("09:30:00", "v")];
        let (summary, _) = run(&events);

        assert_eq!(
            summary.window,
            Some(ObservationWindow {
                first: t("10:00:00"),
                last: t("09:30:00"),
            })
        );
        assert_eq!(totals(&summary, "u"), (3600, 1));
        assert_eq!(totals(&summary, "v"), (0, 1));
    }

    #[test]
    fn out_of_order_end_is_skipped_and_start_stays_pending() {
        let events = [
            start("10:00:00", "u"),
            end("09:00:00", "u"),
            end("10:30:00", "u"),
        ];
        let (summary, diagnostics) = run(&events);

        assert_eq!(totals(&summary, "u"), (1800, 1));
        assert_eq!(
            diagnostics,
            [Diagnostic::EventSkipped(SkipReason::OutOfOrder {
                user: UserId::new("u").unwrap(),
                start: t("10:00:00"),
                end: t("09:00:00"),
            })]
        );
    }

    #[test]
    fn out_of_order_window_skips_both_unmatched_sides() {
        let events = [start("10:00:00", "a"), end("09:59:00", "b")];
        let (summary, diagnostics) = run(&events);

        assert!(summary.is_empty());
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| matches!(d, Diagnostic::EventSkipped(SkipReason::OutOfOrder { .. })))
        );
    }

    #[test]
    fn skip_reason_message() {
        let reason = SkipReason::OutOfOrder {
            user: UserId::new("u").unwrap(),
            start: t("10:00:00"),
            end: t("09:00:00"),
        };
        assert_eq!(
            reason.to_string(),
            "session for u would end at 09:00:00 before it starts at 10:00:00"
        );
    }

    fn ordered_events() -> impl Strategy<Value = Vec<Event>> {
        prop::collection::vec((0u32..86_400, 0usize..3, any::<bool>()), 1..40).prop_map(
            |mut raw| {
                raw.sort_by_key(|(secs, _, _)| *secs);
                raw.into_iter()
                    .map(|(secs, user, is_start)| {
                        let timestamp = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
                            .expect("seconds within a day");
                        let user = UserId::new(format!("user{user}")).unwrap();
                        let action = if is_start {
                            SessionAction::Start
                        } else {
                            SessionAction::End
                        };
                        Event::new(timestamp, user, action)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn ordered_input_stays_within_window(events in ordered_events()) {
            let window = ObservationWindow::from_events(&events).unwrap();
            let span = u64::try_from(window.last.signed_duration_since(window.first).num_seconds())
                .unwrap();

            let mut reconciler = Reconciler::new(window);
            let mut matched = 0u64;
            for event in &events {
                let charge = reconciler.ingest(event);
                prop_assert!(charge.is_ok());
                if let Ok(Some(charge)) = charge {
                    prop_assert!(charge.seconds <= span);
                    if charge.kind == ChargeKind::Matched {
                        matched += 1;
                    }
                }
            }

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            let summary = reconciler.finalize(&mut diagnostics);
            prop_assert!(diagnostics.is_empty());

            for totals in &summary.users {
                prop_assert!(totals.session_count > 0);
                prop_assert!(totals.total_seconds <= totals.session_count * span);
            }

            // every End bills once; every Start bills once unless an End closed it
            let event_count = events.len() as u64;
            let sessions: u64 = summary.users.iter().map(|u| u.session_count).sum();
            prop_assert_eq!(sessions, event_count - matched);
        }
    }
}
