//! Login-session events parsed from a log.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::action::SessionAction;
use crate::types::UserId;

/// A single well-formed log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Wall-clock time of day, second resolution.
    pub timestamp: NaiveTime,
    /// The user the event belongs to.
    pub user: UserId,
    /// Whether the session started or ended.
    pub action: SessionAction,
}

impl Event {
    pub const fn new(timestamp: NaiveTime, user: UserId, action: SessionAction) -> Self {
        Self {
            timestamp,
            user,
            action,
        }
    }
}

/// An event suitable for session reconciliation.
///
/// This trait allows reconciliation to work with different event
/// representations (e.g., parsed log lines or test fixtures).
pub trait BillableEvent {
    /// Returns the event's time of day.
    fn timestamp(&self) -> NaiveTime;

    /// Returns the user the event belongs to.
    fn user(&self) -> &UserId;

    /// Returns whether this event starts or ends a session.
    fn action(&self) -> SessionAction;
}

impl BillableEvent for Event {
    fn timestamp(&self) -> NaiveTime {
        self.timestamp
    }

    fn user(&self) -> &UserId {
        &self.user
    }

    fn action(&self) -> SessionAction {
        self.action
    }
}
