//! Log line validation.
//!
//! A well-formed line is `HH:MM:SS <user> <Start|End>`: exactly three
//! whitespace-separated fields after trimming. Anything else is rejected
//! with a [`LineError`] naming the first field that failed.

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

use crate::action::SessionAction;
use crate::event::Event;
use crate::types::UserId;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Why a log line was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected 3 fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid time {value:?}, expected HH:MM:SS")]
    InvalidTime { value: String },

    #[error("invalid user {value:?}, expected alphanumeric characters")]
    InvalidUser { value: String },

    #[error("unknown action {value:?}, expected Start or End")]
    UnknownAction { value: String },
}

/// Returns true if the line is a well-formed session event.
pub fn validate_line(line: &str) -> bool {
    parse_line(line).is_ok()
}

/// Parses a single log line into an [`Event`].
pub fn parse_line(line: &str) -> Result<Event, LineError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [time, user, action] = fields.as_slice() else {
        return Err(LineError::FieldCount {
            found: fields.len(),
        });
    };

    let timestamp = parse_time(time)?;
    let user = UserId::new(*user).map_err(|_| LineError::InvalidUser {
        value: (*user).to_string(),
    })?;
    let action = action
        .parse::<SessionAction>()
        .map_err(|_| LineError::UnknownAction {
            value: (*action).to_string(),
        })?;

    Ok(Event::new(timestamp, user, action))
}

/// Parses a 24-hour `HH:MM:SS` time of day.
///
/// chrono accepts `60` seconds as a leap second; wall-clock log times never
/// carry one, so it is rejected here.
fn parse_time(value: &str) -> Result<NaiveTime, LineError> {
    let invalid = || LineError::InvalidTime {
        value: value.to_string(),
    };
    let time = NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|_| invalid())?;
    if time.nanosecond() >= 1_000_000_000 {
        return Err(invalid());
    }
    Ok(time)
}
