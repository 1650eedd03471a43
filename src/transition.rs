//! Ticket status state machine.
//!
//! | From        | Allowed to                               |
//! |-------------|------------------------------------------|
//! | OPEN        | IN_PROGRESS, PENDING, CLOSED             |
//! | IN_PROGRESS | PENDING, RESOLVED, CLOSED                |
//! | PENDING     | IN_PROGRESS, RESOLVED, CLOSED            |
//! | RESOLVED    | CLOSED, REOPENED                         |
//! | CLOSED      | REOPENED                                 |
//! | REOPENED    | IN_PROGRESS, PENDING, RESOLVED, CLOSED   |
//!
//! Moving to the current status is not a transition at all.

use std::error::Error as StdError;

use derive_more::Display;

use crate::db::ticket::Status;

pub fn allowed_targets(from: Status) -> &'static [Status] {
    use Status as S;

    match from {
        S::Open => &[S::InProgress, S::Pending, S::Closed],
        S::InProgress => &[S::Pending, S::Resolved, S::Closed],
        S::Pending => &[S::InProgress, S::Resolved, S::Closed],
        S::Resolved => &[S::Closed, S::Reopened],
        S::Closed => &[S::Reopened],
        S::Reopened => &[S::InProgress, S::Pending, S::Resolved, S::Closed],
    }
}

pub fn can_transition(from: Status, to: Status) -> bool {
    allowed_targets(from).contains(&to)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    Unchanged,
    Moved { from: Status, to: Status },
}

/// Validates a requested status change.
pub fn apply_transition(
    from: Status,
    to: Status,
) -> Result<Transition, InvalidTransition> {
    if from == to {
        Ok(Transition::Unchanged)
    } else if can_transition(from, to) {
        Ok(Transition::Moved { from, to })
    } else {
        Err(InvalidTransition { from, to })
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display("cannot move ticket from {from} to {to}")]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
}

impl StdError for InvalidTransition {}
