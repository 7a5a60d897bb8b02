//! Replay state machine.
//!
//! Replay carries at most one pending session. Each event moves the machine
//! between two states:
//!
//! - `Idle`: nothing pending. A focus change opens a session; an idle span is
//!   ignored because there is nothing to close.
//! - `Open`: one pending session. A focus change closes it at the new start
//!   and opens the next one. An idle span closes it at `idle_start`, unless
//!   `idle_start` is earlier than the pending start, in which case the span is
//!   ignored and the session stays open (the corruption guard).
//!
//! Replay trusts file order; events are never re-sorted by timestamp.

use chrono::{DateTime, Utc};

use crate::event::RawEvent;
use crate::session::{OpenSession, Session};
use crate::time::DayZone;

/// Replay state between two events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplayState {
    #[default]
    Idle,
    Open(OpenSession),
}

/// What a single transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A session was opened from `Idle`.
    Opened,
    /// The pending session was closed (and, for a focus change, a new one opened).
    Closed(Session),
    /// An idle span arrived with nothing pending.
    UnopenedIdle,
    /// An idle span started before the pending session; the session stays open.
    GuardTripped {
        idle_start: DateTime<Utc>,
        pending_start: DateTime<Utc>,
    },
    /// A focus change started before the pending session. The pending session
    /// cannot be closed without running backwards, so it is dropped and the
    /// new one opened.
    BackwardsFocus {
        start_time: DateTime<Utc>,
        pending_start: DateTime<Utc>,
    },
}

impl ReplayState {
    /// Applies one event, returning the next state and what happened.
    pub fn apply(self, event: RawEvent, zone: DayZone) -> (Self, Step) {
        match (self, event) {
            (
                Self::Idle,
                RawEvent::FocusChange {
                    exe_name,
                    window_title,
                    start_time,
                },
            ) => (
                Self::Open(OpenSession {
                    exe_name,
                    window_title,
                    start_time,
                }),
                Step::Opened,
            ),

            (
                Self::Open(pending),
                RawEvent::FocusChange {
                    exe_name,
                    window_title,
                    start_time,
                },
            ) => {
                let next = Self::Open(OpenSession {
                    exe_name,
                    window_title,
                    start_time,
                });
                if start_time < pending.start_time {
                    let step = Step::BackwardsFocus {
                        start_time,
                        pending_start: pending.start_time,
                    };
                    return (next, step);
                }
                (next, Step::Closed(pending.close(start_time, zone)))
            }

            (Self::Idle, RawEvent::IdleSpan { .. }) => (Self::Idle, Step::UnopenedIdle),

            (Self::Open(pending), RawEvent::IdleSpan { idle_start, .. }) => {
                if idle_start < pending.start_time {
                    let step = Step::GuardTripped {
                        idle_start,
                        pending_start: pending.start_time,
                    };
                    return (Self::Open(pending), step);
                }
                (Self::Idle, Step::Closed(pending.close(idle_start, zone)))
            }
        }
    }

    /// Returns the pending session, if any.
    pub const fn pending(&self) -> Option<&OpenSession> {
        match self {
            Self::Idle => None,
            Self::Open(pending) => Some(pending),
        }
    }
}

/// Counters for the non-emitting transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayTally {
    pub guard_trips: usize,
    pub unopened_idle: usize,
    pub backwards_focus: usize,
}

/// Result of replaying a run of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    pub sessions: Vec<Session>,
    /// State after the last event; an `Open` session here has no end yet.
    pub state: ReplayState,
    pub tally: ReplayTally,
}

/// Replays `events` in order starting from `state`.
///
/// `on_step` sees every transition, e.g. to report guard trips.
pub fn replay<I, F>(events: I, state: ReplayState, zone: DayZone, mut on_step: F) -> Replay
where
    I: IntoIterator<Item = RawEvent>,
    F: FnMut(&Step),
{
    events.into_iter().fold(
        Replay {
            state,
            ..Replay::default()
        },
        |mut acc, event| {
            let (state, step) = acc.state.apply(event, zone);
            on_step(&step);
            acc.state = state;
            match step {
                Step::Closed(session) => acc.sessions.push(session),
                Step::GuardTripped { .. } => acc.tally.guard_trips += 1,
                Step::UnopenedIdle => acc.tally.unopened_idle += 1,
                Step::BackwardsFocus { .. } => acc.tally.backwards_focus += 1,
                Step::Opened => {}
            }
            acc
        },
    )
}
