//! Raw activity events as recorded by the poller.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single observation persisted to a day partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// The foreground window changed; `start_time` is when it gained focus.
    FocusChange {
        exe_name: String,
        window_title: String,
        start_time: DateTime<Utc>,
    },
    /// No input was seen between `idle_start` and `idle_end`.
    IdleSpan {
        idle_start: DateTime<Utc>,
        idle_end: DateTime<Utc>,
    },
}

impl RawEvent {
    /// Creates a focus-change event.
    pub fn focus(
        exe_name: impl Into<String>,
        window_title: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self::FocusChange {
            exe_name: exe_name.into(),
            window_title: window_title.into(),
            start_time,
        }
    }

    /// Creates an idle-span event.
    pub const fn idle(idle_start: DateTime<Utc>, idle_end: DateTime<Utc>) -> Self {
        Self::IdleSpan {
            idle_start,
            idle_end,
        }
    }

    /// The row discriminator for this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::FocusChange { .. } => EventKind::WindowInfo,
            Self::IdleSpan { .. } => EventKind::IdleTime,
        }
    }

    /// When the poller wrote this event.
    ///
    /// Focus changes are written as soon as they are seen; idle spans are
    /// written once input resumes, so their end time is the write time.
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::FocusChange { start_time, .. } => *start_time,
            Self::IdleSpan { idle_end, .. } => *idle_end,
        }
    }
}

/// The first field of a partition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WindowInfo,
    IdleTime,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WindowInfo => "window_info",
            Self::IdleTime => "idle_time",
        }
    }

    /// Minimum number of fields a row of this kind carries, discriminator included.
    #[must_use]
    pub const fn field_count(&self) -> usize {
        match self {
            Self::WindowInfo => 4,
            Self::IdleTime => 3,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "window_info" => Ok(Self::WindowInfo),
            "idle_time" => Ok(Self::IdleTime),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

/// Error type for unknown row discriminators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind: {0:?}")]
pub struct UnknownEventKind(pub String);

/// A partition row that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct RowError {
    /// 1-based line number within the partition file.
    pub line: u64,
    pub reason: String,
}
