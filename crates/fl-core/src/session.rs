//! Focus sessions reconstructed from raw events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{DayZone, epoch_seconds, format_day};

/// One continuous period during which a window held the foreground.
///
/// This is the record handed to the chart sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub exe_name: String,
    pub window_title: String,
    #[serde(with = "epoch_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "epoch_seconds")]
    pub end_time: DateTime<Utc>,
    /// Day of `start_time` as `YYYY/MM/DD`.
    pub date: String,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// A session that has started but not yet been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub exe_name: String,
    pub window_title: String,
    pub start_time: DateTime<Utc>,
}

impl OpenSession {
    /// Closes the session at `end_time`, keying it by the day it started.
    pub fn close(self, end_time: DateTime<Utc>, zone: DayZone) -> Session {
        Session {
            date: format_day(zone.day_of(self.start_time)),
            exe_name: self.exe_name,
            window_title: self.window_title,
            start_time: self.start_time,
            end_time,
        }
    }
}
