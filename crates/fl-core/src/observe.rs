//! Turns raw poller samples into events.
//!
//! The poller samples the foreground window and the time since last input
//! about once a second. Most samples change nothing; [`Observer`] keeps the
//! little state needed to emit an event only when something did.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::event::RawEvent;
use crate::time::epoch_seconds;

/// Default idle threshold: 3 minutes without input.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(3 * 60);

/// One poller sample.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Observation {
    /// When the sample was taken.
    #[serde(with = "epoch_seconds")]
    pub at: DateTime<Utc>,
    pub exe_name: String,
    pub window_title: String,
    /// Milliseconds since the last keyboard or mouse input.
    #[serde(default)]
    pub idle_ms: u64,
}

/// Folds samples into focus changes and idle spans.
#[derive(Debug, Clone)]
pub struct Observer {
    idle_threshold: Duration,
    last_window: Option<(String, String)>,
    idle_since: Option<DateTime<Utc>>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD)
    }
}

impl Observer {
    pub const fn new(idle_threshold: Duration) -> Self {
        Self {
            idle_threshold,
            last_window: None,
            idle_since: None,
        }
    }

    /// True while the user is past the idle threshold.
    pub const fn is_idle(&self) -> bool {
        self.idle_since.is_some()
    }

    /// Feeds one sample, returning the events to append (at most two).
    ///
    /// - When idle time first exceeds the threshold the sample time is noted;
    ///   when it drops back below, an idle span from that time to this sample
    ///   is emitted.
    /// - A focus change is emitted when the (exe, title) pair differs from the
    ///   previous sample.
    ///
    /// When one sample yields both, the idle span comes first so the window
    /// that was focused while idle closes at the idle start.
    pub fn observe(&mut self, observation: Observation) -> Vec<RawEvent> {
        let mut events = Vec::new();
        let idle = Duration::from_millis(observation.idle_ms);

        match self.idle_since {
            None if idle > self.idle_threshold => {
                tracing::debug!(at = %observation.at, "idle threshold crossed");
                self.idle_since = Some(observation.at);
            }
            Some(since) if idle < self.idle_threshold => {
                events.push(RawEvent::idle(since, observation.at));
                self.idle_since = None;
            }
            _ => {}
        }

        let changed = self.last_window.as_ref().is_none_or(|(exe, title)| {
            *exe != observation.exe_name || *title != observation.window_title
        });
        if changed {
            events.push(RawEvent::focus(
                observation.exe_name.clone(),
                observation.window_title.clone(),
                observation.at,
            ));
            self.last_window = Some((observation.exe_name, observation.window_title));
        }

        events
    }
}
