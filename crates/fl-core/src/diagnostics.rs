//! Diagnostics sink injected into the store and the reconstructor.
//!
//! Components report notable conditions here instead of logging directly, so
//! callers decide where they go. [`TracingSink`] forwards to `tracing`;
//! [`CollectingSink`] keeps them in memory.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Something worth surfacing that happened while appending or replaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An event could not be written and was dropped.
    AppendFailed { partition: String, error: String },

    /// A whole partition could not be read.
    PartitionUnreadable { partition: String, error: String },

    /// A row could not be decoded and was skipped.
    RowSkipped {
        partition: String,
        line: u64,
        reason: String,
    },

    /// An idle span started before the pending session and was ignored.
    GuardTripped {
        partition: String,
        idle_start: DateTime<Utc>,
        pending_start: DateTime<Utc>,
    },

    /// A focus change started before the pending session; the pending session was dropped.
    BackwardsFocus {
        partition: String,
        start_time: DateTime<Utc>,
        pending_start: DateTime<Utc>,
    },

    /// A session was still open when replay stopped and was not emitted.
    OpenSessionDiscarded {
        partition: String,
        exe_name: String,
        start_time: DateTime<Utc>,
    },
}

/// Receives diagnostics. Must be shareable across replay threads.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::AppendFailed { partition, error } => {
                tracing::error!(partition = %partition, error = %error, "event append failed, event dropped");
            }
            Diagnostic::PartitionUnreadable { partition, error } => {
                tracing::error!(partition = %partition, error = %error, "partition unreadable, skipping");
            }
            Diagnostic::RowSkipped {
                partition,
                line,
                reason,
            } => {
                tracing::warn!(partition = %partition, line, reason = %reason, "skipping malformed row");
            }
            Diagnostic::GuardTripped {
                partition,
                idle_start,
                pending_start,
            } => {
                tracing::debug!(
                    partition = %partition,
                    %idle_start,
                    %pending_start,
                    "idle span precedes pending session, ignoring"
                );
            }
            Diagnostic::BackwardsFocus {
                partition,
                start_time,
                pending_start,
            } => {
                tracing::warn!(
                    partition = %partition,
                    %start_time,
                    %pending_start,
                    "focus change precedes pending session, dropping pending session"
                );
            }
            Diagnostic::OpenSessionDiscarded {
                partition,
                exe_name,
                start_time,
            } => {
                tracing::debug!(
                    partition = %partition,
                    exe_name = %exe_name,
                    %start_time,
                    "discarding session with no end"
                );
            }
        }
    }
}

/// Records diagnostics in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Returns a copy of everything reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::default();
        sink.report(&Diagnostic::RowSkipped {
            partition: "2013-04-20".to_string(),
            line: 3,
            reason: "bad".to_string(),
        });
        sink.report(&Diagnostic::PartitionUnreadable {
            partition: "2013-04-21".to_string(),
            error: "denied".to_string(),
        });

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], Diagnostic::RowSkipped { line: 3, .. }));
        assert!(matches!(
            entries[1],
            Diagnostic::PartitionUnreadable { .. }
        ));
    }
}
