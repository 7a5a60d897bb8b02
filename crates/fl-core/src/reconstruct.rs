//! Session reconstruction across day partitions.
//!
//! # Algorithm
//!
//! 1. List partitions from the [`EventSource`] in day order.
//! 2. Read each partition and replay its rows in file order (see
//!    [`crate::replay`]). Undecodable rows are reported and skipped.
//! 3. By default each partition starts from `Idle` and any session still open
//!    at its end is discarded. With `carry_pending_across_days` the state flows
//!    into the next partition instead, and only the final open session is
//!    discarded.
//! 4. An unreadable partition is reported and skipped; the pass continues.
//!
//! Independent partitions are read in parallel; output order is always
//! partition order, then file order.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::event::{RawEvent, RowError};
use crate::replay::{Replay, ReplayState, ReplayTally, Step, replay};
use crate::session::Session;
use crate::time::DayZone;

/// A partitioned store of raw events the reconstructor can read from.
///
/// Implemented by the file store, and by in-memory fixtures in tests.
pub trait EventSource: Sync {
    /// Identifies one partition; its `Display` form is used in diagnostics.
    type Partition: fmt::Display + Sync;

    /// Store-level failure (listing or reading a whole partition).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists partitions in chronological order.
    fn list_partitions(&self) -> Result<Vec<Self::Partition>, Self::Error>;

    /// Reads one partition's rows in file order.
    fn read_partition(
        &self,
        partition: &Self::Partition,
    ) -> Result<Vec<Result<RawEvent, RowError>>, Self::Error>;
}

/// Fatal reconstruction errors. Everything else is contained in the report.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// The store could not be listed at all.
    #[error("event store unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Reconstruction settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructConfig {
    /// Zone used for session dates.
    pub day_zone: DayZone,

    /// Thread the pending session from one day's partition into the next.
    /// Default: false (each partition is replayed on its own).
    pub carry_pending_across_days: bool,
}

/// What went wrong with a partition or a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Row,
}

/// A skipped partition or row, kept for diagnostic output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub partition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}: {}", self.partition, self.message),
            None => write!(f, "{}: {}", self.partition, self.message),
        }
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    /// Reconstructed sessions, in partition then file order.
    pub sessions: Vec<Session>,
    pub failures: Vec<Failure>,
    /// Partitions that were read successfully.
    pub partitions_scanned: usize,
    pub guard_trips: usize,
    pub unopened_idle: usize,
    pub backwards_focus: usize,
    /// Sessions left open at the end of replay and not emitted.
    pub discarded_open: usize,
    /// The pass stopped early; `sessions` is partial.
    pub cancelled: bool,
}

impl AggregationReport {
    /// True when nothing was skipped for I/O, decoding, or cancellation.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    fn absorb(&mut self, sessions: Vec<Session>, failures: Vec<Failure>, tally: ReplayTally) {
        self.partitions_scanned += 1;
        self.sessions.extend(sessions);
        self.failures.extend(failures);
        self.guard_trips += tally.guard_trips;
        self.unopened_idle += tally.unopened_idle;
        self.backwards_focus += tally.backwards_focus;
    }
}

/// Per-partition result of the parallel pass.
enum PartitionOutcome {
    Replayed {
        replay: Replay,
        failures: Vec<Failure>,
        discarded: usize,
    },
    Unreadable(Failure),
    Cancelled,
}

/// Replays an [`EventSource`] into sessions.
pub struct Reconstructor {
    config: ReconstructConfig,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Reconstructor {
    pub fn new(config: ReconstructConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            diagnostics,
        }
    }

    /// Runs a full pass over `source`.
    ///
    /// Only a failure to list partitions is an error; anything narrower is
    /// recorded in the report and the pass continues.
    pub fn run<S: EventSource>(
        &self,
        source: &S,
        cancel: &CancelToken,
    ) -> Result<AggregationReport, ReconstructError> {
        let partitions = source
            .list_partitions()
            .map_err(|e| ReconstructError::Unavailable(Box::new(e)))?;

        tracing::debug!(
            partitions = partitions.len(),
            carry = self.config.carry_pending_across_days,
            "replaying partitions"
        );

        let report = if self.config.carry_pending_across_days {
            self.run_carried(source, &partitions, cancel)
        } else {
            self.run_independent(source, &partitions, cancel)
        };

        tracing::debug!(
            sessions = report.sessions.len(),
            failures = report.failures.len(),
            guard_trips = report.guard_trips,
            discarded_open = report.discarded_open,
            cancelled = report.cancelled,
            "replay complete"
        );

        Ok(report)
    }

    fn run_independent<S: EventSource>(
        &self,
        source: &S,
        partitions: &[S::Partition],
        cancel: &CancelToken,
    ) -> AggregationReport {
        let outcomes: Vec<PartitionOutcome> = partitions
            .par_iter()
            .map(|partition| {
                if cancel.is_cancelled() {
                    return PartitionOutcome::Cancelled;
                }
                let name = partition.to_string();
                match source.read_partition(partition) {
                    Ok(rows) => {
                        let (replay, failures) = self.replay_rows(&name, rows, ReplayState::Idle);
                        let discarded = self.discard_open(&name, &replay.state);
                        PartitionOutcome::Replayed {
                            replay,
                            failures,
                            discarded,
                        }
                    }
                    Err(e) => PartitionOutcome::Unreadable(self.partition_failed(&name, &e)),
                }
            })
            .collect();

        let mut report = AggregationReport::default();
        for outcome in outcomes {
            match outcome {
                PartitionOutcome::Replayed {
                    replay,
                    failures,
                    discarded,
                } => {
                    report.absorb(replay.sessions, failures, replay.tally);
                    report.discarded_open += discarded;
                }
                PartitionOutcome::Unreadable(failure) => report.failures.push(failure),
                PartitionOutcome::Cancelled => report.cancelled = true,
            }
        }
        report
    }

    fn run_carried<S: EventSource>(
        &self,
        source: &S,
        partitions: &[S::Partition],
        cancel: &CancelToken,
    ) -> AggregationReport {
        let mut report = AggregationReport::default();
        let mut state = ReplayState::Idle;
        let mut last_name = String::new();

        for partition in partitions {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let name = partition.to_string();
            match source.read_partition(partition) {
                Ok(rows) => {
                    let (replay, failures) = self.replay_rows(&name, rows, state);
                    state = replay.state;
                    report.absorb(replay.sessions, failures, replay.tally);
                }
                Err(e) => {
                    report.failures.push(self.partition_failed(&name, &e));
                    // A missing day breaks continuity; don't close across it.
                    report.discarded_open += self.discard_open(&last_name, &state);
                    state = ReplayState::Idle;
                }
            }
            last_name = name;
        }

        report.discarded_open += self.discard_open(&last_name, &state);
        report
    }

    /// Replays one partition's rows, reporting skipped rows and guard trips.
    fn replay_rows(
        &self,
        partition: &str,
        rows: Vec<Result<RawEvent, RowError>>,
        state: ReplayState,
    ) -> (Replay, Vec<Failure>) {
        let mut failures = Vec::new();
        let events = rows.into_iter().filter_map(|row| match row {
            Ok(event) => Some(event),
            Err(err) => {
                self.diagnostics.report(&Diagnostic::RowSkipped {
                    partition: partition.to_string(),
                    line: err.line,
                    reason: err.reason.clone(),
                });
                failures.push(Failure {
                    partition: partition.to_string(),
                    line: Some(err.line),
                    kind: FailureKind::Row,
                    message: err.reason,
                });
                None
            }
        });

        let replay = replay(events, state, self.config.day_zone, |step| {
            self.report_step(partition, step);
        });
        (replay, failures)
    }

    fn report_step(&self, partition: &str, step: &Step) {
        let diagnostic = match step {
            Step::GuardTripped {
                idle_start,
                pending_start,
            } => Diagnostic::GuardTripped {
                partition: partition.to_string(),
                idle_start: *idle_start,
                pending_start: *pending_start,
            },
            Step::BackwardsFocus {
                start_time,
                pending_start,
            } => Diagnostic::BackwardsFocus {
                partition: partition.to_string(),
                start_time: *start_time,
                pending_start: *pending_start,
            },
            Step::Opened | Step::Closed(_) | Step::UnopenedIdle => return,
        };
        self.diagnostics.report(&diagnostic);
    }

    fn discard_open(&self, partition: &str, state: &ReplayState) -> usize {
        let Some(pending) = state.pending() else {
            return 0;
        };
        self.diagnostics.report(&Diagnostic::OpenSessionDiscarded {
            partition: partition.to_string(),
            exe_name: pending.exe_name.clone(),
            start_time: pending.start_time,
        });
        1
    }

    fn partition_failed(&self, partition: &str, error: &dyn std::error::Error) -> Failure {
        let message = error.to_string();
        self.diagnostics.report(&Diagnostic::PartitionUnreadable {
            partition: partition.to_string(),
            error: message.clone(),
        });
        Failure {
            partition: partition.to_string(),
            line: None,
            kind: FailureKind::Io,
            message,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Error)]
    #[error("{0}")]
    pub(crate) struct FixtureError(pub(crate) String);

    /// In-memory partitions; `None` rows simulate an unreadable file.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub(crate) partitions: Vec<(String, Option<Vec<Result<RawEvent, RowError>>>)>,
        pub(crate) unavailable: bool,
    }

    impl MemorySource {
        pub(crate) fn with(mut self, name: &str, rows: Vec<Result<RawEvent, RowError>>) -> Self {
            self.partitions.push((name.to_string(), Some(rows)));
            self
        }

        pub(crate) fn unreadable(mut self, name: &str) -> Self {
            self.partitions.push((name.to_string(), None));
            self
        }
    }

    impl EventSource for MemorySource {
        type Partition = String;
        type Error = FixtureError;

        fn list_partitions(&self) -> Result<Vec<String>, FixtureError> {
            if self.unavailable {
                return Err(FixtureError("directory missing".to_string()));
            }
            Ok(self.partitions.iter().map(|(name, _)| name.clone()).collect())
        }

        fn read_partition(
            &self,
            partition: &String,
        ) -> Result<Vec<Result<RawEvent, RowError>>, FixtureError> {
            self.partitions
                .iter()
                .find(|(name, _)| name == partition)
                .and_then(|(_, rows)| rows.clone())
                .ok_or_else(|| FixtureError("permission denied".to_string()))
        }
    }

    pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn focus(exe: &str, secs: i64) -> Result<RawEvent, RowError> {
        Ok(RawEvent::focus(exe, exe.to_uppercase(), ts(secs)))
    }

    fn idle(start: i64, end: i64) -> Result<RawEvent, RowError> {
        Ok(RawEvent::idle(ts(start), ts(end)))
    }

    fn bad_row(line: u64) -> Result<RawEvent, RowError> {
        Err(RowError {
            line,
            reason: "expected 4 fields, found 2".to_string(),
        })
    }

    fn reconstructor(carry: bool) -> (Reconstructor, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let config = ReconstructConfig {
            day_zone: DayZone::Utc,
            carry_pending_across_days: carry,
        };
        (Reconstructor::new(config, sink.clone()), sink)
    }

    fn spans(report: &AggregationReport) -> Vec<(&str, i64, i64)> {
        report
            .sessions
            .iter()
            .map(|s| {
                (
                    s.exe_name.as_str(),
                    s.start_time.timestamp(),
                    s.end_time.timestamp(),
                )
            })
            .collect()
    }

    #[test]
    fn parse_failure_is_isolated() {
        let source = MemorySource::default().with(
            "2013-04-20",
            vec![
                focus("a.exe", 100),
                idle(150, 200),
                bad_row(3),
                focus("b.exe", 300),
                idle(360, 400),
            ],
        );
        let (reconstructor, sink) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert_eq!(spans(&report), vec![("a.exe", 100, 150), ("b.exe", 300, 360)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Row);
        assert_eq!(report.failures[0].line, Some(3));
        assert_eq!(
            report.failures[0].to_string(),
            "2013-04-20:3: expected 4 fields, found 2"
        );
        assert!(sink.entries().contains(&Diagnostic::RowSkipped {
            partition: "2013-04-20".to_string(),
            line: 3,
            reason: "expected 4 fields, found 2".to_string(),
        }));
        assert!(!report.is_complete());
    }

    #[test]
    fn unreadable_partition_does_not_stop_others() {
        let source = MemorySource::default()
            .with("2013-04-20", vec![focus("a.exe", 100), idle(150, 200)])
            .unreadable("2013-04-21")
            .with("2013-04-22", vec![focus("c.exe", 500), focus("d.exe", 600)]);
        let (reconstructor, _) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert_eq!(spans(&report), vec![("a.exe", 100, 150), ("c.exe", 500, 600)]);
        assert_eq!(report.partitions_scanned, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Io);
        assert_eq!(report.failures[0].partition, "2013-04-21");
        assert_eq!(report.failures[0].line, None);
    }

    #[test]
    fn unavailable_store_is_fatal() {
        let source = MemorySource {
            unavailable: true,
            ..MemorySource::default()
        };
        let (reconstructor, _) = reconstructor(false);

        let err = reconstructor.run(&source, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ReconstructError::Unavailable(_)));
    }

    #[test]
    fn partitions_do_not_share_pending_by_default() {
        let source = MemorySource::default()
            .with("2013-04-20", vec![focus("a.exe", 100)])
            .with("2013-04-21", vec![idle(200, 300), focus("b.exe", 400)]);
        let (reconstructor, sink) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert!(report.sessions.is_empty());
        assert_eq!(report.discarded_open, 2);
        assert_eq!(report.unopened_idle, 1);
        let discarded = sink
            .entries()
            .into_iter()
            .filter(|d| matches!(d, Diagnostic::OpenSessionDiscarded { .. }))
            .count();
        assert_eq!(discarded, 2);
    }

    #[test]
    fn carried_pending_closes_in_next_partition() {
        let source = MemorySource::default()
            .with("2013-04-20", vec![focus("a.exe", 100)])
            .with("2013-04-21", vec![idle(200, 300), focus("b.exe", 400)]);
        let (reconstructor, _) = reconstructor(true);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert_eq!(spans(&report), vec![("a.exe", 100, 200)]);
        assert_eq!(report.discarded_open, 1);
        assert_eq!(report.partitions_scanned, 2);
    }

    #[test]
    fn carried_pending_does_not_cross_unreadable_day() {
        let source = MemorySource::default()
            .with("2013-04-20", vec![focus("a.exe", 100)])
            .unreadable("2013-04-21")
            .with("2013-04-22", vec![idle(200, 300)]);
        let (reconstructor, _) = reconstructor(true);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert!(report.sessions.is_empty());
        assert_eq!(report.discarded_open, 1);
        assert_eq!(report.unopened_idle, 1);
    }

    #[test]
    fn output_follows_partition_order() {
        let mut source = MemorySource::default();
        for day in 0..20 {
            let base = day * 1000;
            source = source.with(
                &format!("day-{day:02}"),
                vec![focus("a.exe", base), idle(base + 10, base + 20)],
            );
        }
        let (reconstructor, _) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        let starts: Vec<_> = report
            .sessions
            .iter()
            .map(|s| s.start_time.timestamp())
            .collect();
        let expected: Vec<_> = (0..20).map(|day| day * 1000).collect();
        assert_eq!(starts, expected);
    }

    #[test]
    fn guard_trips_are_reported() {
        let source = MemorySource::default().with(
            "2013-04-20",
            vec![focus("a.exe", 100), idle(50, 60), focus("b.exe", 200)],
        );
        let (reconstructor, sink) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert_eq!(spans(&report), vec![("a.exe", 100, 200)]);
        assert_eq!(report.guard_trips, 1);
        assert!(report.failures.is_empty(), "guard trips are not failures");
        assert!(sink.entries().contains(&Diagnostic::GuardTripped {
            partition: "2013-04-20".to_string(),
            idle_start: ts(50),
            pending_start: ts(100),
        }));
    }

    #[test]
    fn cancelled_before_start_returns_partial_report() {
        let source = MemorySource::default()
            .with("2013-04-20", vec![focus("a.exe", 100), idle(150, 200)]);
        let cancel = CancelToken::new();
        cancel.cancel();

        for carry in [false, true] {
            let (reconstructor, _) = reconstructor(carry);
            let report = reconstructor.run(&source, &cancel).unwrap();
            assert!(report.cancelled);
            assert!(report.sessions.is_empty());
            assert!(!report.is_complete());
        }
    }

    /// Cancels the pass while the first partition is being read.
    struct CancelAfterFirstRead {
        inner: MemorySource,
        cancel: CancelToken,
    }

    impl EventSource for CancelAfterFirstRead {
        type Partition = String;
        type Error = FixtureError;

        fn list_partitions(&self) -> Result<Vec<String>, FixtureError> {
            self.inner.list_partitions()
        }

        fn read_partition(
            &self,
            partition: &String,
        ) -> Result<Vec<Result<RawEvent, RowError>>, FixtureError> {
            self.cancel.cancel();
            self.inner.read_partition(partition)
        }
    }

    #[test]
    fn cancel_mid_pass_keeps_earlier_sessions() {
        let cancel = CancelToken::new();
        let source = CancelAfterFirstRead {
            inner: MemorySource::default()
                .with("2013-04-20", vec![focus("a.exe", 0), idle(10, 20), focus("b.exe", 30)])
                .with("2013-04-21", vec![idle(90_000, 90_100)]),
            cancel: cancel.clone(),
        };
        let (reconstructor, sink) = reconstructor(true);

        let report = reconstructor.run(&source, &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(spans(&report), vec![("a.exe", 0, 10)]);
        assert_eq!(report.partitions_scanned, 1);
        assert_eq!(report.discarded_open, 1);
        assert!(sink.entries().contains(&Diagnostic::OpenSessionDiscarded {
            partition: "2013-04-20".to_string(),
            exe_name: "b.exe".to_string(),
            start_time: ts(30),
        }));
    }

    #[test]
    fn session_dates_use_configured_zone() {
        // 2013-04-20 23:50 UTC
        let source = MemorySource::default().with(
            "2013-04-20",
            vec![focus("a.exe", 1_366_501_800), idle(1_366_502_400, 1_366_503_000)],
        );
        let (reconstructor, _) = reconstructor(false);

        let report = reconstructor.run(&source, &CancelToken::new()).unwrap();

        assert_eq!(report.sessions[0].date, "2013/04/20");
    }
}
