//! Core domain logic for the focus logger.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: the focus-change / idle-span rows the poller records
//! - Replay: the two-state machine that turns events into sessions
//! - Reconstruction: replaying a partitioned event source with error containment
//! - Observation: folding raw poller samples into events
//! - Summary: per-day totals with window-title search

mod cancel;
pub mod diagnostics;
pub mod event;
pub mod observe;
pub mod reconstruct;
pub mod replay;
pub mod session;
pub mod summary;
pub mod time;
mod trigger;

pub use cancel::CancelToken;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
pub use event::{EventKind, RawEvent, RowError, UnknownEventKind};
pub use observe::{Observation, Observer};
pub use reconstruct::{
    AggregationReport, EventSource, Failure, FailureKind, ReconstructConfig, ReconstructError,
    Reconstructor,
};
pub use replay::{ReplayState, Step};
pub use session::{OpenSession, Session};
pub use summary::{DailySeries, DayTotal, daily_minutes};
pub use time::{DayZone, TimestampError};
pub use trigger::{AggregationTrigger, TriggerError};
