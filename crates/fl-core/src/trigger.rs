//! "Run aggregation now" entry point with an overlap guard.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::reconstruct::{AggregationReport, EventSource, ReconstructError, Reconstructor};

#[derive(Debug, Error)]
pub enum TriggerError {
    /// Another pass is still running on this trigger.
    #[error("aggregation already running")]
    Busy,

    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),
}

/// Owns an event source and runs at most one aggregation pass at a time.
///
/// A second call while a pass is running fails fast with
/// [`TriggerError::Busy`] instead of interleaving a second scan.
pub struct AggregationTrigger<S> {
    source: S,
    reconstructor: Reconstructor,
    busy: AtomicBool,
}

impl<S: EventSource> AggregationTrigger<S> {
    pub const fn new(source: S, reconstructor: Reconstructor) -> Self {
        Self {
            source,
            reconstructor,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs a full pass synchronously.
    pub fn run_now(&self, cancel: &CancelToken) -> Result<AggregationReport, TriggerError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            tracing::warn!("aggregation requested while another pass is running");
            return Err(TriggerError::Busy);
        };

        tracing::info!("aggregation started");
        let report = self.reconstructor.run(&self.source, cancel)?;
        tracing::info!(
            sessions = report.sessions.len(),
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "aggregation finished"
        );
        Ok(report)
    }
}

/// Clears the busy flag on drop, including on early return.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
