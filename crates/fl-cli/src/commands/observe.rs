//! Observe command: folds poller samples from stdin into logged events.
//!
//! Each input line is one JSON sample:
//!
//! ```json
//! {"at": 1366482000.5, "exe_name": "firefox.exe", "window_title": "Inbox", "idle_ms": 0}
//! ```
//!
//! Bad lines and failed appends are logged and skipped; the loop only stops
//! at end of input.

use std::io::BufRead;

use anyhow::{Context, Result};
use fl_core::{DayZone, Observation, Observer};
use fl_store::EventStore;

/// What one observe run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveSummary {
    pub samples: usize,
    pub malformed: usize,
    pub written: usize,
    pub dropped: usize,
}

pub fn run<R: BufRead>(
    reader: R,
    store: &EventStore,
    observer: &mut Observer,
    zone: DayZone,
) -> Result<ObserveSummary> {
    let mut summary = ObserveSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read observation")?;
        if line.trim().is_empty() {
            continue;
        }

        let observation: Observation = match serde_json::from_str(&line) {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed observation");
                summary.malformed += 1;
                continue;
            }
        };
        summary.samples += 1;

        for event in observer.observe(observation) {
            // The store has already reported the failure; keep polling.
            if store.append_now(&event, zone).is_ok() {
                summary.written += 1;
            } else {
                summary.dropped += 1;
            }
        }
    }

    tracing::info!(
        samples = summary.samples,
        written = summary.written,
        dropped = summary.dropped,
        malformed = summary.malformed,
        "observation input closed"
    );
    Ok(summary)
}
