//! Record command for appending single events by hand.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fl_core::{DayZone, RawEvent};
use fl_store::EventStore;

/// Records a focus change at `at`.
pub fn focus(
    store: &EventStore,
    zone: DayZone,
    exe: &str,
    title: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    if exe.is_empty() {
        anyhow::bail!("exe cannot be empty");
    }
    let event = RawEvent::focus(exe, title, at);
    store
        .append_now(&event, zone)
        .context("failed to record focus change")?;
    tracing::debug!(exe, at = %at, "recorded focus change");
    Ok(())
}

/// Records an idle span from `start` to `end`.
pub fn idle(store: &EventStore, zone: DayZone, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        anyhow::bail!("idle span ends ({end}) before it starts ({start})");
    }
    let event = RawEvent::idle(start, end);
    store
        .append_now(&event, zone)
        .context("failed to record idle span")?;
    tracing::debug!(start = %start, end = %end, "recorded idle span");
    Ok(())
}
