//! Status command for showing where data lives and what it covers.

use std::io::Write;

use anyhow::{Context, Result};
use fl_store::EventStore;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, store: &EventStore, config: &Config) -> Result<()> {
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
    write_status(writer, store, config, &timezone)
}

fn write_status<W: Write>(
    writer: &mut W,
    store: &EventStore,
    config: &Config,
    timezone: &str,
) -> Result<()> {
    let partitions = store
        .list_partitions()
        .context("failed to list partitions")?;

    writeln!(writer, "Focus log status")?;
    writeln!(writer, "Data: {}", store.dir().display())?;
    writeln!(writer, "Days keyed by: {} (system zone {timezone})", config.day_zone)?;
    writeln!(writer, "Idle after: {}s", config.idle_threshold_secs)?;

    match (partitions.first(), partitions.last()) {
        (Some(first), Some(last)) => {
            writeln!(writer, "Partitions: {}", partitions.len())?;
            writeln!(writer, "Covering: {} to {}", first.day, last.day)?;
        }
        _ => writeln!(writer, "No events recorded.")?,
    }

    Ok(())
}
