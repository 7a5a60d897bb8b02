//! Analyze command: rebuilds sessions and exports them.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fl_core::{
    AggregationReport, AggregationTrigger, CancelToken, Reconstructor, Session, TracingSink,
};
use fl_store::EventStore;
use fs2::FileExt;

use crate::{Config, ExportFormat};

/// Returns the path to the analysis lock file within the given data directory.
fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".analyze.lock")
}

/// Holds the cross-process analysis lock until dropped.
#[derive(Debug)]
pub struct AnalyzeLock(File);

impl AnalyzeLock {
    /// Takes the lock without waiting; fails if another `fl` process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let file = File::create(lock_path(data_dir)).context("failed to create lock file")?;
        if file.try_lock_exclusive().is_err() {
            anyhow::bail!("another analysis is already running");
        }
        Ok(Self(file))
    }
}

impl Drop for AnalyzeLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// Runs one aggregation pass over `store`.
pub fn reconstruct(store: EventStore, config: &Config, carry: bool) -> Result<AggregationReport> {
    let _lock = AnalyzeLock::acquire(store.dir())?;

    let reconstructor = Reconstructor::new(config.reconstruct_config(carry), Arc::new(TracingSink));
    let trigger = AggregationTrigger::new(store, reconstructor);
    let cancel = config
        .analyze_timeout()
        .map_or_else(CancelToken::new, CancelToken::with_timeout);

    trigger.run_now(&cancel).context("aggregation failed")
}

/// Writes sessions in the requested format.
pub fn write_sessions<W: Write>(
    mut writer: W,
    sessions: &[Session],
    format: ExportFormat,
) -> Result<()> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, sessions)
                .context("failed to write sessions as JSON")?;
            writeln!(writer)?;
            writer.flush()?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(writer);
            for session in sessions {
                writer
                    .serialize(session)
                    .context("failed to write session as CSV")?;
            }
            if sessions.is_empty() {
                writer.write_record(["exe_name", "window_title", "start_time", "end_time", "date"])?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Writes a short human-readable account of the pass.
pub fn write_summary<W: Write>(writer: &mut W, report: &AggregationReport) -> Result<()> {
    writeln!(
        writer,
        "{} sessions from {} partitions",
        report.sessions.len(),
        report.partitions_scanned
    )?;
    if report.guard_trips > 0 {
        writeln!(writer, "Ignored {} out-of-order idle spans", report.guard_trips)?;
    }
    if report.backwards_focus > 0 {
        writeln!(writer, "Dropped {} sessions at out-of-order focus changes", report.backwards_focus)?;
    }
    if report.discarded_open > 0 {
        writeln!(writer, "Left {} unfinished sessions out", report.discarded_open)?;
    }
    if !report.failures.is_empty() {
        writeln!(writer, "Skipped:")?;
        for failure in &report.failures {
            writeln!(writer, "- {failure}")?;
        }
    }
    if report.cancelled {
        writeln!(writer, "Stopped early; results are partial.")?;
    }
    Ok(())
}

/// Runs the pass and writes sessions to `output` (or `stdout`) and a summary to `status`.
pub fn run<W: Write, S: Write>(
    stdout: W,
    status: &mut S,
    store: EventStore,
    config: &Config,
    format: ExportFormat,
    output: Option<&Path>,
    carry: bool,
) -> Result<()> {
    let report = reconstruct(store, config, carry)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_sessions(std::io::BufWriter::new(file), &report.sessions, format)?;
        }
        None => write_sessions(stdout, &report.sessions, format)?,
    }

    write_summary(status, &report)
}
