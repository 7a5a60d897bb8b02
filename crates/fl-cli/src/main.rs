use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use fl_core::{Observer, TracingSink};
use fl_store::EventStore;
use tracing_subscriber::EnvFilter;

use fl_cli::commands::{analyze, observe, partitions, record, report, status, util};
use fl_cli::{Cli, Commands, Config, RecordEvent};

/// Load config and open the event store, creating its directory if needed.
fn open_store(config_path: Option<&Path>) -> Result<(EventStore, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let store = EventStore::open(&config.data_dir, Arc::new(TracingSink))
        .with_context(|| format!("failed to open event store at {}", config.data_dir.display()))?;
    Ok((store, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // stdout carries exported data, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (store, config) = open_store(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Record { event } => match event {
            RecordEvent::Focus { exe, title, at } => {
                let at = at
                    .as_deref()
                    .map_or_else(|| Ok(Utc::now()), util::parse_timestamp)?;
                record::focus(&store, config.day_zone, exe, title, at)?;
            }
            RecordEvent::Idle { start, end } => {
                let start = util::parse_timestamp(start)?;
                let end = util::parse_timestamp(end)?;
                record::idle(&store, config.day_zone, start, end)?;
            }
        },
        Commands::Observe => {
            let mut observer = Observer::new(config.idle_threshold());
            observe::run(io::stdin().lock(), &store, &mut observer, config.day_zone)?;
        }
        Commands::Analyze {
            format,
            output,
            carry,
        } => {
            analyze::run(
                &mut stdout,
                &mut io::stderr(),
                store,
                &config,
                *format,
                output.as_deref(),
                *carry,
            )?;
        }
        Commands::Partitions => partitions::run(&mut stdout, &store)?,
        Commands::Report { query, json } => {
            let report = analyze::reconstruct(store, &config, false)?;
            if !report.is_complete() {
                tracing::warn!(
                    failures = report.failures.len(),
                    cancelled = report.cancelled,
                    "report is based on incomplete data"
                );
            }
            report::run(
                &mut stdout,
                &report.sessions,
                query.as_deref().unwrap_or_default(),
                *json,
            )?;
        }
        Commands::Status => status::run(&mut stdout, &store, &config)?,
    }

    stdout.flush()?;
    Ok(())
}
