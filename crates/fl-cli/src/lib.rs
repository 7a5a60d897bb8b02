//! Focus logger CLI library.
//!
//! This crate provides the `fl` command-line interface over the event store
//! and the session reconstructor.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, ExportFormat, RecordEvent};
pub use config::Config;
