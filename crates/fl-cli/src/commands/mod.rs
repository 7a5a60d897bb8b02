//! CLI subcommand implementations.

pub mod analyze;
pub mod observe;
pub mod partitions;
pub mod record;
pub mod report;
pub mod status;
pub mod util;
