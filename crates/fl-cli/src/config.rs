//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use fl_core::observe::DEFAULT_IDLE_THRESHOLD;
use fl_core::{DayZone, ReconstructConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the day partition files.
    pub data_dir: PathBuf,

    /// Which clock decides the calendar day of an event.
    pub day_zone: DayZone,

    /// Seconds without input before the user counts as idle.
    pub idle_threshold_secs: u64,

    /// Carry a session left open at the end of one day into the next.
    pub carry_pending_across_days: bool,

    /// Give up on an analysis pass after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs_data_path().unwrap_or_else(|| PathBuf::from(".")),
            day_zone: DayZone::default(),
            idle_threshold_secs: DEFAULT_IDLE_THRESHOLD.as_secs(),
            carry_pending_across_days: false,
            analyze_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// then `FL_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("FL_"));

        figment.extract()
    }

    pub const fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn analyze_timeout(&self) -> Option<Duration> {
        self.analyze_timeout_secs.map(Duration::from_secs)
    }

    /// Reconstruction settings; `carry` forces carrying on for this run.
    pub const fn reconstruct_config(&self, carry: bool) -> ReconstructConfig {
        ReconstructConfig {
            day_zone: self.day_zone,
            carry_pending_across_days: carry || self.carry_pending_across_days,
        }
    }
}

/// Returns the platform-specific config directory for fl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("focuslog"))
}

/// Returns the platform-specific data directory for fl.
///
/// On Linux: `~/.local/share/focuslog`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("focuslog"))
}
