//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use fl_core::time::parse_epoch_seconds;
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(second|minute|hour|day|week)s?\s+ago$").unwrap()
});

/// Upper bound for relative times (~1000 years in seconds).
const MAX_RELATIVE_SECONDS: i64 = 1000 * 365 * 24 * 60 * 60;

/// Parses a command-line timestamp.
///
/// Supports:
/// - RFC 3339: "2013-04-20T18:20:00Z"
/// - Epoch seconds, as written in partition files: "1366482000.25"
/// - Relative: "30 seconds ago", "5 minutes ago", "2 hours ago", "1 day ago"
pub fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_timestamp_at(s, Utc::now())
}

fn parse_timestamp_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = parse_epoch_seconds(s) {
        return Ok(dt);
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "invalid timestamp: {s}. Use RFC 3339 (e.g. 2013-04-20T18:20:00Z), epoch seconds, or relative (e.g. '5 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let seconds_per_unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 60 * 60,
        "day" => 24 * 60 * 60,
        "week" => 7 * 24 * 60 * 60,
        unit => anyhow::bail!("unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_SECONDS / seconds_per_unit {
        anyhow::bail!("relative time too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::seconds(n * seconds_per_unit))
}

/// Formats minutes as `1h 05m` or `7m`.
#[allow(clippy::cast_possible_truncation)]
pub fn format_minutes(minutes: f64) -> String {
    if minutes <= 0.0 {
        return "0m".to_string();
    }
    let total = minutes.round() as i64;
    let (hours, minutes) = (total / 60, total % 60);
    if hours >= 1 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}
