//! Per-day time totals for the chart, with window-title search.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::session::Session;
use crate::time::{format_day, parse_day};

/// Minutes spent in matching windows on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    /// `YYYY/MM/DD`, matching `Session::date`.
    pub date: String,
    pub minutes: f64,
}

/// A contiguous run of days from the first to the last match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    /// Lowercased search tokens; empty means every session matched.
    pub tokens: Vec<String>,
    pub matched_sessions: usize,
    pub days: Vec<DayTotal>,
}

impl DailySeries {
    pub fn total_minutes(&self) -> f64 {
        self.days.iter().map(|d| d.minutes).sum()
    }
}

/// Splits a query into lowercase tokens, dropping empties.
pub fn query_tokens(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// True if the title contains any token, case-insensitively. No tokens matches all.
pub fn title_matches(title: &str, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    tokens.iter().any(|t| title.contains(t.as_str()))
}

/// Sums session time per day for sessions whose title matches `query`.
///
/// Days between the first and last match with no matching time are filled
/// with zero. Each session counts once even if several tokens match it.
/// Returns `None` when nothing matches.
#[allow(clippy::cast_precision_loss)]
pub fn daily_minutes(sessions: &[Session], query: &str) -> Option<DailySeries> {
    let tokens = query_tokens(query);
    let mut per_day: BTreeMap<NaiveDate, Duration> = BTreeMap::new();
    let mut matched_sessions = 0;

    for session in sessions {
        if !title_matches(&session.window_title, &tokens) {
            continue;
        }
        let Some(day) = parse_day(&session.date) else {
            tracing::warn!(date = %session.date, "skipping session with unparseable date");
            continue;
        };
        matched_sessions += 1;
        *per_day.entry(day).or_insert_with(Duration::zero) += session.duration();
    }

    let (&first, _) = per_day.first_key_value()?;
    let (&last, _) = per_day.last_key_value()?;

    let days = first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| {
            let millis = per_day.get(&day).map_or(0, Duration::num_milliseconds);
            DayTotal {
                date: format_day(day),
                minutes: millis as f64 / 60_000.0,
            }
        })
        .collect();

    Some(DailySeries {
        tokens,
        matched_sessions,
        days,
    })
}
