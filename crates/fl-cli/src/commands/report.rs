//! Report command: minutes per day, optionally filtered by window title.

use std::io::Write;

use anyhow::{Context, Result};
use fl_core::summary::query_tokens;
use fl_core::{DailySeries, Session, daily_minutes};

use super::util::format_minutes;

pub fn run<W: Write>(writer: &mut W, sessions: &[Session], query: &str, json: bool) -> Result<()> {
    let series = daily_minutes(sessions, query);

    if json {
        let series = series.unwrap_or_else(|| DailySeries {
            tokens: query_tokens(query),
            matched_sessions: 0,
            days: Vec::new(),
        });
        let value = serde_json::to_string_pretty(&series).context("failed to serialize report")?;
        writeln!(writer, "{value}")?;
        return Ok(());
    }

    match series {
        Some(series) => write_series(writer, &series),
        None => {
            writeln!(writer, "No matching sessions.")?;
            Ok(())
        }
    }
}

fn write_series<W: Write>(writer: &mut W, series: &DailySeries) -> Result<()> {
    if series.tokens.is_empty() {
        writeln!(writer, "All windows ({} sessions)", series.matched_sessions)?;
    } else {
        writeln!(
            writer,
            "Windows matching {} ({} sessions)",
            series.tokens.join(" or "),
            series.matched_sessions
        )?;
    }
    writeln!(writer)?;

    for day in &series.days {
        writeln!(writer, "{}  {:>8}", day.date, format_minutes(day.minutes))?;
    }

    writeln!(writer)?;
    writeln!(writer, "Total: {}", format_minutes(series.total_minutes()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use insta::assert_snapshot;

    fn session(title: &str, date: &str, start: i64, minutes: i64) -> Session {
        let start_time = DateTime::from_timestamp(start, 0).unwrap();
        Session {
            exe_name: "app.exe".to_string(),
            window_title: title.to_string(),
            start_time,
            end_time: start_time + Duration::minutes(minutes),
            date: date.to_string(),
        }
    }

    fn sessions() -> Vec<Session> {
        vec![
            session("Rust docs - Firefox", "2013/04/20", 1_366_482_000, 50),
            session("Inbox - Outlook", "2013/04/20", 1_366_485_000, 45),
            session("Cargo book", "2013/04/22", 1_366_650_000, 75),
        ]
    }

    #[test]
    fn text_report_fills_gaps() {
        let mut output = Vec::new();

        run(&mut output, &sessions(), "rust cargo", false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Windows matching rust or cargo (2 sessions)

        2013/04/20       50m
        2013/04/21        0m
        2013/04/22    1h 15m

        Total: 2h 05m
        ");
    }

    #[test]
    fn json_report() {
        let mut output = Vec::new();

        run(&mut output, &sessions(), "outlook", true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["matched_sessions"], 1);
        assert_eq!(value["days"][0]["date"], "2013/04/20");
        assert_eq!(value["days"][0]["minutes"], 45.0);
    }

    #[test]
    fn json_report_without_match_is_an_empty_series() {
        let mut output = Vec::new();

        run(&mut output, &sessions(), "vim", true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["matched_sessions"], 0);
        assert_eq!(value["tokens"][0], "vim");
        assert_eq!(value["days"], serde_json::json!([]));
    }

    #[test]
    fn no_match() {
        let mut output = Vec::new();

        run(&mut output, &sessions(), "vim", false).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "No matching sessions.\n");
    }
}
