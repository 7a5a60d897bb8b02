//! Epoch-second timestamps and calendar-day mapping.
//!
//! Partition files store timestamps as decimal epoch seconds with an optional
//! fractional part (e.g. `1366482000.12`). Parsing goes through the decimal
//! digits directly so values round-trip without float error; exponent forms
//! fall back to `f64` parsing.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Errors from parsing an epoch-seconds field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The field was empty.
    #[error("empty timestamp")]
    Empty,

    /// The field is not a finite number.
    #[error("not a number: {0:?}")]
    NotANumber(String),

    /// The number cannot be represented as a date.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

/// Parses decimal epoch seconds into a UTC timestamp.
pub fn parse_epoch_seconds(s: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    let (secs, nanos) = match split_decimal(s) {
        Some(parts) => parts,
        None => split_float(s)?,
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(|| TimestampError::OutOfRange(s.to_string()))
}

/// Splits a plain decimal (`-?\d*(\.\d*)?`) into whole seconds and nanoseconds.
///
/// Digits past nanosecond precision are truncated.
fn split_decimal(s: &str) -> Option<(i64, u32)> {
    let (negative, digits) = s
        .strip_prefix('-')
        .map_or((false, s), |rest| (true, rest));
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    let mut nanos = 0u32;
    let mut scale = NANOS_PER_SEC / 10;
    for b in frac.bytes().take(9) {
        nanos += u32::from(b - b'0') * scale;
        scale /= 10;
    }

    if !negative {
        return Some((whole, nanos));
    }
    if nanos == 0 {
        Some((-whole, 0))
    } else {
        Some((-whole - 1, NANOS_PER_SEC - nanos))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn split_float(s: &str) -> Result<(i64, u32), TimestampError> {
    let value: f64 = s
        .parse()
        .map_err(|_| TimestampError::NotANumber(s.to_string()))?;
    if !value.is_finite() {
        return Err(TimestampError::NotANumber(s.to_string()));
    }

    let whole = value.floor();
    // i64::MAX as f64 rounds up, so use a strict comparison against it
    if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(s.to_string()));
    }
    let nanos = ((value - whole) * f64::from(NANOS_PER_SEC)).round() as u32;
    Ok((whole as i64, nanos.min(NANOS_PER_SEC - 1)))
}

/// Formats a timestamp as decimal epoch seconds, trimming trailing zeros.
///
/// Precision is microseconds, matching what the poller records.
pub fn format_epoch_seconds(ts: DateTime<Utc>) -> String {
    let micros = ts.timestamp_micros();
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let (whole, frac) = (abs / 1_000_000, abs % 1_000_000);

    if frac == 0 {
        format!("{sign}{whole}")
    } else {
        let frac = format!("{frac:06}");
        format!("{sign}{whole}.{}", frac.trim_end_matches('0'))
    }
}

/// Serde adapter for timestamps as numeric epoch seconds.
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(ts.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        super::parse_epoch_seconds(&value.to_string()).map_err(serde::de::Error::custom)
    }
}

/// Which clock decides the calendar day of a timestamp.
///
/// The day picks the partition an event is written to and the `date` of a
/// reconstructed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayZone {
    /// The machine's local time zone.
    #[default]
    Local,
    /// UTC.
    Utc,
}

impl DayZone {
    /// Returns the calendar day `ts` falls on.
    pub fn day_of(self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => ts.with_timezone(&chrono::Local).date_naive(),
            Self::Utc => ts.date_naive(),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Utc => "utc",
        }
    }
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DayZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            _ => Err(format!("invalid day zone: {s}")),
        }
    }
}

/// Formats a day the way the session dataset keys it (`YYYY/MM/DD`).
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y/%m/%d").to_string()
}

/// Parses a `YYYY/MM/DD` session date.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_whole_seconds() {
        let ts = parse_epoch_seconds("1366482000").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2013, 4, 20, 18, 20, 0).unwrap());
    }

    #[test]
    fn parses_fractional_seconds_exactly() {
        let ts = parse_epoch_seconds("1366482000.12").unwrap();
        assert_eq!(ts.timestamp(), 1_366_482_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 120_000_000);
    }

    #[test]
    fn parses_negative_fraction() {
        let ts = parse_epoch_seconds("-1.5").unwrap();
        assert_eq!(ts.timestamp_millis(), -1500);
    }

    #[test]
    fn parses_exponent_form() {
        let ts = parse_epoch_seconds("1.5e3").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_500_000);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_epoch_seconds(""), Err(TimestampError::Empty));
        assert!(matches!(
            parse_epoch_seconds("yesterday"),
            Err(TimestampError::NotANumber(_))
        ));
        assert!(matches!(
            parse_epoch_seconds("NaN"),
            Err(TimestampError::NotANumber(_))
        ));
        assert!(matches!(
            parse_epoch_seconds("inf"),
            Err(TimestampError::NotANumber(_))
        ));
        assert!(parse_epoch_seconds(".").is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            parse_epoch_seconds("99999999999999999"),
            Err(TimestampError::OutOfRange(_))
        ));
    }

    #[test]
    fn format_trims_trailing_zeros() {
        let ts = parse_epoch_seconds("1366482000.250").unwrap();
        assert_eq!(format_epoch_seconds(ts), "1366482000.25");

        let ts = parse_epoch_seconds("1366482000").unwrap();
        assert_eq!(format_epoch_seconds(ts), "1366482000");

        let ts = parse_epoch_seconds("-1.5").unwrap();
        assert_eq!(format_epoch_seconds(ts), "-1.5");
    }

    #[test]
    fn utc_day_of() {
        let ts = Utc.with_ymd_and_hms(2013, 4, 20, 23, 59, 59).unwrap();
        assert_eq!(
            DayZone::Utc.day_of(ts),
            NaiveDate::from_ymd_opt(2013, 4, 20).unwrap()
        );
    }

    #[test]
    fn day_formatting_roundtrip() {
        let day = NaiveDate::from_ymd_opt(2013, 4, 2).unwrap();
        assert_eq!(format_day(day), "2013/04/02");
        assert_eq!(parse_day("2013/04/02"), Some(day));
        assert_eq!(parse_day("2013-04-02"), None);
    }

    #[test]
    fn day_zone_parses() {
        assert_eq!("utc".parse::<DayZone>().unwrap(), DayZone::Utc);
        assert_eq!("local".parse::<DayZone>().unwrap(), DayZone::Local);
        assert!("mars".parse::<DayZone>().is_err());
    }
}
