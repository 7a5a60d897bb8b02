//! CSV row codec for partition files.
//!
//! Rows are positional with the event kind first:
//!
//! ```text
//! window_info,<exe_name>,<window_title>,<start_time>
//! idle_time,<idle_start>,<idle_end>
//! ```
//!
//! Timestamps are decimal epoch seconds. Fields use standard CSV quoting so
//! titles may contain commas, quotes, or newlines.

use std::io::{self, Read};

use csv::{ByteRecord, ReaderBuilder, Terminator, WriterBuilder};
use fl_core::time::{format_epoch_seconds, parse_epoch_seconds};
use fl_core::{EventKind, RawEvent, RowError, TimestampError, UnknownEventKind};
use thiserror::Error;

/// Why a single row could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    UnknownKind(#[from] UnknownEventKind),

    #[error("{kind} row needs {expected} fields, found {found}")]
    TooFewFields {
        kind: EventKind,
        expected: usize,
        found: usize,
    },

    #[error("invalid {field}: {source}")]
    Timestamp {
        field: &'static str,
        source: TimestampError,
    },
}

/// Encodes one event as a complete, newline-terminated CSV row.
pub fn encode_row(event: &RawEvent) -> io::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    match event {
        RawEvent::FocusChange {
            exe_name,
            window_title,
            start_time,
        } => writer.write_record([
            event.kind().as_str(),
            exe_name.as_str(),
            window_title.as_str(),
            format_epoch_seconds(*start_time).as_str(),
        ])?,
        RawEvent::IdleSpan {
            idle_start,
            idle_end,
        } => writer.write_record([
            event.kind().as_str(),
            format_epoch_seconds(*idle_start).as_str(),
            format_epoch_seconds(*idle_end).as_str(),
        ])?,
    }

    writer.into_inner().map_err(csv::IntoInnerError::into_error)
}

/// Decodes one record. Fields past the ones the kind needs are ignored.
pub fn decode_record(record: &ByteRecord) -> Result<RawEvent, DecodeError> {
    let kind: EventKind = text(record, 0).trim().parse()?;
    if record.len() < kind.field_count() {
        return Err(DecodeError::TooFewFields {
            kind,
            expected: kind.field_count(),
            found: record.len(),
        });
    }

    match kind {
        EventKind::WindowInfo => Ok(RawEvent::focus(
            text(record, 1),
            text(record, 2),
            timestamp(record, 3, "start_time")?,
        )),
        EventKind::IdleTime => Ok(RawEvent::idle(
            timestamp(record, 1, "idle_start")?,
            timestamp(record, 2, "idle_end")?,
        )),
    }
}

/// Reads every row of a partition in file order.
///
/// Only an I/O failure of the underlying reader is an `Err`; anything wrong
/// with an individual row is returned in place as a [`RowError`].
pub fn decode_rows<R: Read>(reader: R) -> io::Result<Vec<Result<RawEvent, RowError>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut record = ByteRecord::new();
    let mut rows = Vec::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map_or(0, csv::Position::line);
                rows.push(decode_record(&record).map_err(|e| RowError {
                    line,
                    reason: e.to_string(),
                }));
            }
            Err(err) if err.is_io_error() => {
                return Err(match err.into_kind() {
                    csv::ErrorKind::Io(e) => e,
                    other => io::Error::other(format!("{other:?}")),
                });
            }
            Err(err) => {
                let line = err.position().map_or(0, csv::Position::line);
                rows.push(Err(RowError {
                    line,
                    reason: err.to_string(),
                }));
            }
        }
    }
    Ok(rows)
}

fn text(record: &ByteRecord, index: usize) -> String {
    record
        .get(index)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .unwrap_or_default()
}

fn timestamp(
    record: &ByteRecord,
    index: usize,
    field: &'static str,
) -> Result<chrono::DateTime<chrono::Utc>, DecodeError> {
    parse_epoch_seconds(text(record, index).trim())
        .map_err(|source| DecodeError::Timestamp { field, source })
}
