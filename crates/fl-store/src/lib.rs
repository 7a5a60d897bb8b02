//! Day-partitioned event log for the focus logger.
//!
//! Each calendar day's events go to their own CSV file named
//! `YYYY-MM-DD windows.csv` inside the store directory. The poller only ever
//! appends; the reconstructor only ever reads.
//!
//! Appends write one complete row per `write_all` while holding an exclusive
//! lock on the partition file. Readers take a shared lock, so a reader never
//! sees half a row even while the poller is writing.

pub mod row;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use fl_core::{Diagnostic, DiagnosticSink, DayZone, EventSource, RawEvent, RowError};
use fs2::FileExt;
use regex::Regex;
use thiserror::Error;

pub use row::DecodeError;

/// Suffix shared by every partition file name.
pub const PARTITION_SUFFIX: &str = " windows.csv";

static PARTITION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}) windows\.csv$").unwrap());

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One day's partition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionId {
    pub day: NaiveDate,
    pub path: PathBuf,
}

impl PartitionId {
    /// Recognizes a partition by file name; anything else in the directory is ignored.
    fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let captures = PARTITION_NAME.captures(name)?;
        let Ok(day) = NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d") else {
            tracing::debug!(file = name, "ignoring partition-like file with invalid date");
            return None;
        };
        Some(Self { day, path })
    }
}

/// Displays as the file name, e.g. `2013-04-20 windows.csv`.
impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&partition_file_name(self.day))
    }
}

fn partition_file_name(day: NaiveDate) -> String {
    format!("{}{PARTITION_SUFFIX}", day.format("%Y-%m-%d"))
}

/// Append-only store of raw events, one CSV file per day.
pub struct EventStore {
    dir: PathBuf,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore").field("dir", &self.dir).finish_non_exhaustive()
    }
}

impl EventStore {
    /// Opens the store at `dir`, creating the directory if it does not exist.
    pub fn open(
        dir: impl Into<PathBuf>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::debug!(dir = %dir.display(), "opened event store");
        Ok(Self { dir, diagnostics })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the partition file for `day`, whether or not it exists yet.
    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(partition_file_name(day))
    }

    /// Appends one event to the partition for `day`.
    ///
    /// The file is created if needed and never truncated. On failure the
    /// event is dropped: the failure goes to the diagnostics sink and is
    /// returned, but nothing is buffered or retried.
    pub fn append(&self, event: &RawEvent, day: NaiveDate) -> Result<(), StoreError> {
        let path = self.partition_path(day);
        let result = row::encode_row(event).and_then(|row| write_row(&path, &row));

        match result {
            Ok(()) => {
                tracing::trace!(partition = %path.display(), kind = %event.kind(), "appended event");
                Ok(())
            }
            Err(e) => {
                self.diagnostics.report(&Diagnostic::AppendFailed {
                    partition: partition_file_name(day),
                    error: e.to_string(),
                });
                Err(StoreError::io(&path, e))
            }
        }
    }

    /// Appends to the partition for the day the event was recorded on in `zone`.
    pub fn append_now(&self, event: &RawEvent, zone: DayZone) -> Result<(), StoreError> {
        self.append(event, zone.day_of(event.recorded_at()))
    }

    /// Enumerates partition files lazily, in directory order.
    ///
    /// Every call re-reads the directory, so files created since the last
    /// call are picked up.
    pub fn partitions(&self) -> Result<Partitions, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        Ok(Partitions {
            dir: self.dir.clone(),
            entries,
        })
    }

    /// All partitions, oldest day first.
    pub fn list_partitions(&self) -> Result<Vec<PartitionId>, StoreError> {
        let mut partitions = self.partitions()?.collect::<Result<Vec<_>, _>>()?;
        partitions.sort_by_key(|p| p.day);
        Ok(partitions)
    }

    /// Reads one partition's rows in file order.
    ///
    /// A row that fails to decode is returned as a [`RowError`] in its place;
    /// only a failure to read the file as a whole is an `Err`.
    pub fn read_partition(
        &self,
        partition: &PartitionId,
    ) -> Result<Vec<Result<RawEvent, RowError>>, StoreError> {
        let path = &partition.path;
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        FileExt::lock_shared(&file).map_err(|e| StoreError::io(path, e))?;

        let rows = row::decode_rows(BufReader::new(&file));
        if let Err(e) = FileExt::unlock(&file) {
            tracing::debug!(partition = %partition, error = %e, "failed to release read lock");
        }
        let rows = rows.map_err(|e| StoreError::io(path, e))?;

        tracing::debug!(partition = %partition, rows = rows.len(), "read partition");
        Ok(rows)
    }
}

impl EventSource for EventStore {
    type Partition = PartitionId;
    type Error = StoreError;

    fn list_partitions(&self) -> Result<Vec<PartitionId>, StoreError> {
        Self::list_partitions(self)
    }

    fn read_partition(
        &self,
        partition: &PartitionId,
    ) -> Result<Vec<Result<RawEvent, RowError>>, StoreError> {
        Self::read_partition(self, partition)
    }
}

/// Lazy iterator over the partition files in a store directory.
#[derive(Debug)]
pub struct Partitions {
    dir: PathBuf,
    entries: fs::ReadDir,
}

impl Iterator for Partitions {
    type Item = Result<PartitionId, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StoreError::io(&self.dir, e))),
            };
            // Follows symlinks, unlike `DirEntry::file_type`.
            let path = entry.path();
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "skipping non-file entry");
                continue;
            }
            if let Some(partition) = PartitionId::from_path(path) {
                return Some(Ok(partition));
            }
        }
        None
    }
}

/// Writes a complete row under an exclusive lock.
fn write_row(path: &Path, row: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let written = file.write_all(row).and_then(|()| file.flush());
    let unlocked = FileExt::unlock(&file);
    written.and(unlocked)
}
