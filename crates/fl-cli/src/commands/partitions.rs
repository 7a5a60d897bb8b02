//! Partitions command for listing day files and their row counts.

use std::io::Write;

use anyhow::{Context, Result};
use fl_store::EventStore;

pub fn run<W: Write>(writer: &mut W, store: &EventStore) -> Result<()> {
    let partitions = store
        .list_partitions()
        .context("failed to list partitions")?;

    if partitions.is_empty() {
        writeln!(writer, "No partitions in {}.", store.dir().display())?;
        return Ok(());
    }

    for partition in &partitions {
        match store.read_partition(partition) {
            Ok(rows) => {
                let bad = rows.iter().filter(|row| row.is_err()).count();
                write!(writer, "{}  {:>6} rows", partition.day, rows.len())?;
                if bad > 0 {
                    write!(writer, "  ({bad} unreadable)")?;
                }
                writeln!(writer)?;
            }
            Err(e) => writeln!(writer, "{}  error: {e}", partition.day)?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fl_core::TracingSink;
    use insta::assert_snapshot;

    #[test]
    fn lists_days_with_counts() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("2013-04-21 windows.csv"),
            "window_info,a.exe,A,1366560000\nbogus\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("2013-04-20 windows.csv"),
            "window_info,a.exe,A,1366482000\nidle_time,1366482060,1366482400\n",
        )
        .unwrap();
        let store = EventStore::open(temp.path(), Arc::new(TracingSink)).unwrap();
        let mut output = Vec::new();

        run(&mut output, &store).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        2013-04-20       2 rows
        2013-04-21       2 rows  (1 unreadable)
        ");
    }

    #[test]
    fn empty_store() {
        let temp = tempfile::tempdir().unwrap();
        let store = EventStore::open(temp.path(), Arc::new(TracingSink)).unwrap();
        let mut output = Vec::new();

        run(&mut output, &store).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("No partitions in "), "{output}");
    }
}
