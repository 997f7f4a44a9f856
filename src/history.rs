//! Append-only history of scored samples.
//!
//! One CSV file, header-tagged, one line per annotated row. Single-writer
//! (the ingestion pipeline) with a single independent reader (the retrain
//! scheduler, which opens the file by path). Every append is flushed and
//! synced before it returns, so a crash right after `append` cannot lose
//! the row, and a crash mid-append can only tear the final line.

use crate::types::sample::{AnnotatedRow, RawSample};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Fixed column schema of the history file.
pub const HISTORY_HEADER: &str =
    "timestamp,temperature,vibration,rpm,current,load,anomaly,risk_score";

/// Durable append-only log of annotated rows.
pub struct HistoryStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl HistoryStore {
    /// Open the history file for appending, creating it (with header) when
    /// absent or empty. The schema of an existing file is never altered.
    ///
    /// A torn final record left by a crash mid-append is truncated away here
    /// so the next append starts on a fresh line.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        repair_torn_tail(&path)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut store = Self {
            path: path.clone(),
            writer: BufWriter::new(file),
        };

        if store.writer.get_ref().metadata()?.len() == 0 {
            store.writer.write_all(HISTORY_HEADER.as_bytes())?;
            store.writer.write_all(b"\n")?;
            store.writer.flush()?;
            store.writer.get_ref().sync_data()?;
            info!(path = %path.display(), "initialized empty history store");
        }

        Ok(store)
    }

    /// Durably append one row. Returns only once the row has reached disk.
    pub fn append(&mut self, row: &AnnotatedRow) -> io::Result<()> {
        let line = encode_row(row);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full scan of a history file in append order.
    ///
    /// A missing file reads as empty. A torn trailing record (crash during
    /// an append, or a concurrent in-flight append) is skipped with a
    /// warning; complete rows are never affected.
    pub fn read_all<P: AsRef<Path>>(path: P) -> io::Result<Vec<AnnotatedRow>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let reader = BufReader::new(file);
        let mut rows = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if idx == 0 && line == HISTORY_HEADER {
                continue;
            }
            if line.is_empty() {
                continue;
            }
            match decode_row(&line) {
                Some(row) => rows.push(row),
                None => {
                    warn!(line_no = idx + 1, "skipping unparseable history record");
                }
            }
        }

        Ok(rows)
    }
}

/// Truncate a torn final record left by a crash mid-append.
///
/// Appending onto a torn line would corrupt it further and swallow the new
/// row, so the file is cut back to the last complete line before the append
/// handle is opened. Only the tail is inspected; complete rows are untouched.
fn repair_torn_tail(path: &Path) -> io::Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let tail_len = len.min(4096);
    let mut tail = vec![0u8; tail_len as usize];
    file.seek(SeekFrom::End(-(tail_len as i64)))?;
    file.read_exact(&mut tail)?;

    if tail.last() == Some(&b'\n') {
        return Ok(());
    }

    // A tail with no newline at all is left for read_all to skip as an
    // unparseable record.
    if let Some(pos) = tail.iter().rposition(|&b| b == b'\n') {
        let keep = len - tail_len + pos as u64 + 1;
        warn!(
            path = %path.display(),
            truncated_bytes = len - keep,
            "truncating torn trailing record from history"
        );
        file.set_len(keep)?;
        file.sync_data()?;
    }

    Ok(())
}

fn encode_row(row: &AnnotatedRow) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        row.sample.timestamp.to_rfc3339(),
        row.sample.temperature,
        row.sample.vibration,
        row.sample.rpm,
        row.sample.current,
        row.sample.load,
        row.anomaly,
        row.risk_score,
    )
}

fn decode_row(line: &str) -> Option<AnnotatedRow> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 8 {
        return None;
    }

    let timestamp = DateTime::parse_from_rfc3339(fields[0])
        .ok()?
        .with_timezone(&Utc);
    let sample = RawSample {
        temperature: fields[1].parse().ok()?,
        vibration: fields[2].parse().ok()?,
        rpm: fields[3].parse().ok()?,
        current: fields[4].parse().ok()?,
        load: fields[5].parse().ok()?,
        timestamp,
    };

    Some(AnnotatedRow {
        sample,
        anomaly: fields[6].parse().ok()?,
        risk_score: fields[7].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(risk_score: f64) -> AnnotatedRow {
        AnnotatedRow::new(
            RawSample {
                temperature: 61.5,
                vibration: 3.25,
                rpm: 1400,
                current: 8.4,
                load: 72,
                timestamp: Utc::now(),
            },
            false,
            risk_score,
        )
    }

    #[test]
    fn test_fresh_store_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let mut store = HistoryStore::open(&path).unwrap();
            store.append(&row(0.1)).unwrap();
        }
        // Reopen simulates a restart; the header must not be duplicated
        {
            let mut store = HistoryStore::open(&path).unwrap();
            store.append(&row(0.2)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(HISTORY_HEADER).count(), 1);
        assert!(content.starts_with(HISTORY_HEADER));

        let rows = HistoryStore::read_all(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].risk_score, 0.1);
        assert_eq!(rows[1].risk_score, 0.2);
    }

    #[test]
    fn test_append_grows_by_one_row_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut store = HistoryStore::open(&path).unwrap();

        for i in 0..10 {
            let before = HistoryStore::read_all(&path).unwrap().len();
            store.append(&row(i as f64 / 10.0)).unwrap();
            let after = HistoryStore::read_all(&path).unwrap().len();
            assert_eq!(after, before + 1);
        }
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut store = HistoryStore::open(&path).unwrap();

        let original = AnnotatedRow::new(
            RawSample {
                temperature: 75.01,
                vibration: 6.0,
                rpm: 1701,
                current: 11.0,
                load: 100,
                timestamp: Utc::now(),
            },
            true,
            0.875,
        );
        store.append(&original).unwrap();

        let rows = HistoryStore::read_all(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample.temperature, 75.01);
        assert_eq!(rows[0].sample.rpm, 1701);
        assert!(rows[0].anomaly);
        assert_eq!(rows[0].risk_score, 0.875);
        assert_eq!(rows[0].sample.timestamp, original.sample.timestamp);
    }

    #[test]
    fn test_torn_trailing_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let mut store = HistoryStore::open(&path).unwrap();
            for i in 0..5 {
                store.append(&row(i as f64 / 10.0)).unwrap();
            }
        }

        // Simulate a crash mid-append: a partial line with no terminator
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"2026-01-01T00:00:00+00:00,55.1,2.9").unwrap();

        let rows = HistoryStore::read_all(&path).unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_reopen_truncates_torn_tail_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        {
            let mut store = HistoryStore::open(&path).unwrap();
            for i in 0..3 {
                store.append(&row(i as f64 / 10.0)).unwrap();
            }
        }

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"2026-01-01T00:00:00+00:00,55.1,2.9").unwrap();
        drop(file);

        // Restart: the torn record is cut away, so the next append lands on
        // its own line instead of being glued to the partial one
        let mut store = HistoryStore::open(&path).unwrap();
        store.append(&row(0.9)).unwrap();

        let rows = HistoryStore::read_all(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].risk_score, 0.9);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("55.1,2.9"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_read_all_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows = HistoryStore::read_all(dir.path().join("nope.csv")).unwrap();
        assert!(rows.is_empty());
    }
}
