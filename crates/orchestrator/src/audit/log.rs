//! Audit log — buffered, daily-rotated JSON lines.
//!
//! Entries buffer in memory and hit disk when the buffer reaches its
//! flush threshold, on explicit flush, and on close. A failed flush keeps
//! the buffered entries for the next attempt. One mutex serializes
//! append, flush, and rotation.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::AuditError;

/// Buffered entries before an automatic flush.
const FLUSH_THRESHOLD: usize = 100;

struct Inner {
    file: Option<File>,
    date: NaiveDate,
    buffer: Vec<String>,
}

pub struct AuditLogger {
    directory: PathBuf,
    inner: Mutex<Inner>,
}

impl AuditLogger {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            inner: Mutex::new(Inner {
                file: None,
                date: Utc::now().date_naive(),
                buffer: Vec::new(),
            }),
        })
    }

    /// `integrity-audit-YYYY-MM-DD.jsonl` inside the configured directory.
    pub fn file_path_for(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("integrity-audit-{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append one entry. Serialization happens immediately; the write is
    /// deferred until the buffer fills or a flush is requested.
    pub fn append<T: Serialize>(&self, entry: &T) -> Result<(), AuditError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| AuditError::Write(std::io::Error::other(e)))?;

        let mut inner = self.inner.lock();
        inner.buffer.push(line);
        if inner.buffer.len() >= FLUSH_THRESHOLD {
            self.flush_locked(&mut inner)?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), AuditError> {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner)
    }

    /// Flush and drop the file handle. The logger stays usable; the next
    /// append reopens the file.
    pub fn close(&self) -> Result<(), AuditError> {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner)?;
        inner.file = None;
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    fn flush_locked(&self, inner: &mut Inner) -> Result<(), AuditError> {
        if inner.buffer.is_empty() {
            return Ok(());
        }

        // Day changed: rotate to a fresh file before writing.
        let today = Utc::now().date_naive();
        if today != inner.date {
            debug!(from = %inner.date, to = %today, "Rotating audit log");
            inner.date = today;
            inner.file = None;
        }

        if inner.file.is_none() {
            let path = self.file_path_for(inner.date);
            inner.file = Some(open_append(&path)?);
        }

        // On any write error the buffer is preserved for the next flush.
        let file = inner.file.as_mut().ok_or_else(|| {
            AuditError::Write(std::io::Error::other("audit log file unavailable"))
        })?;
        for line in &inner.buffer {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        inner.buffer.clear();
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, AuditError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_buffers_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path()).unwrap();

        logger.append(&json!({"kind": "scan", "issues": 0})).unwrap();
        assert_eq!(logger.buffered(), 1);
        let path = logger.file_path_for(Utc::now().date_naive());
        assert!(!path.exists());

        logger.flush().unwrap();
        assert_eq!(logger.buffered(), 0);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["kind"], "scan");
    }

    #[test]
    fn test_threshold_triggers_automatic_flush() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path()).unwrap();

        for i in 0..FLUSH_THRESHOLD {
            logger.append(&json!({"i": i})).unwrap();
        }
        assert_eq!(logger.buffered(), 0);
        let contents = fs::read_to_string(logger.file_path_for(Utc::now().date_naive())).unwrap();
        assert_eq!(contents.lines().count(), FLUSH_THRESHOLD);
    }

    #[test]
    fn test_close_flushes_and_reopens_on_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path()).unwrap();

        logger.append(&json!({"n": 1})).unwrap();
        logger.close().unwrap();
        logger.append(&json!({"n": 2})).unwrap();
        logger.flush().unwrap();

        let contents = fs::read_to_string(logger.file_path_for(Utc::now().date_naive())).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_file_name_shape() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert!(logger
            .file_path_for(date)
            .ends_with("integrity-audit-2026-03-09.jsonl"));
    }
}
