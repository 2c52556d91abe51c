use crate::error::JournalError;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

/// Default rotation threshold: 100 MiB.
pub const DEFAULT_ROTATE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

struct OpenFile {
    handle: File,
    path: PathBuf,
    date: NaiveDate,
    bytes_written: u64,
}

/// Append-only NDJSON journal for a single `(topic, symbol)` pair. One file
/// per calendar date under `var/log/njord/<topic>.<symbol?>.<date>.ndjson`.
/// Exclusive to its writer task; [`Journal::rotate`] swaps the file handle
/// atomically behind an internal async mutex.
pub struct Journal {
    base_dir: PathBuf,
    topic: String,
    symbol: Option<String>,
    rotate_size_bytes: u64,
    current: Mutex<Option<OpenFile>>,
}

impl Journal {
    pub fn new(base_dir: impl Into<PathBuf>, topic: impl Into<String>, symbol: Option<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            topic: topic.into(),
            symbol,
            rotate_size_bytes: DEFAULT_ROTATE_SIZE_BYTES,
            current: Mutex::new(None),
        }
    }

    pub fn with_rotate_size_bytes(mut self, bytes: u64) -> Self {
        self.rotate_size_bytes = bytes;
        self
    }

    fn file_stem(&self, date: NaiveDate) -> String {
        match &self.symbol {
            Some(symbol) => format!("{}.{}.{}.ndjson", self.topic, symbol, date.format("%Y-%m-%d")),
            None => format!("{}.{}.ndjson", self.topic, date.format("%Y-%m-%d")),
        }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir.join(self.file_stem(date))
    }

    /// Serialize `record` + newline and flush into the OS buffer. Rotates
    /// first if wall-clock midnight UTC has passed or the current file
    /// exceeds the configured size threshold.
    pub async fn append(&self, record: &impl Serialize) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(record).map_err(JournalError::Serialize)?;
        line.push(b'\n');

        let today = Utc::now().date_naive();
        self.rotate_if_needed(today, line.len() as u64).await?;

        let mut guard = self.current.lock().await;
        let open = guard.as_mut().expect("rotate_if_needed always opens a file");
        open.handle
            .write_all(&line)
            .await
            .map_err(|source| JournalError::Io {
                path: open.path.clone(),
                source,
            })?;
        open.handle.flush().await.map_err(|source| JournalError::Io {
            path: open.path.clone(),
            source,
        })?;
        open.bytes_written += line.len() as u64;
        Ok(())
    }

    async fn rotate_if_needed(&self, today: NaiveDate, incoming_bytes: u64) -> Result<(), JournalError> {
        let mut guard = self.current.lock().await;
        let needs_rotate = match guard.as_ref() {
            None => true,
            Some(open) => {
                open.date != today || open.bytes_written + incoming_bytes > self.rotate_size_bytes
            }
        };
        if needs_rotate {
            *guard = Some(self.open_file(today).await?);
        }
        Ok(())
    }

    async fn open_file(&self, date: NaiveDate) -> Result<OpenFile, JournalError> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| JournalError::Io {
                path: self.base_dir.clone(),
                source,
            })?;
        let path = self.path_for(date);
        let existing_len = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "journal file opened");
        Ok(OpenFile {
            handle,
            path,
            date,
            bytes_written: existing_len,
        })
    }

    /// Force rotation regardless of date/size thresholds (used by the
    /// controller's operator-triggered rotation and by tests).
    pub async fn rotate(&self) -> Result<(), JournalError> {
        let today = Utc::now().date_naive();
        let mut guard = self.current.lock().await;
        *guard = Some(self.open_file(today).await?);
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
