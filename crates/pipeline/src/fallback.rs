//! Durable on-disk queue for events the broker could not accept.
//!
//! Undeliverable messages are appended to a day-stamped JSON-lines file,
//! one [`BufferedEvent`] per line with the target channel in `event_type`
//! and the full envelope message in `payload`. Replayed files are renamed
//! with a `.processed` suffix rather than deleted, and reaped after a
//! retention window. File naming:
//!
//! ```text
//! events_2026-08-20.jsonl             pending
//! events_2026-08-20.jsonl.processed   replayed, awaiting cleanup
//! ```

use std::path::{Path, PathBuf};

use casework_events::BufferedEvent;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long processed files are kept before cleanup deletes them.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

const FILE_PREFIX: &str = "events_";
const FILE_EXTENSION: &str = ".jsonl";
const PROCESSED_SUFFIX: &str = ".processed";

#[derive(Debug, thiserror::Error)]
pub enum FallbackStoreError {
    #[error("Fallback store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fallback entry serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only store of undeliverable broker messages.
///
/// Writes from concurrent publishers are serialized by an internal lock so
/// lines never interleave. Reading, renaming and cleanup are replay-service
/// concerns and take no lock; the replay service is the only consumer.
pub struct FallbackEventStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FallbackEventStore {
    /// Opens the store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, FallbackStoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(FallbackEventStore {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn current_file_name() -> String {
        format!(
            "{FILE_PREFIX}{}{FILE_EXTENSION}",
            chrono::Utc::now().format("%Y-%m-%d")
        )
    }

    /// Appends one undeliverable message to today's file.
    pub async fn store_event(
        &self,
        channel: &str,
        message: &str,
    ) -> Result<(), FallbackStoreError> {
        let entry = BufferedEvent::for_channel(channel, message.to_string());
        let line = serde_json::to_string(&entry)?;

        let _guard = self.write_lock.lock().await;
        let path = self.dir.join(Self::current_file_name());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        debug!(channel, file = %path.display(), "Event stored for later replay");
        Ok(())
    }

    /// Lists pending (not yet processed) files, oldest first. Day-stamped
    /// names sort chronologically, so a plain name sort gives replay order.
    pub async fn pending_files(&self) -> Result<Vec<PathBuf>, FallbackStoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names.into_iter().map(|name| self.dir.join(name)).collect())
    }

    /// Reads every parseable entry from a file, preserving append order.
    /// Corrupt lines are logged and skipped; they will not be retried.
    pub async fn read_events(&self, path: &Path) -> Result<Vec<BufferedEvent>, FallbackStoreError> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        let mut line_number = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BufferedEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    file = %path.display(),
                    line_number,
                    error = %e,
                    "Skipping unparseable fallback entry",
                ),
            }
        }
        Ok(events)
    }

    /// Marks a fully replayed file by renaming it with the processed suffix.
    /// Returns the new path.
    pub async fn mark_processed(&self, path: &Path) -> Result<PathBuf, FallbackStoreError> {
        let mut renamed = path.as_os_str().to_owned();
        renamed.push(PROCESSED_SUFFIX);
        let renamed = PathBuf::from(renamed);
        tokio::fs::rename(path, &renamed).await?;
        debug!(file = %renamed.display(), "Fallback file marked processed");
        Ok(renamed)
    }

    /// Deletes processed files older than the retention window. Pending
    /// files are never touched regardless of age. Returns the delete count.
    pub async fn cleanup_old_files(&self, days_to_keep: u32) -> Result<usize, FallbackStoreError> {
        let cutoff = std::time::SystemTime::now()
            - std::time::Duration::from_secs(u64::from(days_to_keep) * 86_400);
        let mut removed = 0usize;

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(PROCESSED_SUFFIX) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if modified < cutoff {
                let path = entry.path();
                tokio::fs::remove_file(&path).await?;
                debug!(file = %path.display(), "Deleted expired fallback file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
