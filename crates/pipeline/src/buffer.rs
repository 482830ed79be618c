//! Bounded, disk-backed buffering of events awaiting persistence.
//!
//! While the store is down the subscriber parks decoded events here instead
//! of dropping them. The buffer is an in-memory bounded queue mirrored by an
//! append-only journal:
//!
//! ```text
//! buffer_events.jsonl        active journal, one line per queued event
//! buffer_events.drain.jsonl  rotated journal for the batch being flushed
//! ```
//!
//! Enqueueing into a full buffer waits until a flush frees space; that
//! backpressure is deliberate and reaches all the way back to the broker
//! subscription. On startup both journals are reloaded (drain first, since
//! its entries are older), surviving entries are re-journaled, and the old
//! files removed, so a crash at any point during recovery loses nothing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use casework_events::{BufferedEvent, DomainEvent};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

const ACTIVE_FILE: &str = "buffer_events.jsonl";
const DRAIN_FILE: &str = "buffer_events.drain.jsonl";
const RECOVERY_TMP_FILE: &str = "buffer_events.tmp.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Buffer journal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffered event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Buffer is closed")]
    Closed,
}

#[derive(Debug, Default)]
struct BufferCounters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    recovered: AtomicU64,
    corrupt_skipped: AtomicU64,
    recovery_overflow: AtomicU64,
}

/// Bounded queue of events waiting for the store to come back.
///
/// Single logical consumer (the flush service); any number of producers.
pub struct EventBuffer {
    dir: PathBuf,
    capacity: usize,
    tx: mpsc::Sender<BufferedEvent>,
    rx: Mutex<mpsc::Receiver<BufferedEvent>>,
    /// Serializes journal appends and the rotation in [`dequeue_all`].
    ///
    /// [`dequeue_all`]: EventBuffer::dequeue_all
    journal_lock: Mutex<()>,
    depth: AtomicUsize,
    counters: BufferCounters,
}

impl EventBuffer {
    /// Opens the buffer, creating the directory if needed and recovering
    /// any journaled events a previous process left behind.
    pub async fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, BufferError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let buffer = EventBuffer {
            dir,
            capacity,
            tx,
            rx: Mutex::new(rx),
            journal_lock: Mutex::new(()),
            depth: AtomicUsize::new(0),
            counters: BufferCounters::default(),
        };
        buffer.recover().await?;
        Ok(buffer)
    }

    /// Queues one event, journaling it for crash safety. Waits while the
    /// buffer is full; this is the backpressure that slows producers down
    /// during a long store outage instead of growing without bound.
    pub async fn enqueue(&self, event: &DomainEvent) -> Result<(), BufferError> {
        let buffered = BufferedEvent::from_event(event)?;
        let line = serde_json::to_string(&buffered)?;

        // Depth counts the send from before it completes so a concurrent
        // drain can never subtract more than was added.
        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(buffered).await.is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(BufferError::Closed);
        }
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        let _guard = self.journal_lock.lock().await;
        self.append_line(&self.dir.join(ACTIVE_FILE), &line).await?;
        Ok(())
    }

    /// Drains everything currently queued, oldest first.
    ///
    /// The active journal is rotated aside before draining so enqueues that
    /// race the drain land in a fresh journal, then the rotated file is
    /// deleted. From that point the batch exists only in the caller's hands;
    /// a caller that drops it loses those events (see `BufferFlushService`
    /// for where that trade-off is taken).
    pub async fn dequeue_all(&self) -> Result<Vec<BufferedEvent>, BufferError> {
        let mut rx = self.rx.lock().await;

        {
            let _guard = self.journal_lock.lock().await;
            let active = self.dir.join(ACTIVE_FILE);
            if tokio::fs::try_exists(&active).await? {
                tokio::fs::rename(&active, self.dir.join(DRAIN_FILE)).await?;
            }
        }

        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        if !drained.is_empty() {
            self.depth.fetch_sub(drained.len(), Ordering::Relaxed);
            self.counters
                .dequeued
                .fetch_add(drained.len() as u64, Ordering::Relaxed);
        }

        let drain = self.dir.join(DRAIN_FILE);
        if tokio::fs::try_exists(&drain).await? {
            tokio::fs::remove_file(&drain).await?;
        }
        Ok(drained)
    }

    /// Events currently queued, including enqueues still in flight.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_enqueued(&self) -> u64 {
        self.counters.enqueued.load(Ordering::Relaxed)
    }

    pub fn total_dequeued(&self) -> u64 {
        self.counters.dequeued.load(Ordering::Relaxed)
    }

    /// Events reloaded from journals at startup.
    pub fn recovered_events(&self) -> u64 {
        self.counters.recovered.load(Ordering::Relaxed)
    }

    /// Journal lines that failed to parse and were skipped.
    pub fn corrupt_lines_skipped(&self) -> u64 {
        self.counters.corrupt_skipped.load(Ordering::Relaxed)
    }

    /// Recovered events dropped because the queue was already full.
    pub fn recovery_overflow(&self) -> u64 {
        self.counters.recovery_overflow.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Recovery
    // -------------------------------------------------------------------------

    async fn recover(&self) -> Result<(), BufferError> {
        let drain_path = self.dir.join(DRAIN_FILE);
        let active_path = self.dir.join(ACTIVE_FILE);

        // Drain-file entries predate the active journal: they were rotated
        // aside by a flush that never finished.
        let mut pending = Vec::new();
        for path in [&drain_path, &active_path] {
            if tokio::fs::try_exists(path).await? {
                self.read_journal(path, &mut pending).await?;
            }
        }

        if pending.is_empty() {
            for path in [&drain_path, &active_path] {
                if tokio::fs::try_exists(path).await? {
                    tokio::fs::remove_file(path).await?;
                }
            }
            return Ok(());
        }

        let mut kept = Vec::with_capacity(pending.len());
        for event in pending {
            match self.tx.try_send(event.clone()) {
                Ok(()) => {
                    self.depth.fetch_add(1, Ordering::Relaxed);
                    kept.push(event);
                }
                Err(TrySendError::Full(_)) => {
                    self.counters.recovery_overflow.fetch_add(1, Ordering::Relaxed);
                    error!(
                        event_type = %event.event_type,
                        "Buffer full during recovery; dropping journaled event",
                    );
                }
                Err(TrySendError::Closed(_)) => return Err(BufferError::Closed),
            }
        }
        self.counters
            .recovered
            .store(kept.len() as u64, Ordering::Relaxed);

        // Re-journal the surviving set before removing the old files; a
        // crash anywhere in here leaves at least one complete journal.
        let tmp_path = self.dir.join(RECOVERY_TMP_FILE);
        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        for event in &kept {
            let line = serde_json::to_string(event)?;
            tmp.write_all(line.as_bytes()).await?;
            tmp.write_all(b"\n").await?;
        }
        tmp.flush().await?;
        tokio::fs::rename(&tmp_path, &active_path).await?;
        if tokio::fs::try_exists(&drain_path).await? {
            tokio::fs::remove_file(&drain_path).await?;
        }

        info!(
            recovered = kept.len(),
            corrupt_skipped = self.counters.corrupt_skipped.load(Ordering::Relaxed),
            overflow = self.counters.recovery_overflow.load(Ordering::Relaxed),
            "Recovered buffered events from journal",
        );
        Ok(())
    }

    async fn read_journal(
        &self,
        path: &Path,
        into: &mut Vec<BufferedEvent>,
    ) -> Result<(), BufferError> {
        let contents = tokio::fs::read_to_string(path).await?;
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BufferedEvent>(line) {
                Ok(event) => into.push(event),
                Err(e) => {
                    self.counters.corrupt_skipped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        file = %path.display(),
                        line_number = index + 1,
                        error = %e,
                        "Skipping corrupt buffer journal line",
                    );
                }
            }
        }
        Ok(())
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<(), BufferError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}
