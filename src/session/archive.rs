/*!
 * Raw Event Archive
 * Optional sink that records every event of a session as JSON lines
 *
 * Not needed for aggregation; the archive can be replayed later through the
 * simulation backend.
 */

use crate::core::errors::{DiagnoserError, DiagnoserResult};
use crate::monitoring::events::TraceEvent;
use crate::monitoring::streaming::{EventSourceHandle, SubscriptionId};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// JSON-lines event archive
#[derive(Clone)]
pub struct EventArchive {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
    written: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
}

impl EventArchive {
    /// Create (truncate) the archive file
    pub fn create(path: impl AsRef<Path>) -> DiagnoserResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "event archive created");
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
            written: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Subscribe the archive to a session's stream
    pub fn attach(&self, stream: &EventSourceHandle) -> SubscriptionId {
        let archive = self.clone();
        stream.subscribe(move |event| archive.append(event))
    }

    /// Append one event; the first write error is logged, later ones are dropped
    pub fn append(&self, event: &TraceEvent) {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }

        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));

        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.store(true, Ordering::Relaxed);
                error!(path = %self.path.display(), error = %e, "event archive write failed");
            }
        }
    }

    pub fn flush(&self) -> DiagnoserResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    pub fn events_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for EventArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventArchive")
            .field("path", &self.path)
            .field("written", &self.events_written())
            .finish()
    }
}

/// Read a JSON-lines archive back; blank lines are skipped
pub fn read_archive(path: impl AsRef<Path>) -> DiagnoserResult<Vec<TraceEvent>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|e| {
            DiagnoserError::Io(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;
        events.push(event);
    }
    Ok(events)
}
