/*!
 * Pump Thread Guard
 *
 * Owns the dedicated thread that pumps a tracing session's event stream.
 * The thread runs until the session is closed out from under it.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::errors::{DiagnoserError, DiagnoserResult};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Guard for the event-pump thread
///
/// # Example
///
/// ```ignore
/// let pump = PumpGuard::spawn("trace-pump-Memory-Case", move || session.process())?;
/// pump.wait_until_started(Duration::from_millis(10));
/// // ... later, after the session is closed
/// pump.join()?;
/// ```
pub struct PumpGuard {
    handle: Option<JoinHandle<DiagnoserResult<()>>>,
    started: Arc<AtomicBool>,
    metadata: GuardMetadata,
}

impl PumpGuard {
    /// Spawn the pump body on a named dedicated thread
    pub fn spawn<F>(name: impl Into<String>, body: F) -> DiagnoserResult<Self>
    where
        F: FnOnce() -> DiagnoserResult<()> + Send + 'static,
    {
        let name = name.into();
        let started = Arc::new(AtomicBool::new(false));
        let started_flag = Arc::clone(&started);

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            started_flag.store(true, Ordering::Release);
            body()
        })?;

        debug!("Spawned pump thread {}", name);
        Ok(Self {
            handle: Some(handle),
            started,
            metadata: GuardMetadata::new("pump_thread").with_label(name),
        })
    }

    /// Whether the thread has begun running its body
    #[inline]
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Block until the pump thread is running, polling with a short backoff
    pub fn wait_until_started(&self, poll_interval: Duration) {
        while !self.has_started() {
            thread::sleep(poll_interval);
        }
    }

    /// Wait for the pump to exit and return its outcome
    pub fn join(mut self) -> DiagnoserResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(DiagnoserError::StreamProcessingFault(
                    "pump thread panicked".to_string(),
                ))
            }),
            None => Ok(()),
        }
    }
}

impl Guard for PumpGuard {
    fn resource_type(&self) -> &'static str {
        "pump_thread"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn release(&mut self) -> GuardResult<()> {
        match self.handle.as_ref() {
            None => return Err(GuardError::AlreadyReleased),
            Some(handle) if !handle.is_finished() => {
                return Err(GuardError::StillRunning(self.describe()));
            }
            Some(_) => {}
        }
        let handle = self.handle.take().ok_or(GuardError::AlreadyReleased)?;
        handle
            .join()
            .map_err(|_| GuardError::OperationFailed("pump thread panicked".to_string()))?
            .map_err(|e| GuardError::OperationFailed(e.to_string()))
    }
}

impl GuardDrop for PumpGuard {
    fn on_drop(&mut self) {
        let finished = match self.handle.as_ref() {
            Some(handle) => handle.is_finished(),
            None => return,
        };

        if finished {
            let _ = self.release();
        } else {
            // Joining here would block until the session closes
            warn!(
                "Detaching {} still running after {}us",
                self.describe(),
                self.metadata.lifetime_micros()
            );
            self.handle.take();
        }
    }
}

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl std::fmt::Debug for PumpGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpGuard")
            .field("label", &self.metadata.label)
            .field("started", &self.has_started())
            .finish()
    }
}
