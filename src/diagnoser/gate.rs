/*!
 * Measurement Window Gate
 *
 * Open between the harness's window-start and window-stop markers.
 * Allocation samples seen while the gate is closed are discarded.
 *
 * Markers and allocation samples arrive on the same pump thread, so the
 * check in the allocation handler never races with a transition.
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Open,
    Closed,
}

/// Boolean gate toggled by window markers
#[derive(Debug)]
pub struct MeasurementWindowGate {
    open: AtomicBool,
    windows_opened: AtomicU64,
}

impl MeasurementWindowGate {
    /// New gate, initially closed
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
            windows_opened: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn on_window_start(&self) {
        if !self.open.swap(true, Ordering::AcqRel) {
            self.windows_opened.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn on_window_stop(&self) {
        self.open.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    #[inline]
    pub fn state(&self) -> WindowState {
        if self.is_open() {
            WindowState::Open
        } else {
            WindowState::Closed
        }
    }

    /// Number of closed-to-open transitions (measured iterations)
    #[inline]
    pub fn windows_opened(&self) -> u64 {
        self.windows_opened.load(Ordering::Relaxed)
    }
}

impl Default for MeasurementWindowGate {
    fn default() -> Self {
        Self::new()
    }
}
