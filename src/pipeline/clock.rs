//! Capture clock for frame timestamps and ordering

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::types::Timestamp;

/// Capture clock
///
/// Every frame produced by one device stream is stamped from the same clock:
/// a timestamp relative to the clock base and a sequence number that fixes
/// capture order.
///
/// # Thread Safety
///
/// The clock is cheap to clone; clones share the base and the sequence
/// counter.
#[derive(Clone)]
pub struct CaptureClock {
    /// Base instant when the clock started
    base: Arc<Instant>,

    /// Next capture sequence number
    sequence: Arc<AtomicU64>,
}

impl CaptureClock {
    /// Create a new capture clock starting now
    pub fn new() -> Self {
        Self {
            base: Arc::new(Instant::now()),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Timestamp for a frame captured right now
    pub fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.base.elapsed())
    }

    /// Stamp the next frame: returns its sequence number and timestamp
    pub fn next_frame(&self) -> (u64, Timestamp) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        (sequence, self.now())
    }

    /// Number of frames stamped so far
    pub fn frames_stamped(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CaptureClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureClock")
            .field("elapsed", &self.base.elapsed())
            .field("frames_stamped", &self.frames_stamped())
            .finish()
    }
}
