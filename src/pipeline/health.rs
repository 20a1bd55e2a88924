//! Health counters for a capture session

use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Health metrics for a session
///
/// All fields use atomic operations so the producer, the delegate and
/// analyzer tasks can update them without coordination.
pub struct SessionHealth {
    /// Frames written to the frame slot
    pub frames_displayed: AtomicU64,

    /// Frames the output replaced before the delegate saw them
    pub frames_discarded: AtomicU64,

    /// Analyzer invocations started
    pub analyses_dispatched: AtomicU64,

    /// Frames not analyzed because the gate was busy
    pub analyses_skipped: AtomicU64,

    /// Analyzer invocations that returned an error or panicked
    pub analysis_failures: AtomicU64,

    /// Detection events emitted
    pub detections: AtomicU64,

    /// Events dropped because no listener was installed
    pub events_dropped: AtomicU64,
}

impl SessionHealth {
    pub fn new() -> Self {
        Self {
            frames_displayed: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            analyses_dispatched: AtomicU64::new(0),
            analyses_skipped: AtomicU64::new(0),
            analysis_failures: AtomicU64::new(0),
            detections: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_frame(&self) {
        self.frames_displayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_frames_discarded(&self, count: u64) {
        self.frames_discarded.store(count, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.analyses_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.analyses_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.analysis_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self, delivered: bool) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        if !delivered {
            self.record_event_dropped();
        }
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_displayed(&self) -> u64 {
        self.frames_displayed.load(Ordering::Relaxed)
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded.load(Ordering::Relaxed)
    }

    pub fn analyses_dispatched(&self) -> u64 {
        self.analyses_dispatched.load(Ordering::Relaxed)
    }

    pub fn analyses_skipped(&self) -> u64 {
        self.analyses_skipped.load(Ordering::Relaxed)
    }

    pub fn analysis_failures(&self) -> u64 {
        self.analysis_failures.load(Ordering::Relaxed)
    }

    pub fn detections(&self) -> u64 {
        self.detections.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Share of analyzed frames among displayed ones, as a percentage
    pub fn analysis_rate(&self) -> f64 {
        let displayed = self.frames_displayed();
        if displayed == 0 {
            return 0.0;
        }
        (self.analyses_dispatched() as f64 / displayed as f64) * 100.0
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_displayed: self.frames_displayed(),
            frames_discarded: self.frames_discarded(),
            analyses_dispatched: self.analyses_dispatched(),
            analyses_skipped: self.analyses_skipped(),
            analysis_failures: self.analysis_failures(),
            detections: self.detections(),
            events_dropped: self.events_dropped(),
            analysis_rate: self.analysis_rate(),
        }
    }
}

impl Default for SessionHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_displayed: u64,
    pub frames_discarded: u64,
    pub analyses_dispatched: u64,
    pub analyses_skipped: u64,
    pub analysis_failures: u64,
    pub detections: u64,
    pub events_dropped: u64,
    pub analysis_rate: f64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} frames ({} discarded), {} analyses ({:.2}%, {} skipped, {} failed), {} detections, {} events dropped",
            self.frames_displayed,
            self.frames_discarded,
            self.analyses_dispatched,
            self.analysis_rate,
            self.analyses_skipped,
            self.analysis_failures,
            self.detections,
            self.events_dropped
        )
    }
}

/// Log the health summary every `interval` until cancelled
pub async fn log_periodically(
    health: Arc<SessionHealth>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                info!("CaptureSession: {}", health.summary());
            }
        }
    }
}
