//! Back-pressured analyzer dispatch
//!
//! At most one analyzer call is in flight per session. Frames arriving while
//! it runs are not analyzed; they are dropped, never queued.

use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::analyzer::{AnalysisMode, Analyzer, AnalyzerRegistry};
use super::health::SessionHealth;
use super::types::Frame;
use crate::capture::ImageOrientation;
use crate::error::SessionError;
use crate::events::{SessionEvent, SessionScope};

/// Busy flag for one session's analyzer
#[derive(Default)]
pub struct AnalysisGate {
    busy: AtomicBool,
}

impl AnalysisGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the gate. `None` while another call holds it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePass> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePass { gate: self.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held by the in-flight analyzer call; releases the gate when dropped,
/// including when the call panics or is cancelled.
pub struct GatePass {
    gate: Arc<AnalysisGate>,
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

enum Outcome {
    Detected,
    Failed,
    Cancelled,
}

/// Runs the selected analyzer on frames the gate lets through
pub struct AnalysisDispatcher {
    registry: AnalyzerRegistry,
    gate: Arc<AnalysisGate>,
    scope: Arc<SessionScope>,
    health: Arc<SessionHealth>,
    mode: Arc<watch::Sender<AnalysisMode>>,
    disable_after_failures: Option<u32>,
    consecutive_failures: Arc<AtomicU32>,
    cancel: CancellationToken,
}

impl AnalysisDispatcher {
    pub fn new(
        registry: AnalyzerRegistry,
        scope: Arc<SessionScope>,
        health: Arc<SessionHealth>,
        mode: Arc<watch::Sender<AnalysisMode>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            gate: AnalysisGate::new(),
            scope,
            health,
            mode,
            disable_after_failures: None,
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            cancel,
        }
    }

    /// Reset the mode to `None` after this many consecutive failures
    pub fn with_failure_limit(mut self, limit: Option<u32>) -> Self {
        self.disable_after_failures = limit.filter(|n| *n > 0);
        self
    }

    pub fn gate(&self) -> &Arc<AnalysisGate> {
        &self.gate
    }

    /// Start one analyzer call on `frame` unless the gate is busy.
    ///
    /// Returns whether an analyzer was invoked.
    pub fn try_dispatch(
        &self,
        frame: Arc<Frame>,
        mode: AnalysisMode,
        orientation: ImageOrientation,
    ) -> bool {
        if mode.is_none() {
            return false;
        }
        let Some(pass) = self.gate.try_acquire() else {
            self.health.record_skip();
            return false;
        };
        let Some(analyzer) = self.registry.get(mode) else {
            debug!("AnalysisDispatcher: no analyzer registered for {}", mode);
            return false;
        };

        self.health.record_dispatch();
        let scope = self.scope.clone();
        let health = self.health.clone();
        let failures = self.consecutive_failures.clone();
        let mode_tx = self.mode.clone();
        let limit = self.disable_after_failures;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let outcome =
                run_analyzer(analyzer.clone(), frame, orientation, &scope, &health, cancel).await;

            match outcome {
                Outcome::Detected => {
                    failures.store(0, Ordering::Relaxed);
                }
                Outcome::Failed => {
                    health.record_failure();
                    let count = failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if limit.is_some_and(|limit| count >= limit) {
                        failures.store(0, Ordering::Relaxed);
                        disable_mode(&mode_tx, mode, count, analyzer.kind());
                    }
                }
                Outcome::Cancelled => {}
            }
            // the gate opens only once this call is fully accounted for
            drop(pass);
        });
        true
    }
}

async fn run_analyzer(
    analyzer: Arc<dyn Analyzer>,
    frame: Arc<Frame>,
    orientation: ImageOrientation,
    scope: &SessionScope,
    health: &SessionHealth,
    cancel: CancellationToken,
) -> Outcome {
    let kind = analyzer.kind().to_string();
    let sequence = frame.sequence;
    let worker = analyzer.clone();
    let mut call = tokio::spawn(async move { worker.analyze(frame, orientation).await });

    let joined = tokio::select! {
        joined = &mut call => joined,
        _ = cancel.cancelled() => {
            call.abort();
            debug!("AnalysisDispatcher: {} analysis of frame {} cancelled", kind, sequence);
            return Outcome::Cancelled;
        }
    };

    let result = match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(anyhow::anyhow!("analyzer panicked")),
        Err(_) => return Outcome::Cancelled,
    };

    match result {
        Ok(detections) => {
            for detection in detections {
                let delivered = scope.emit(SessionEvent::Detection {
                    kind: kind.clone(),
                    data: detection.data,
                });
                health.record_detection(delivered);
            }
            Outcome::Detected
        }
        Err(source) => {
            let err = SessionError::AnalysisFailure { kind, source };
            debug!("AnalysisDispatcher: frame {}: {}", sequence, err);
            Outcome::Failed
        }
    }
}

fn disable_mode(mode_tx: &watch::Sender<AnalysisMode>, mode: AnalysisMode, failures: u32, kind: &str) {
    let reset = mode_tx.send_if_modified(|current| {
        if *current == mode {
            *current = AnalysisMode::None;
            true
        } else {
            false
        }
    });
    if reset {
        warn!(
            "AnalysisDispatcher: {} analyzer failed {} times in a row, analysis disabled",
            kind, failures
        );
    }
}
