//! Capture session lifecycle
//!
//! A session owns one camera device while running. Everything allocated by
//! `start` lives in a single `ActiveSession` that `stop` takes apart again, so
//! no device, wiring or emission path outlives the run that created it.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::analyzer::{AnalysisMode, AnalyzerRegistry};
use super::delegate::FramePipeline;
use super::gate::AnalysisDispatcher;
use super::health::{self, SessionHealth};
use super::observer::TorchObserver;
use super::state::SessionState;
use crate::capture::{
    CameraBackend, CameraDevice, CameraPosition, ConfigurationLock, ConnectionSettings,
    DeviceError, DeviceOrientation, Dimensions, OutputSettings, PermissionStatus, TorchMode,
    TorchState, VideoInput, VideoOutput,
};
use crate::config::SessionConfig;
use crate::display::{FrameSlot, FrameSources};
use crate::error::{Result, SessionError};
use crate::events::{EventSink, SessionScope};

/// What the host learns about a started session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub frame_source_id: i64,
    /// Sensor size with axes swapped for portrait output
    pub size: Dimensions,
    pub torchable: bool,
    pub portrait: bool,
    #[serde(skip)]
    pub position: CameraPosition,
}

/// Fields that exist only between `start` and `stop`
struct ActiveSession {
    device: Arc<dyn CameraDevice>,
    input: Box<dyn VideoInput>,
    position: CameraPosition,
    frame_source_id: i64,
    scope: Arc<SessionScope>,
    observer: Option<TorchObserver>,
    cancel: CancellationToken,
    delegate: Option<JoinHandle<()>>,
    health_logger: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Synchronous part of stop. Returns the delegate task so the caller
    /// can wait for it.
    fn teardown(&mut self, sources: &FrameSources, slot: &FrameSlot) -> Option<JoinHandle<()>> {
        // nothing this run emits reaches the host past this point
        self.scope.close();
        self.cancel.cancel();

        self.input.stop();
        if let Some(mut observer) = self.observer.take() {
            observer.unsubscribe();
        }
        self.torch_off();

        if !sources.unregister(self.frame_source_id) {
            warn!(
                "CaptureSession: frame source {} was not registered",
                self.frame_source_id
            );
        }
        slot.clear();

        if let Some(logger) = self.health_logger.take() {
            logger.abort();
        }
        self.delegate.take()
    }

    fn torch_off(&self) {
        if !self.device.has_torch() || self.device.torch_state() == TorchState::Off {
            return;
        }
        let result = ConfigurationLock::acquire(self.device.as_ref())
            .and_then(|_lock| self.device.set_torch_state(TorchState::Off));
        if let Err(e) = result {
            debug!("CaptureSession: could not turn torch off: {}", e);
        }
    }
}

pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    analyzers: AnalyzerRegistry,
    config: SessionConfig,
    sources: Arc<FrameSources>,
    events: EventSink,
    slot: Arc<FrameSlot>,
    mode: Arc<watch::Sender<AnalysisMode>>,
    orientation: Arc<watch::Sender<DeviceOrientation>>,
    health: Arc<SessionHealth>,
    state: SessionState,
    active: Option<ActiveSession>,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        analyzers: AnalyzerRegistry,
        config: SessionConfig,
    ) -> Self {
        let (mode, _) = watch::channel(AnalysisMode::None);
        let (orientation, _) = watch::channel(DeviceOrientation::default());
        Self {
            backend,
            analyzers,
            config,
            sources: Arc::new(FrameSources::new()),
            events: EventSink::new(),
            slot: Arc::new(FrameSlot::new()),
            mode: Arc::new(mode),
            orientation: Arc::new(orientation),
            health: Arc::new(SessionHealth::new()),
            state: SessionState::Idle,
            active: None,
        }
    }

    pub fn query_permission(&self) -> PermissionStatus {
        self.backend.authorization_status()
    }

    /// Prompt for camera access if not decided yet
    pub async fn request_permission(&self) -> bool {
        match self.backend.authorization_status() {
            PermissionStatus::Authorized => true,
            PermissionStatus::Denied => false,
            PermissionStatus::Undetermined => self.backend.request_access().await,
        }
    }

    pub async fn start(&mut self, position: CameraPosition) -> Result<SessionHandle> {
        if !self.state.can_start() {
            return Err(SessionError::Unsupported("session is already running"));
        }
        if self.backend.authorization_status() != PermissionStatus::Authorized {
            return Err(SessionError::PermissionDenied);
        }

        self.transition(SessionState::Configuring);
        match self.configure(position) {
            Ok((active, handle)) => {
                self.active = Some(active);
                self.transition(SessionState::Running {
                    started_at: Instant::now(),
                });
                info!(
                    "CaptureSession: started {} camera, {}x{} (source {})",
                    position, handle.size.width, handle.size.height, handle.frame_source_id
                );
                Ok(handle)
            }
            Err(e) => {
                warn!("CaptureSession: failed to start {} camera: {}", position, e);
                self.transition(SessionState::Idle);
                Err(e)
            }
        }
    }

    fn configure(&mut self, position: CameraPosition) -> Result<(ActiveSession, SessionHandle)> {
        let device = self
            .backend
            .discover(position)
            .ok_or(SessionError::DeviceNotFound(position))?;

        let mut input = device.open_input()?;
        let pixel_format = self.config.pixel_format;
        if !input.supports_format(pixel_format) {
            return Err(DeviceError::UnsupportedFormat(pixel_format).into());
        }
        let (output, frames) = VideoOutput::new(OutputSettings { pixel_format });
        let connection = ConnectionSettings::for_position(position, input.supports_mirroring());
        // a failed start drops `input`, which releases it
        input.start(output, connection)?;

        let health = Arc::new(SessionHealth::new());
        self.health = health.clone();
        let scope = SessionScope::new(self.events.clone());
        let cancel = CancellationToken::new();

        let observer = match TorchObserver::subscribe(device.clone(), scope.clone(), health.clone())
        {
            Ok(observer) => Some(observer),
            Err(e) => {
                warn!("CaptureSession: running without torch events: {}", e);
                None
            }
        };

        let frame_source_id = self.sources.register(self.slot.clone());

        let dispatcher = AnalysisDispatcher::new(
            self.analyzers.clone(),
            scope.clone(),
            health.clone(),
            self.mode.clone(),
            cancel.child_token(),
        )
        .with_failure_limit(self.config.disable_after_failures);
        let pipeline = FramePipeline::new(
            self.slot.clone(),
            dispatcher,
            self.mode.subscribe(),
            self.orientation.subscribe(),
            position,
            health.clone(),
        );
        let delegate = tokio::spawn(pipeline.run(frames, cancel.clone()));
        let health_logger = self.config.health_log_interval().map(|interval| {
            tokio::spawn(health::log_periodically(health.clone(), interval, cancel.clone()))
        });

        let size = device.active_dimensions().swapped();
        let handle = SessionHandle {
            frame_source_id,
            size,
            torchable: device.has_torch(),
            portrait: size.is_portrait(),
            position,
        };
        let active = ActiveSession {
            device,
            input,
            position,
            frame_source_id,
            scope,
            observer,
            cancel,
            delegate: Some(delegate),
            health_logger,
        };
        Ok((active, handle))
    }

    pub fn set_torch(&self, mode: TorchMode) -> Result<()> {
        let Some(active) = &self.active else {
            return Err(SessionError::Unsupported("camera is not running"));
        };
        if !active.device.has_torch() {
            return Err(SessionError::Unsupported("camera has no torch"));
        }

        let _lock = ConfigurationLock::acquire(active.device.as_ref())?;
        active.device.set_torch_state(mode.into())?;
        debug!("CaptureSession: torch {:?} requested", mode);
        Ok(())
    }

    /// Applies from the next produced frame on
    pub fn set_analysis_mode(&self, mode: AnalysisMode) {
        let previous = self.mode.send_replace(mode);
        if previous != mode {
            info!("CaptureSession: analysis mode {} -> {}", previous, mode);
        }
    }

    pub fn set_device_orientation(&self, orientation: DeviceOrientation) {
        self.orientation.send_replace(orientation);
    }

    /// Release everything `start` allocated. Safe in any state.
    pub async fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            debug!("CaptureSession: stop while {}", self.state);
            return;
        };

        let ran_for = self.state.running_duration().unwrap_or_default();
        let delegate = active.teardown(&self.sources, &self.slot);
        self.mode.send_replace(AnalysisMode::None);
        self.transition(SessionState::Stopped);

        if let Some(mut delegate) = delegate {
            let timeout = self.config.teardown_timeout();
            if tokio::time::timeout(timeout, &mut delegate).await.is_err() {
                warn!(
                    "CaptureSession: frame delegate did not finish within {:?}, aborting",
                    timeout
                );
                delegate.abort();
            }
        }
        // a frame handled while tearing down may have landed in the slot
        self.slot.clear();

        info!(
            "CaptureSession: stopped {} camera after {:.1}s, {}",
            active.position,
            ran_for.as_secs_f64(),
            self.health.summary()
        );
    }

    fn transition(&mut self, target: SessionState) {
        if !self.state.can_transition_to(&target) {
            warn!(
                "CaptureSession: unexpected transition {} -> {}",
                self.state, target
            );
        }
        // only a running session owns device wiring
        if target.is_running() != self.active.is_some() {
            warn!(
                "CaptureSession: {} with{} device wiring",
                target,
                if self.active.is_some() { "" } else { "out" }
            );
        }
        self.state = target;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn position(&self) -> Option<CameraPosition> {
        self.active.as_ref().map(|a| a.position)
    }

    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        self.slot.clone()
    }

    pub fn sources(&self) -> Arc<FrameSources> {
        self.sources.clone()
    }

    /// Health of the current or most recent run
    pub fn health(&self) -> Arc<SessionHealth> {
        self.health.clone()
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn analysis_mode(&self) -> AnalysisMode {
        *self.mode.borrow()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(delegate) = active.teardown(&self.sources, &self.slot) {
                delegate.abort();
            }
            info!("CaptureSession: dropped while running, {} camera released", active.position);
        }
    }
}
