//! Synthetic camera backend
//!
//! A software camera used when no platform backend is wired in, and by the
//! test suite. Frames are either produced on a timer (`with_fps`) or pushed
//! one by one with `push_frame`, which keeps tests deterministic. Failure
//! switches let callers exercise every error path of the session.

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::orientation::ConnectionSettings;
use super::output::VideoOutput;
use super::traits::{
    CameraBackend, CameraDevice, DeviceError, ObserverToken, TorchCallback, VideoInput,
};
use super::types::{CameraPosition, Dimensions, PermissionStatus, PixelFormat, TorchState};
use crate::config::SyntheticConfig;
use crate::pipeline::{CaptureClock, Frame};

pub struct SyntheticBackend {
    permission: Mutex<PermissionStatus>,
    grant_on_request: bool,
    devices: Vec<SyntheticCamera>,
}

impl SyntheticBackend {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission: Mutex::new(permission),
            grant_on_request: true,
            devices: Vec::new(),
        }
    }

    /// Backend described by the configuration file
    pub fn from_config(config: &SyntheticConfig) -> Self {
        let permission = if config.authorized {
            PermissionStatus::Authorized
        } else {
            PermissionStatus::Undetermined
        };
        let dimensions = Dimensions::new(config.sensor_width, config.sensor_height);

        let mut backend = Self::new(permission).with_camera(
            SyntheticCamera::new(CameraPosition::Back)
                .with_dimensions(dimensions)
                .with_torch(config.torch)
                .with_fps(config.fps),
        );
        if config.front_camera {
            backend = backend.with_camera(
                SyntheticCamera::new(CameraPosition::Front)
                    .with_dimensions(dimensions)
                    .with_fps(config.fps),
            );
        }
        backend
    }

    pub fn with_camera(mut self, camera: SyntheticCamera) -> Self {
        self.devices.push(camera);
        self
    }

    /// Answer "no" to the permission prompt
    pub fn deny_requests(mut self) -> Self {
        self.grant_on_request = false;
        self
    }

    /// Handle to the camera at `position`, for driving it from outside
    pub fn camera(&self, position: CameraPosition) -> Option<SyntheticCamera> {
        self.devices
            .iter()
            .find(|d| d.inner.spec.position == position)
            .cloned()
    }
}

#[async_trait]
impl CameraBackend for SyntheticBackend {
    fn authorization_status(&self) -> PermissionStatus {
        *self
            .permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_access(&self) -> bool {
        // the prompt resolves asynchronously on a real platform
        tokio::task::yield_now().await;

        let mut status = self
            .permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *status == PermissionStatus::Undetermined {
            *status = if self.grant_on_request {
                PermissionStatus::Authorized
            } else {
                PermissionStatus::Denied
            };
            info!("SyntheticBackend: permission resolved to {:?}", *status);
        }
        *status == PermissionStatus::Authorized
    }

    fn discover(&self, position: CameraPosition) -> Option<Arc<dyn CameraDevice>> {
        self.camera(position)
            .map(|camera| Arc::new(camera) as Arc<dyn CameraDevice>)
    }
}

struct ActiveStream {
    output: VideoOutput,
    connection: ConnectionSettings,
    cancel: CancellationToken,
}

#[derive(Clone)]
struct CameraSpec {
    id: String,
    position: CameraPosition,
    dimensions: Dimensions,
    has_torch: bool,
    formats: Vec<PixelFormat>,
    fps: Option<u32>,
}

struct CameraInner {
    spec: CameraSpec,
    clock: CaptureClock,

    torch: Mutex<TorchState>,
    locked: AtomicBool,
    observers: Mutex<HashMap<u64, TorchCallback>>,
    next_token: AtomicU64,
    stream: Mutex<Option<ActiveStream>>,
    open_inputs: AtomicUsize,

    fail_input: AtomicBool,
    fail_lock: AtomicBool,
    fail_observe: AtomicBool,
    reject_torch: AtomicBool,
}

/// Software camera. Clones share the same device.
#[derive(Clone)]
pub struct SyntheticCamera {
    inner: Arc<CameraInner>,
}

impl SyntheticCamera {
    /// 640x480 BGRA camera; only the back camera has a torch.
    pub fn new(position: CameraPosition) -> Self {
        Self::from_spec(CameraSpec {
            id: format!("synthetic-{}", position),
            position,
            dimensions: Dimensions::new(640, 480),
            has_torch: position == CameraPosition::Back,
            formats: vec![PixelFormat::Bgra8],
            fps: None,
        })
    }

    fn from_spec(spec: CameraSpec) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                spec,
                clock: CaptureClock::new(),
                torch: Mutex::new(TorchState::Off),
                locked: AtomicBool::new(false),
                observers: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                stream: Mutex::new(None),
                open_inputs: AtomicUsize::new(0),
                fail_input: AtomicBool::new(false),
                fail_lock: AtomicBool::new(false),
                fail_observe: AtomicBool::new(false),
                reject_torch: AtomicBool::new(false),
            }),
        }
    }

    /// Builder step; yields a fresh device, so call it before sharing the camera.
    fn configure(self, f: impl FnOnce(&mut CameraSpec)) -> Self {
        let mut spec = self.inner.spec.clone();
        f(&mut spec);
        Self::from_spec(spec)
    }

    pub fn with_dimensions(self, dimensions: Dimensions) -> Self {
        self.configure(|c| c.dimensions = dimensions)
    }

    pub fn with_torch(self, has_torch: bool) -> Self {
        self.configure(|c| c.has_torch = has_torch)
    }

    pub fn with_formats(self, formats: Vec<PixelFormat>) -> Self {
        self.configure(|c| c.formats = formats)
    }

    /// Produce frames on a timer instead of on `push_frame`. 0 keeps manual mode.
    pub fn with_fps(self, fps: u32) -> Self {
        self.configure(|c| c.fps = (fps > 0).then_some(fps))
    }

    pub fn set_fail_input(&self, fail: bool) {
        self.inner.fail_input.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lock(&self, fail: bool) {
        self.inner.fail_lock.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_observe(&self, fail: bool) {
        self.inner.fail_observe.store(fail, Ordering::SeqCst);
    }

    pub fn set_reject_torch(&self, reject: bool) {
        self.inner.reject_torch.store(reject, Ordering::SeqCst);
    }

    /// Produce one frame now. False when the camera is not streaming.
    pub fn push_frame(&self) -> bool {
        self.inner.produce_frame()
    }

    /// Change the torch from the hardware side, as an auto torch would
    pub fn simulate_torch_change(&self, state: TorchState) {
        self.inner.apply_torch(state);
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.lock_stream().is_some()
    }

    pub fn connection(&self) -> Option<ConnectionSettings> {
        self.inner.lock_stream().as_ref().map(|s| s.connection)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock_observers().len()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }

    /// Inputs opened and not yet dropped
    pub fn open_inputs(&self) -> usize {
        self.inner.open_inputs.load(Ordering::SeqCst)
    }
}

impl CameraInner {
    fn lock_stream(&self) -> std::sync::MutexGuard<'_, Option<ActiveStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, TorchCallback>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn produce_frame(&self) -> bool {
        let Some((output, connection)) = self
            .lock_stream()
            .as_ref()
            .map(|s| (s.output.clone(), s.connection))
        else {
            return false;
        };

        let dimensions = if connection.swaps_axes() {
            self.spec.dimensions.swapped()
        } else {
            self.spec.dimensions
        };
        let format = output.settings().pixel_format;
        let (sequence, captured_at) = self.clock.next_frame();
        let data = Bytes::from(vec![
            (sequence % 256) as u8;
            format.frame_len(dimensions.width, dimensions.height)
        ]);

        output.deliver(Frame::new(data, dimensions, format, captured_at, sequence))
    }

    fn apply_torch(&self, state: TorchState) {
        {
            let mut torch = self.torch.lock().unwrap_or_else(PoisonError::into_inner);
            if *torch == state {
                return;
            }
            *torch = state;
        }
        let callbacks: Vec<TorchCallback> = self.lock_observers().values().cloned().collect();
        for callback in callbacks {
            callback(state);
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn id(&self) -> &str {
        &self.inner.spec.id
    }

    fn position(&self) -> CameraPosition {
        self.inner.spec.position
    }

    fn active_dimensions(&self) -> Dimensions {
        self.inner.spec.dimensions
    }

    fn has_torch(&self) -> bool {
        self.inner.spec.has_torch
    }

    fn torch_state(&self) -> TorchState {
        *self
            .inner
            .torch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for_configuration(&self) -> Result<(), DeviceError> {
        if self.inner.fail_lock.load(Ordering::SeqCst) {
            return Err(DeviceError::LockFailed("device busy".into()));
        }
        if self.inner.locked.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::LockFailed("already locked".into()));
        }
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.inner.locked.store(false, Ordering::SeqCst);
    }

    fn set_torch_state(&self, state: TorchState) -> Result<(), DeviceError> {
        if !self.inner.locked.load(Ordering::SeqCst) {
            return Err(DeviceError::NotLocked);
        }
        if !self.inner.spec.has_torch {
            return Err(DeviceError::Rejected("device has no torch".into()));
        }
        if self.inner.reject_torch.load(Ordering::SeqCst) {
            return Err(DeviceError::Rejected(format!("torch {:?} not available", state)));
        }
        self.inner.apply_torch(state);
        Ok(())
    }

    fn observe_torch(&self, callback: TorchCallback) -> Result<ObserverToken, DeviceError> {
        if self.inner.fail_observe.load(Ordering::SeqCst) {
            return Err(DeviceError::ObserverFailed("torch mode not observable".into()));
        }
        let id = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        self.inner.lock_observers().insert(id, callback);
        Ok(ObserverToken::new(id))
    }

    fn remove_torch_observer(&self, token: ObserverToken) -> bool {
        self.inner.lock_observers().remove(&token.id()).is_some()
    }

    fn open_input(&self) -> Result<Box<dyn VideoInput>, DeviceError> {
        if self.inner.fail_input.load(Ordering::SeqCst) {
            return Err(DeviceError::InputUnavailable(format!(
                "{} cannot be opened",
                self.inner.spec.id
            )));
        }
        self.inner.open_inputs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticInput {
            camera: self.clone(),
        }))
    }
}

struct SyntheticInput {
    camera: SyntheticCamera,
}

impl VideoInput for SyntheticInput {
    fn supports_format(&self, format: PixelFormat) -> bool {
        self.camera.inner.spec.formats.contains(&format)
    }

    fn supports_mirroring(&self) -> bool {
        true
    }

    fn start(
        &mut self,
        output: VideoOutput,
        connection: ConnectionSettings,
    ) -> Result<(), DeviceError> {
        let cancel = CancellationToken::new();
        {
            let mut stream = self.camera.inner.lock_stream();
            if stream.is_some() {
                return Err(DeviceError::InputUnavailable(
                    "device is already streaming".into(),
                ));
            }
            *stream = Some(ActiveStream {
                output,
                connection,
                cancel: cancel.clone(),
            });
        }

        if let Some(fps) = self.camera.inner.spec.fps {
            let camera = self.camera.clone();
            let period = Duration::from_secs_f64(1.0 / fps as f64);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            camera.push_frame();
                        }
                    }
                }
                debug!("SyntheticCamera: producer for {} finished", camera.inner.spec.id);
            });
        }

        info!(
            "SyntheticCamera: {} streaming (mirrored: {})",
            self.camera.inner.spec.id, connection.mirrored
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.camera.inner.lock_stream().take() {
            stream.cancel.cancel();
            info!("SyntheticCamera: {} stopped", self.camera.inner.spec.id);
        }
    }
}

impl Drop for SyntheticInput {
    fn drop(&mut self) {
        self.stop();
        self.camera.inner.open_inputs.fetch_sub(1, Ordering::SeqCst);
    }
}
