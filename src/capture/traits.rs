//! Traits for camera device backends

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::orientation::ConnectionSettings;
use super::output::VideoOutput;
use super::types::{CameraPosition, Dimensions, PermissionStatus, PixelFormat, TorchState};

/// Errors reported by a device backend
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("video input unavailable: {0}")]
    InputUnavailable(String),
    #[error("video output cannot be attached for {0:?} frames")]
    UnsupportedFormat(PixelFormat),
    #[error("failed to lock device for configuration: {0}")]
    LockFailed(String),
    #[error("device must be locked for configuration first")]
    NotLocked,
    #[error("device rejected the request: {0}")]
    Rejected(String),
    #[error("property observation failed: {0}")]
    ObserverFailed(String),
}

/// Callback invoked with the new torch state on every change
pub type TorchCallback = Arc<dyn Fn(TorchState) + Send + Sync>;

/// Handle of one torch subscription, needed to remove it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

impl ObserverToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Platform entry point: permissions and device discovery
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Current permission state, without prompting
    fn authorization_status(&self) -> PermissionStatus;

    /// Prompt for permission if undecided and wait for the answer
    async fn request_access(&self) -> bool;

    /// First device found at the given position
    fn discover(&self, position: CameraPosition) -> Option<Arc<dyn CameraDevice>>;
}

/// A physical camera
pub trait CameraDevice: Send + Sync {
    fn id(&self) -> &str;

    fn position(&self) -> CameraPosition;

    /// Size of the active format as reported by the sensor
    fn active_dimensions(&self) -> Dimensions;

    fn has_torch(&self) -> bool;

    fn torch_state(&self) -> TorchState;

    /// Take exclusive configuration access. Must be paired with `unlock_for_configuration`.
    fn lock_for_configuration(&self) -> Result<(), DeviceError>;

    fn unlock_for_configuration(&self);

    /// Change the torch; requires the configuration lock
    fn set_torch_state(&self, state: TorchState) -> Result<(), DeviceError>;

    fn observe_torch(&self, callback: TorchCallback) -> Result<ObserverToken, DeviceError>;

    /// Remove a torch subscription; false when the token is unknown
    fn remove_torch_observer(&self, token: ObserverToken) -> bool;

    /// Open a video input reading from this device
    fn open_input(&self) -> Result<Box<dyn VideoInput>, DeviceError>;
}

/// Video input wired between a device and a `VideoOutput`
pub trait VideoInput: Send + Sync {
    fn supports_format(&self, format: PixelFormat) -> bool;

    fn supports_mirroring(&self) -> bool;

    /// Begin producing frames into `output`
    fn start(
        &mut self,
        output: VideoOutput,
        connection: ConnectionSettings,
    ) -> Result<(), DeviceError>;

    /// Stop producing and detach from the output. Safe to call repeatedly.
    fn stop(&mut self);
}

/// Configuration lock held for the lifetime of the guard
pub struct ConfigurationLock<'a> {
    device: &'a dyn CameraDevice,
}

impl<'a> ConfigurationLock<'a> {
    pub fn acquire(device: &'a dyn CameraDevice) -> Result<Self, DeviceError> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }
}

impl Drop for ConfigurationLock<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}
