//! Camera device layer
//!
//! Platform backends implement the traits in `traits`; the session only talks
//! to devices through them. A synthetic backend is provided for hosts without
//! a platform backend and for tests.

pub mod orientation;
pub mod output;
pub mod synthetic;
mod traits;
mod types;

pub use orientation::{ConnectionSettings, DeviceOrientation, ImageOrientation, image_orientation};
pub use output::{FrameReceiver, OutputSettings, VideoOutput};
pub use synthetic::{SyntheticBackend, SyntheticCamera};
pub use traits::{
    CameraBackend, CameraDevice, ConfigurationLock, DeviceError, ObserverToken, TorchCallback,
    VideoInput,
};
pub use types::{
    CameraPosition, Dimensions, PermissionStatus, PixelFormat, TorchMode, TorchState,
};
