//! Value types shared by the device layer and the session

use serde::{Deserialize, Serialize};

/// Physical camera placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "i64")]
pub enum CameraPosition {
    Front,
    Back,
}

/// 0 is the front camera, anything else the back one.
impl From<i64> for CameraPosition {
    fn from(value: i64) -> Self {
        if value == 0 {
            CameraPosition::Front
        } else {
            CameraPosition::Back
        }
    }
}

impl From<CameraPosition> for u8 {
    fn from(position: CameraPosition) -> Self {
        match position {
            CameraPosition::Front => 0,
            CameraPosition::Back => 1,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

/// Platform camera permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum PermissionStatus {
    Undetermined,
    Authorized,
    Denied,
}

impl From<PermissionStatus> for u8 {
    fn from(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Undetermined => 0,
            PermissionStatus::Authorized => 1,
            PermissionStatus::Denied => 2,
        }
    }
}

/// Torch mode as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TorchState {
    Off,
    On,
    Auto,
}

impl From<TorchState> for u8 {
    fn from(state: TorchState) -> Self {
        match state {
            TorchState::Off => 0,
            TorchState::On => 1,
            TorchState::Auto => 2,
        }
    }
}

impl TryFrom<u8> for TorchState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TorchState::Off),
            1 => Ok(TorchState::On),
            2 => Ok(TorchState::Auto),
            other => Err(format!("invalid torch state {}", other)),
        }
    }
}

/// Torch mode a host may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum TorchMode {
    Off,
    On,
}

/// 1 turns the torch on, anything else turns it off.
impl From<i64> for TorchMode {
    fn from(value: i64) -> Self {
        if value == 1 { TorchMode::On } else { TorchMode::Off }
    }
}

impl From<TorchMode> for TorchState {
    fn from(mode: TorchMode) -> Self {
        match mode {
            TorchMode::Off => TorchState::Off,
            TorchMode::On => TorchState::On,
        }
    }
}

/// Pixel layout produced by the video output
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Bgra8,
    Nv12,
}

impl PixelFormat {
    /// Bytes needed for one frame of the given size
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Bgra8 => pixels * 4,
            PixelFormat::Nv12 => pixels + pixels / 2,
        }
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Swap the axes, as sensors report landscape sizes for portrait output
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_decoding_follows_plugin_conventions() {
        assert_eq!(CameraPosition::from(0), CameraPosition::Front);
        assert_eq!(CameraPosition::from(1), CameraPosition::Back);
        assert_eq!(CameraPosition::from(7), CameraPosition::Back);
        assert_eq!(CameraPosition::from(256), CameraPosition::Back);
        assert_eq!(CameraPosition::from(-1), CameraPosition::Back);

        assert_eq!(TorchMode::from(1), TorchMode::On);
        assert_eq!(TorchMode::from(0), TorchMode::Off);
        assert_eq!(TorchMode::from(5), TorchMode::Off);
        assert_eq!(TorchMode::from(257), TorchMode::Off);
        assert_eq!(TorchMode::from(-1), TorchMode::Off);
    }

    #[test]
    fn test_torch_state_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&TorchState::Auto).unwrap(), "2");
        let state: TorchState = serde_json::from_str("1").unwrap();
        assert_eq!(state, TorchState::On);
        assert!(serde_json::from_str::<TorchState>("3").is_err());
    }

    #[test]
    fn test_dimensions_swap_and_portrait() {
        let sensor = Dimensions::new(1920, 1080);
        assert!(!sensor.is_portrait());

        let shown = sensor.swapped();
        assert_eq!(shown, Dimensions::new(1080, 1920));
        assert!(shown.is_portrait());

        assert!(!Dimensions::new(640, 640).is_portrait());
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(PixelFormat::Bgra8.frame_len(4, 2), 32);
        assert_eq!(PixelFormat::Nv12.frame_len(4, 2), 12);
    }
}
