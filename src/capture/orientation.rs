//! Orientation and mirroring rules
//!
//! Two tables live here: how the video connection is set up for a camera
//! position, and which orientation an analyzer must assume for a frame given
//! how the host device is being held.

use serde::{Deserialize, Serialize};

use super::types::CameraPosition;

/// How the host device is physically held
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

/// Orientation of the pixel data handed to an analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageOrientation {
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl ImageOrientation {
    /// Clockwise rotation needed to display the image upright
    pub fn rotation_degrees(&self) -> u16 {
        match self {
            ImageOrientation::Up | ImageOrientation::UpMirrored => 0,
            ImageOrientation::Right | ImageOrientation::RightMirrored => 90,
            ImageOrientation::Down | ImageOrientation::DownMirrored => 180,
            ImageOrientation::Left | ImageOrientation::LeftMirrored => 270,
        }
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(
            self,
            ImageOrientation::UpMirrored
                | ImageOrientation::DownMirrored
                | ImageOrientation::LeftMirrored
                | ImageOrientation::RightMirrored
        )
    }
}

/// Orientation applied by the capture connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Settings applied to every connection between input and output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

impl ConnectionSettings {
    /// Output is always portrait; the front camera is mirrored where the
    /// connection supports it.
    pub fn for_position(position: CameraPosition, mirroring_supported: bool) -> Self {
        Self {
            orientation: VideoOrientation::Portrait,
            mirrored: position == CameraPosition::Front && mirroring_supported,
        }
    }

    /// Whether delivered frames have their axes swapped relative to the sensor
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self.orientation,
            VideoOrientation::Portrait | VideoOrientation::PortraitUpsideDown
        )
    }
}

/// Orientation an analyzer must assume for a frame
pub fn image_orientation(device: DeviceOrientation, position: CameraPosition) -> ImageOrientation {
    let front = position == CameraPosition::Front;
    match device {
        DeviceOrientation::Portrait => {
            if front {
                ImageOrientation::LeftMirrored
            } else {
                ImageOrientation::Right
            }
        }
        DeviceOrientation::LandscapeLeft => {
            if front {
                ImageOrientation::DownMirrored
            } else {
                ImageOrientation::Up
            }
        }
        DeviceOrientation::PortraitUpsideDown => {
            if front {
                ImageOrientation::RightMirrored
            } else {
                ImageOrientation::Left
            }
        }
        DeviceOrientation::LandscapeRight => {
            if front {
                ImageOrientation::UpMirrored
            } else {
                ImageOrientation::Down
            }
        }
        DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
            ImageOrientation::Up
        }
    }
}
