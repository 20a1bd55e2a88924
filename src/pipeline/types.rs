//! Core types for the frame pipeline

use bytes::Bytes;
use std::time::Duration;

use crate::capture::{Dimensions, PixelFormat};

/// Timestamp representation for captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    /// Microseconds since the capture clock started
    pub micros: i64,
}

impl Timestamp {
    /// Create a new timestamp from microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create a timestamp from a duration since the clock base
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            micros: duration.as_micros() as i64,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}µs", self.micros)
    }
}

/// One captured image
///
/// Frames are immutable once produced. The pipeline shares them as
/// `Arc<Frame>` so the display path and an analyzer can hold the same
/// buffer without copying it.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data in `format` layout
    pub data: Bytes,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel layout of `data`
    pub format: PixelFormat,

    /// When the frame was captured
    pub captured_at: Timestamp,

    /// Capture order, strictly increasing per device stream
    pub sequence: u64,
}

impl Frame {
    pub fn new(
        data: Bytes,
        dimensions: Dimensions,
        format: PixelFormat,
        captured_at: Timestamp,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            width: dimensions.width,
            height: dimensions.height,
            format,
            captured_at,
            sequence,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Get the size of the frame data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("size", &self.size())
            .finish()
    }
}
