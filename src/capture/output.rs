//! Latest-wins video output
//!
//! The output stage between a device input and the frame delegate. It never
//! queues: when the delegate has not picked up the previous frame yet, the
//! new one replaces it and the older frame is dropped.

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use super::types::PixelFormat;
use crate::pipeline::Frame;

/// Settings of the video output stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub pixel_format: PixelFormat,
}

/// Producer side, handed to a `VideoInput` when it starts
#[derive(Clone)]
pub struct VideoOutput {
    tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
    settings: OutputSettings,
    delivered: Arc<AtomicU64>,
}

/// Consumer side, owned by the session's frame delegate
pub struct FrameReceiver {
    rx: watch::Receiver<Option<Arc<Frame>>>,
    seen: u64,
    delivered: Arc<AtomicU64>,
}

impl VideoOutput {
    pub fn new(settings: OutputSettings) -> (Self, FrameReceiver) {
        let (tx, rx) = watch::channel(None);
        let delivered = Arc::new(AtomicU64::new(0));
        let output = Self {
            tx: Arc::new(tx),
            settings,
            delivered: delivered.clone(),
        };
        let receiver = FrameReceiver {
            rx,
            seen: 0,
            delivered,
        };
        (output, receiver)
    }

    pub fn settings(&self) -> OutputSettings {
        self.settings
    }

    /// Hand a frame to the consumer, replacing any frame it has not taken yet.
    ///
    /// Returns false when the consumer is gone or the frame does not match
    /// the configured pixel format.
    pub fn deliver(&self, frame: Frame) -> bool {
        if frame.format != self.settings.pixel_format {
            warn!(
                "VideoOutput: dropping {:?} frame, output is configured for {:?}",
                frame.format, self.settings.pixel_format
            );
            return false;
        }
        if self.tx.send(Some(Arc::new(frame))).is_err() {
            return false;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Whether a consumer is still attached
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl FrameReceiver {
    /// Wait for the newest frame. Returns `None` once the output is dropped.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        loop {
            self.rx.changed().await.ok()?;
            let frame = self.rx.borrow_and_update().clone();
            if let Some(frame) = frame {
                self.seen += 1;
                return Some(frame);
            }
        }
    }

    /// Frames replaced before the consumer could take them
    pub fn discarded(&self) -> u64 {
        self.delivered
            .load(Ordering::Relaxed)
            .saturating_sub(self.seen)
    }
}
