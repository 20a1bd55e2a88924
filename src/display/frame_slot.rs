//! Single-slot latest-frame buffer
//!
//! The slot sits between the camera producer and the display consumer. It
//! holds exactly one frame: every write replaces the previous one, there is
//! no backlog, and the producer never waits for a reader. A display that
//! pulls slower than the camera produces simply skips frames.
//!
//! # Design
//!
//! The slot is a `watch` channel carrying the current frame and a generation
//! counter. Writers replace the value in place; readers clone the `Arc` out
//! of it, so a reader always observes a complete frame (old or new) and holds
//! it for as long as it likes without blocking the next write.

use std::sync::Arc;
use tokio::sync::watch;

use crate::pipeline::Frame;

#[derive(Clone, Default)]
struct SlotState {
    frame: Option<Arc<Frame>>,
    generation: u64,
}

/// Latest-frame buffer shared between producer and display
pub struct FrameSlot {
    state: watch::Sender<SlotState>,
}

impl FrameSlot {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SlotState::default());
        Self { state }
    }

    /// Replace the current frame. Returns the new generation.
    pub fn write(&self, frame: Arc<Frame>) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.frame = Some(frame);
            generation = s.generation;
        });
        generation
    }

    /// The latest frame, or `None` if nothing was written since the last clear
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.state.borrow().frame.clone()
    }

    /// Number of writes so far; never decreases, not even on `clear`
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Drop the current frame
    pub fn clear(&self) {
        self.state.send_if_modified(|s| s.frame.take().is_some());
    }

    /// Reader that can wait for frames newer than the ones it has seen
    pub fn subscribe(&self) -> FrameReader {
        FrameReader {
            rx: self.state.subscribe(),
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Display-side handle on a `FrameSlot`
pub struct FrameReader {
    rx: watch::Receiver<SlotState>,
}

impl FrameReader {
    /// Whether the slot changed since this reader last looked
    pub fn has_new_frame(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Latest frame, marking it seen
    pub fn latest(&mut self) -> Option<Arc<Frame>> {
        self.rx.borrow_and_update().frame.clone()
    }

    /// Wait until a frame newer than the last seen one is written.
    ///
    /// Returns `None` when the slot is gone.
    pub async fn next(&mut self) -> Option<Arc<Frame>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().frame.clone() {
                return Some(frame);
            }
        }
    }
}
