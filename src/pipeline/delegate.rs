//! Per-session frame delegate

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::analyzer::AnalysisMode;
use super::gate::AnalysisDispatcher;
use super::health::SessionHealth;
use super::types::Frame;
use crate::capture::{CameraPosition, DeviceOrientation, FrameReceiver, image_orientation};
use crate::display::FrameSlot;

/// Consumes the video output in capture order. Every frame goes to the
/// slot first; analysis is attempted afterwards and never holds up display.
pub struct FramePipeline {
    slot: Arc<FrameSlot>,
    dispatcher: AnalysisDispatcher,
    mode: watch::Receiver<AnalysisMode>,
    orientation: watch::Receiver<DeviceOrientation>,
    position: CameraPosition,
    health: Arc<SessionHealth>,
}

impl FramePipeline {
    pub fn new(
        slot: Arc<FrameSlot>,
        dispatcher: AnalysisDispatcher,
        mode: watch::Receiver<AnalysisMode>,
        orientation: watch::Receiver<DeviceOrientation>,
        position: CameraPosition,
        health: Arc<SessionHealth>,
    ) -> Self {
        Self {
            slot,
            dispatcher,
            mode,
            orientation,
            position,
            health,
        }
    }

    /// Returns whether an analyzer was started for this frame
    pub fn handle_frame(&self, frame: Arc<Frame>) -> bool {
        self.slot.write(frame.clone());
        self.health.record_frame();

        let mode = *self.mode.borrow();
        if mode.is_none() {
            return false;
        }
        let orientation = image_orientation(*self.orientation.borrow(), self.position);
        self.dispatcher.try_dispatch(frame, mode, orientation)
    }

    pub async fn run(self, mut frames: FrameReceiver, cancel: CancellationToken) {
        info!("FramePipeline: started for {} camera", self.position);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        debug!("FramePipeline: video output detached");
                        break;
                    };
                    self.handle_frame(frame);
                    self.health.set_frames_discarded(frames.discarded());
                }
            }
        }

        info!("FramePipeline: finished, {}", self.health.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Dimensions, ImageOrientation, OutputSettings, PixelFormat, VideoOutput};
    use crate::events::{EventSink, SessionEvent, SessionScope};
    use crate::pipeline::analyzer::{AnalyzerRegistry, Detection, FnAnalyzer};
    use crate::pipeline::Timestamp;
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            Bytes::from(vec![0u8; 4]),
            Dimensions::new(1, 1),
            PixelFormat::Bgra8,
            Timestamp::from_micros(sequence as i64),
            sequence,
        )
    }

    fn pipeline(
        mode: AnalysisMode,
        sink: &EventSink,
    ) -> (FramePipeline, Arc<FrameSlot>, watch::Sender<AnalysisMode>, watch::Sender<DeviceOrientation>) {
        let analyzer = Arc::new(FnAnalyzer::new(
            "barcode",
            |frame: Arc<Frame>, orientation: ImageOrientation| async move {
                Ok(vec![Detection::new(json!({
                    "sequence": frame.sequence,
                    "orientation": orientation,
                }))])
            },
        ));
        let registry = AnalyzerRegistry::new().with(AnalysisMode::Barcode, analyzer);
        let health = Arc::new(SessionHealth::new());
        let (mode_tx, mode_rx) = watch::channel(mode);
        let (orientation_tx, orientation_rx) = watch::channel(DeviceOrientation::Portrait);
        let dispatcher = AnalysisDispatcher::new(
            registry,
            SessionScope::new(sink.clone()),
            health.clone(),
            Arc::new(watch::channel(mode).0),
            CancellationToken::new(),
        );
        let slot = Arc::new(FrameSlot::new());
        let pipeline = FramePipeline::new(
            slot.clone(),
            dispatcher,
            mode_rx,
            orientation_rx,
            CameraPosition::Back,
            health,
        );
        (pipeline, slot, mode_tx, orientation_tx)
    }

    #[tokio::test]
    async fn test_display_path_runs_without_analysis() {
        let sink = EventSink::new();
        let (pipeline, slot, _mode, _orientation) = pipeline(AnalysisMode::None, &sink);

        assert!(!pipeline.handle_frame(Arc::new(frame(1))));
        assert_eq!(slot.read().unwrap().sequence, 1);
        assert_eq!(pipeline.health.frames_displayed(), 1);
    }

    #[tokio::test]
    async fn test_mode_and_orientation_apply_to_next_frame() {
        let sink = EventSink::new();
        let mut rx = sink.listen();
        let (pipeline, slot, mode, orientation) = pipeline(AnalysisMode::None, &sink);

        pipeline.handle_frame(Arc::new(frame(1)));
        mode.send_replace(AnalysisMode::Barcode);
        orientation.send_replace(DeviceOrientation::LandscapeRight);
        assert!(pipeline.handle_frame(Arc::new(frame(2))));
        assert_eq!(slot.read().unwrap().sequence, 2);

        match rx.recv().await.unwrap() {
            SessionEvent::Detection { data, .. } => {
                assert_eq!(data["sequence"], 2);
                assert_eq!(data["orientation"], "down");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_until_output_detached() {
        let sink = EventSink::new();
        let (pipeline, slot, _mode, _orientation) = pipeline(AnalysisMode::None, &sink);
        let (output, frames) = VideoOutput::new(OutputSettings {
            pixel_format: PixelFormat::Bgra8,
        });
        let mut reader = slot.subscribe();
        let task = tokio::spawn(pipeline.run(frames, CancellationToken::new()));

        output.deliver(frame(7));
        let seen = tokio::time::timeout(Duration::from_secs(1), reader.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.sequence, 7);

        drop(output);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let sink = EventSink::new();
        let (pipeline, _slot, _mode, _orientation) = pipeline(AnalysisMode::None, &sink);
        let (_output, frames) = VideoOutput::new(OutputSettings {
            pixel_format: PixelFormat::Bgra8,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pipeline.run(frames, cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
