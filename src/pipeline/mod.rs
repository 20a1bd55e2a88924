//! Capture session and frame pipeline
//!
//! Frames flow from the device's video output into a per-session delegate,
//! which writes every frame to the display slot and then offers it to the
//! analysis gate:
//!
//! - `session`: lifecycle state machine owning the device while running
//! - `delegate`: frame delegate, slot write then gate attempt in capture order
//! - `gate`: at most one analyzer call in flight, frames dropped while busy
//! - `analyzer`: analyzer trait and the mode registry
//! - `observer`: torch mode subscription republished as events
//! - `health`: counters with a periodic summary log

pub mod analyzer;
pub mod clock;
pub mod delegate;
pub mod gate;
pub mod health;
pub mod observer;
pub mod session;
pub mod state;
pub mod types;

pub use analyzer::{AnalysisMode, Analyzer, AnalyzerRegistry, Detection, FnAnalyzer, FrameStats};
pub use clock::CaptureClock;
pub use delegate::FramePipeline;
pub use gate::{AnalysisDispatcher, AnalysisGate, GatePass};
pub use health::{HealthSummary, SessionHealth};
pub use observer::TorchObserver;
pub use session::{CaptureSession, SessionHandle};
pub use state::SessionState;
pub use types::{Frame, Timestamp};
