//! Analyzer interface and registry
//!
//! Analyzers are opaque: they get a shared frame plus the orientation it
//! should be read in, and resolve to zero or more detections.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::types::Frame;
use crate::capture::ImageOrientation;

/// Which analyzer runs on produced frames
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub enum AnalysisMode {
    #[default]
    None,
    Barcode,
    Face,
    Custom(u32),
}

impl AnalysisMode {
    pub fn is_none(&self) -> bool {
        *self == AnalysisMode::None
    }
}

impl From<u32> for AnalysisMode {
    fn from(value: u32) -> Self {
        match value {
            0 => AnalysisMode::None,
            1 => AnalysisMode::Barcode,
            2 => AnalysisMode::Face,
            n => AnalysisMode::Custom(n),
        }
    }
}

impl From<AnalysisMode> for u32 {
    fn from(mode: AnalysisMode) -> Self {
        match mode {
            AnalysisMode::None => 0,
            AnalysisMode::Barcode => 1,
            AnalysisMode::Face => 2,
            AnalysisMode::Custom(n) => n,
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::None => write!(f, "none"),
            AnalysisMode::Barcode => write!(f, "barcode"),
            AnalysisMode::Face => write!(f, "face"),
            AnalysisMode::Custom(n) => write!(f, "custom({})", n),
        }
    }
}

/// One analyzer result, passed to the host untouched
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub data: Value,
}

impl Detection {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Tag carried by every detection event this analyzer produces
    fn kind(&self) -> &str;

    async fn analyze(
        &self,
        frame: Arc<Frame>,
        orientation: ImageOrientation,
    ) -> anyhow::Result<Vec<Detection>>;
}

type AnalyzeFn = dyn Fn(Arc<Frame>, ImageOrientation) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Detection>>> + Send>>
    + Send
    + Sync;

/// Analyzer backed by an async closure
pub struct FnAnalyzer {
    kind: String,
    f: Box<AnalyzeFn>,
}

impl FnAnalyzer {
    pub fn new<F, Fut>(kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<Frame>, ImageOrientation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<Detection>>> + Send + 'static,
    {
        Self {
            kind: kind.into(),
            f: Box::new(move |frame, orientation| Box::pin(f(frame, orientation))),
        }
    }
}

#[async_trait]
impl Analyzer for FnAnalyzer {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn analyze(
        &self,
        frame: Arc<Frame>,
        orientation: ImageOrientation,
    ) -> anyhow::Result<Vec<Detection>> {
        (self.f)(frame, orientation).await
    }
}

/// Reports basic statistics of every analyzed frame
///
/// Stands in for a real detector when frames come from the synthetic
/// camera.
pub struct FrameStats;

#[async_trait]
impl Analyzer for FrameStats {
    fn kind(&self) -> &str {
        "frameStats"
    }

    async fn analyze(
        &self,
        frame: Arc<Frame>,
        orientation: ImageOrientation,
    ) -> anyhow::Result<Vec<Detection>> {
        anyhow::ensure!(!frame.data.is_empty(), "frame {} has no pixels", frame.sequence);
        let total: u64 = frame.data.iter().map(|&b| u64::from(b)).sum();
        let mean = total as f64 / frame.data.len() as f64;
        Ok(vec![Detection::new(serde_json::json!({
            "sequence": frame.sequence,
            "width": frame.width,
            "height": frame.height,
            "rotation": orientation.rotation_degrees(),
            "meanLevel": mean,
        }))])
    }
}

/// Maps each analysis mode to the analyzer that serves it
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<AnalysisMode, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `analyzer` for `mode`, replacing any previous one.
    /// `AnalysisMode::None` never has an analyzer.
    pub fn register(&mut self, mode: AnalysisMode, analyzer: Arc<dyn Analyzer>) -> bool {
        if mode.is_none() {
            return false;
        }
        self.analyzers.insert(mode, analyzer);
        true
    }

    pub fn with(mut self, mode: AnalysisMode, analyzer: Arc<dyn Analyzer>) -> Self {
        self.register(mode, analyzer);
        self
    }

    pub fn get(&self, mode: AnalysisMode) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.get(&mode).cloned()
    }

    pub fn modes(&self) -> Vec<AnalysisMode> {
        let mut modes: Vec<_> = self.analyzers.keys().copied().collect();
        modes.sort_by_key(|m| u32::from(*m));
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Dimensions, PixelFormat};
    use crate::pipeline::Timestamp;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn test_mode_wire_values() {
        assert_eq!(AnalysisMode::from(0), AnalysisMode::None);
        assert_eq!(AnalysisMode::from(1), AnalysisMode::Barcode);
        assert_eq!(AnalysisMode::from(2), AnalysisMode::Face);
        assert_eq!(AnalysisMode::from(7), AnalysisMode::Custom(7));
        assert_eq!(u32::from(AnalysisMode::Custom(7)), 7);

        let mode: AnalysisMode = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(mode, AnalysisMode::Face);
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let analyzer = Arc::new(FnAnalyzer::new("barcode", |frame: Arc<Frame>, _| async move {
            Ok(vec![Detection::new(json!({"sequence": frame.sequence}))])
        }));
        let registry = AnalyzerRegistry::new().with(AnalysisMode::Barcode, analyzer);

        assert!(registry.get(AnalysisMode::Face).is_none());
        assert_eq!(registry.modes(), vec![AnalysisMode::Barcode]);

        let mut none = registry.clone();
        assert!(!none.register(
            AnalysisMode::None,
            Arc::new(FnAnalyzer::new("never", |_, _| async { Ok(Vec::new()) }))
        ));

        let found = registry.get(AnalysisMode::Barcode).unwrap();
        assert_eq!(found.kind(), "barcode");
        let frame = Arc::new(Frame::new(
            Bytes::from_static(&[0; 4]),
            Dimensions::new(1, 1),
            PixelFormat::Bgra8,
            Timestamp::default(),
            9,
        ));
        let detections = found.analyze(frame, ImageOrientation::Up).await.unwrap();
        assert_eq!(detections, vec![Detection::new(json!({"sequence": 9}))]);
    }

    #[tokio::test]
    async fn test_frame_stats() {
        let frame = Arc::new(Frame::new(
            Bytes::from(vec![10u8, 20, 30, 40]),
            Dimensions::new(1, 1),
            PixelFormat::Bgra8,
            Timestamp::default(),
            9,
        ));
        let detections = FrameStats.analyze(frame, ImageOrientation::Right).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].data["sequence"], 9);
        assert_eq!(detections[0].data["rotation"], 90);
        assert_eq!(detections[0].data["meanLevel"], 25.0);

        let empty = Arc::new(Frame::new(
            Bytes::new(),
            Dimensions::new(0, 0),
            PixelFormat::Bgra8,
            Timestamp::default(),
            10,
        ));
        assert!(FrameStats.analyze(empty, ImageOrientation::Up).await.is_err());
    }
}
