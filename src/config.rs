use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::capture::PixelFormat;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

/// Runtime configuration, read from a JSON file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub session: SessionConfig,
    pub synthetic: SyntheticConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub pixel_format: PixelFormat,
    pub teardown_timeout_ms: u64,
    /// Seconds between health log lines while running, 0 disables
    pub health_log_interval_secs: u64,
    /// Reset the analysis mode after this many consecutive analyzer failures
    pub disable_after_failures: Option<u32>,
}

impl SessionConfig {
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    pub fn health_log_interval(&self) -> Option<Duration> {
        (self.health_log_interval_secs > 0)
            .then(|| Duration::from_secs(self.health_log_interval_secs))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Bgra8,
            teardown_timeout_ms: 500,
            health_log_interval_secs: 30,
            disable_after_failures: None,
        }
    }
}

/// Describes the synthetic camera backend used by the binary
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyntheticConfig {
    pub authorized: bool,
    pub sensor_width: u32,
    pub sensor_height: u32,
    pub torch: bool,
    /// 0 means frames are only produced on demand
    pub fps: u32,
    pub front_camera: bool,
    /// Analysis mode served by the frame statistics analyzer, 0 disables it
    pub frame_stats_mode: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            authorized: false,
            sensor_width: 640,
            sensor_height: 480,
            torch: true,
            fps: 30,
            front_camera: true,
            frame_stats_mode: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: Config = serde_json::from_str(
            r#"{"session": {"teardownTimeoutMs": 100, "disableAfterFailures": 3}, "synthetic": {"fps": 0}}"#,
        )
        .unwrap();

        assert_eq!(config.session.teardown_timeout(), Duration::from_millis(100));
        assert_eq!(config.session.disable_after_failures, Some(3));
        assert_eq!(config.session.health_log_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.synthetic.fps, 0);
        assert_eq!(config.synthetic.sensor_width, 640);
        assert!(config.synthetic.front_camera);
        assert_eq!(config.synthetic.frame_stats_mode, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.session.pixel_format, PixelFormat::Bgra8);
        assert!(config.session.disable_after_failures.is_none());
        assert!(!config.synthetic.authorized);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/camerax.json")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
