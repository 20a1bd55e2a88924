use serde::Serialize;
use thiserror::Error;

use crate::capture::{CameraPosition, DeviceError};

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera permission not granted")]
    PermissionDenied,

    #[error("no {0} camera available")]
    DeviceNotFound(CameraPosition),

    #[error("camera configuration failed: {0}")]
    Configuration(#[from] DeviceError),

    #[error("{0}")]
    Unsupported(&'static str),

    /// Internal diagnostics only, never sent to the host
    #[error("{kind} analysis failed: {source}")]
    AnalysisFailure {
        kind: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Wire tag of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceNotFound,
    ConfigurationError,
    Unsupported,
    AnalysisFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permissionDenied",
            ErrorKind::DeviceNotFound => "deviceNotFound",
            ErrorKind::ConfigurationError => "configurationError",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::AnalysisFailure => "analysisFailure",
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::PermissionDenied => ErrorKind::PermissionDenied,
            SessionError::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            SessionError::Configuration(_) => ErrorKind::ConfigurationError,
            SessionError::Unsupported(_) => ErrorKind::Unsupported,
            SessionError::AnalysisFailure { .. } => ErrorKind::AnalysisFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
