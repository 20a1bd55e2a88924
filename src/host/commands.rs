//! Wire messages of the host protocol
//!
//! One JSON object per line. Requests carry an `id`, a `method` and optional
//! `arguments`; every request gets exactly one reply with the same id.
//! Events are pushed unsolicited while a listener is installed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::capture::{CameraPosition, DeviceOrientation, TorchMode};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::pipeline::{AnalysisMode, Frame};

#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    QueryPermission,
    RequestPermission,
    Start(CameraPosition),
    SetTorch(TorchMode),
    SetAnalysisMode(AnalysisMode),
    SetOrientation(DeviceOrientation),
    Frame(i64),
    Listen,
    Cancel,
    Stop,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("invalid arguments for `{method}`: {source}")]
    InvalidArguments {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownMethod(_) => "unknownMethod",
            CommandError::InvalidArguments { .. } => "invalidArguments",
            CommandError::Encode(_) => "internal",
            CommandError::Session(e) => e.kind().as_str(),
        }
    }
}

fn arguments<T: serde::de::DeserializeOwned>(
    method: &'static str,
    arguments: Value,
) -> Result<T, CommandError> {
    serde_json::from_value(arguments)
        .map_err(|source| CommandError::InvalidArguments { method, source })
}

impl Command {
    /// Decode a request. The long method names used by mobile hosts are
    /// accepted next to the short ones.
    pub fn parse(method: &str, args: Value) -> Result<Self, CommandError> {
        let command = match method {
            "state" | "queryPermission" => Command::QueryPermission,
            "request" | "requestPermission" => Command::RequestPermission,
            "start" => Command::Start(arguments("start", args)?),
            "torch" | "setTorch" => Command::SetTorch(arguments("torch", args)?),
            "analyze" | "setAnalysisMode" => {
                Command::SetAnalysisMode(arguments("analyze", args)?)
            }
            "orientation" => Command::SetOrientation(arguments("orientation", args)?),
            "frame" => Command::Frame(arguments("frame", args)?),
            "listen" => Command::Listen,
            "cancel" => Command::Cancel,
            "stop" => Command::Stop,
            other => return Err(CommandError::UnknownMethod(other.to_string())),
        };
        Ok(command)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl From<&CommandError> for ErrorBody {
    fn from(err: &CommandError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Anything written to the host
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Reply { id: u64, result: Value },
    Failure { id: Option<u64>, error: ErrorBody },
    Event { event: SessionEvent },
}

impl Outgoing {
    pub fn reply(id: u64, result: Result<Value, CommandError>) -> Self {
        match result {
            Ok(result) => Outgoing::Reply { id, result },
            Err(err) => Outgoing::Failure {
                id: Some(id),
                error: ErrorBody::from(&err),
            },
        }
    }
}

/// Metadata of the latest frame in a frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub generation: u64,
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub timestamp_micros: i64,
}

impl FrameInfo {
    pub fn new(generation: u64, frame: &Frame) -> Self {
        Self {
            generation,
            sequence: frame.sequence,
            width: frame.width,
            height: frame.height,
            timestamp_micros: frame.captured_at.micros,
        }
    }
}
