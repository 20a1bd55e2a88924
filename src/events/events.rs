use serde::Serialize;
use serde_json::Value;

use crate::capture::TorchState;

/// Asynchronous result delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name")]
pub enum SessionEvent {
    /// One analyzer result; `kind` is defined by the analyzer
    #[serde(rename = "detection")]
    Detection { kind: String, data: Value },

    /// The device torch mode changed
    #[serde(rename = "torchState")]
    TorchChanged {
        #[serde(rename = "data")]
        state: TorchState,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Detection { .. } => "detection",
            SessionEvent::TorchChanged { .. } => "torchState",
        }
    }
}
