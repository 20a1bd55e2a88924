use log::debug;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::commands::{Command, CommandError, FrameInfo, Outgoing};
use crate::pipeline::CaptureSession;

fn encode<T: Serialize>(value: T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(CommandError::Encode)
}

/// Executes host commands against one capture session
pub struct Host {
    session: CaptureSession,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    forwarder: Option<JoinHandle<()>>,
}

impl Host {
    pub fn new(session: CaptureSession, outgoing: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self {
            session,
            outgoing,
            forwarder: None,
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub async fn handle(&mut self, command: Command) -> Result<Value, CommandError> {
        match command {
            Command::QueryPermission => encode(self.session.query_permission()),
            Command::RequestPermission => encode(self.session.request_permission().await),
            Command::Start(position) => encode(self.session.start(position).await?),
            Command::SetTorch(mode) => {
                self.session.set_torch(mode)?;
                Ok(Value::Null)
            }
            Command::SetAnalysisMode(mode) => {
                self.session.set_analysis_mode(mode);
                Ok(Value::Null)
            }
            Command::SetOrientation(orientation) => {
                self.session.set_device_orientation(orientation);
                Ok(Value::Null)
            }
            Command::Frame(source) => encode(self.frame_info(source)),
            Command::Listen => {
                self.listen();
                Ok(Value::Null)
            }
            Command::Cancel => {
                self.session.events().cancel();
                Ok(Value::Null)
            }
            Command::Stop => {
                self.session.stop().await;
                Ok(Value::Null)
            }
        }
    }

    fn frame_info(&self, source: i64) -> Option<FrameInfo> {
        let slot = self.session.sources().get(source)?;
        let frame = slot.read()?;
        Some(FrameInfo::new(slot.generation(), &frame))
    }

    /// Forward session events to the host until the listener is replaced
    /// or cancelled
    fn listen(&mut self) {
        let mut events = self.session.events().listen();
        let outgoing = self.outgoing.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if outgoing.send(Outgoing::Event { event }).is_err() {
                    break;
                }
            }
            debug!("Host: event listener closed");
        }));
    }

    /// Stop the session and detach the event listener
    pub async fn shutdown(&mut self) {
        self.session.stop().await;
        self.session.events().cancel();
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }
}
