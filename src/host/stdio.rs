//! JSON-lines transport

use anyhow::Context;
use log::{error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::commands::{Command, ErrorBody, Outgoing, Request};
use super::handler::Host;
use crate::pipeline::CaptureSession;

async fn write_lines<W>(mut output: W, mut rx: mpsc::UnboundedReceiver<Outgoing>) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                error!("Host: dropping unencodable message: {}", e);
                continue;
            }
        };
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(output)
}

/// Serve host requests read from `input` until it ends or `cancel` fires.
///
/// The session is stopped before returning. Returns the output once every
/// pending reply and event has been written.
pub async fn serve<R, W>(
    session: CaptureSession,
    input: R,
    output: W,
    cancel: CancellationToken,
) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_lines(output, rx));
    let mut host = Host::new(session, tx.clone());
    let mut lines = input.lines();

    info!("Host: serving requests");
    let served = loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Host: interrupted");
                break Ok(());
            }
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Host: input closed");
                break Ok(());
            }
            Err(e) => {
                error!("Host: failed to read request: {}", e);
                break Err(anyhow::Error::new(e).context("reading request"));
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let result = match Command::parse(&request.method, request.arguments) {
                    Ok(command) => host.handle(command).await,
                    Err(e) => Err(e),
                };
                Outgoing::reply(request.id, result)
            }
            Err(e) => {
                warn!("Host: malformed request: {}", e);
                Outgoing::Failure {
                    id: None,
                    error: ErrorBody {
                        kind: "malformedRequest",
                        message: e.to_string(),
                    },
                }
            }
        };
        if tx.send(reply).is_err() {
            error!("Host: output closed, shutting down");
            break Ok(());
        }
    };

    host.shutdown().await;
    drop(host);
    drop(tx);
    served?;

    let output = writer
        .await
        .context("writer task failed")?
        .context("writing to host")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        CameraDevice, CameraPosition, PermissionStatus, SyntheticBackend, SyntheticCamera, TorchState,
    };
    use crate::config::SessionConfig;
    use crate::pipeline::AnalyzerRegistry;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn session() -> CaptureSession {
        let backend = Arc::new(
            SyntheticBackend::new(PermissionStatus::Authorized)
                .with_camera(SyntheticCamera::new(CameraPosition::Back)),
        );
        let config = SessionConfig {
            health_log_interval_secs: 0,
            ..SessionConfig::default()
        };
        CaptureSession::new(backend, AnalyzerRegistry::new(), config)
    }

    fn parse_output(output: Vec<u8>) -> Vec<Value> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_request_reply_session() {
        let input = concat!(
            r#"{"id":1,"method":"queryPermission"}"#,
            "\n",
            r#"{"id":2,"method":"listen"}"#,
            "\n",
            r#"{"id":3,"method":"start","arguments":1}"#,
            "\n",
            "\n",
            r#"{"id":4,"method":"setTorch","arguments":1}"#,
            "\n",
            r#"{"id":5,"method":"setAnalysisMode","arguments":1}"#,
            "\n",
            r#"{"id":6,"method":"start","arguments":1}"#,
            "\n",
            r#"{"id":7,"method":"stop"}"#,
            "\n",
        );

        let output = serve(
            session(),
            input.as_bytes(),
            Vec::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let messages = parse_output(output);

        let reply = |id: u64| {
            messages
                .iter()
                .find(|m| m["id"] == id)
                .cloned()
                .unwrap_or_else(|| panic!("no reply for {}", id))
        };
        assert_eq!(reply(1)["result"], 1);
        assert_eq!(reply(2)["result"], Value::Null);
        assert_eq!(reply(3)["result"]["torchable"], true);
        assert_eq!(reply(4)["result"], Value::Null);
        assert_eq!(reply(6)["error"]["kind"], "unsupported");
        assert_eq!(reply(7)["result"], Value::Null);

        assert!(messages.contains(&json!({"event": {"name": "torchState", "data": 1}})));
    }

    #[tokio::test]
    async fn test_bad_requests_get_error_replies() {
        let input = concat!(
            "not json\n",
            r#"{"id":1,"method":"zoom"}"#,
            "\n",
            r#"{"id":2,"method":"torch","arguments":1}"#,
            "\n",
        );

        let output = serve(
            session(),
            input.as_bytes(),
            Vec::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let messages = parse_output(output);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["id"], Value::Null);
        assert_eq!(messages[0]["error"]["kind"], "malformedRequest");
        assert_eq!(messages[1]["error"]["kind"], "unknownMethod");
        assert_eq!(messages[2]["error"]["kind"], "unsupported");
    }

    #[tokio::test]
    async fn test_read_error_stops_session() {
        let camera = SyntheticCamera::new(CameraPosition::Back);
        let backend = Arc::new(
            SyntheticBackend::new(PermissionStatus::Authorized).with_camera(camera.clone()),
        );
        let session = CaptureSession::new(
            backend,
            AnalyzerRegistry::new(),
            SessionConfig {
                health_log_interval_secs: 0,
                ..SessionConfig::default()
            },
        );

        let mut input = Vec::new();
        input.extend_from_slice(b"{\"id\":1,\"method\":\"start\",\"arguments\":1}\n");
        input.extend_from_slice(b"{\"id\":2,\"method\":\"torch\",\"arguments\":1}\n");
        // not UTF-8
        input.extend_from_slice(b"\xff\xfe\n");

        let err = serve(session, input.as_slice(), Vec::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("reading request"));
        assert!(!camera.is_streaming());
        assert_eq!(camera.open_inputs(), 0);
        assert_eq!(camera.observer_count(), 0);
        assert_eq!(camera.torch_state(), TorchState::Off);
    }

    #[tokio::test]
    async fn test_analysis_mode_produces_detection_events() {
        use crate::pipeline::{AnalysisMode, FrameStats};
        use std::time::Duration;

        let backend = Arc::new(
            SyntheticBackend::new(PermissionStatus::Authorized)
                .with_camera(SyntheticCamera::new(CameraPosition::Back).with_fps(100)),
        );
        let analyzers = AnalyzerRegistry::new().with(AnalysisMode::Custom(3), Arc::new(FrameStats));
        let session = CaptureSession::new(
            backend,
            analyzers,
            SessionConfig {
                health_log_interval_secs: 0,
                ..SessionConfig::default()
            },
        );

        let (mut requests, server_in) = tokio::io::duplex(4096);
        let (server_out, replies) = tokio::io::duplex(4096);
        let task = tokio::spawn(serve(
            session,
            tokio::io::BufReader::new(server_in),
            server_out,
            CancellationToken::new(),
        ));

        requests
            .write_all(
                concat!(
                    r#"{"id":1,"method":"listen"}"#,
                    "\n",
                    r#"{"id":2,"method":"start","arguments":1}"#,
                    "\n",
                    r#"{"id":3,"method":"analyze","arguments":3}"#,
                    "\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();

        let mut lines = tokio::io::BufReader::new(replies).lines();
        let detection = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let line = lines.next_line().await.unwrap().unwrap();
                let message: Value = serde_json::from_str(&line).unwrap();
                if message["event"]["name"] == "detection" {
                    return message;
                }
            }
        })
        .await
        .expect("detection event");

        assert_eq!(detection["event"]["kind"], "frameStats");
        // portrait output swaps the sensor axes
        assert_eq!(detection["event"]["data"]["width"], 480);
        assert_eq!(detection["event"]["data"]["height"], 640);

        drop(requests);
        // keep draining so the writer never blocks on a full pipe
        let drain = tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });
        task.await.unwrap().unwrap();
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_serving() {
        let (client, server) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(serve(
            session(),
            tokio::io::BufReader::new(server),
            Vec::new(),
            cancel.clone(),
        ));

        cancel.cancel();
        let output = task.await.unwrap().unwrap();
        assert!(output.is_empty());
        drop(client);
    }
}
