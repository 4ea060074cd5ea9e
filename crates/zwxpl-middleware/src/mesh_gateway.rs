//! WebSocket client for the mesh driver gateway.
//!
//! The controller driver runs behind a gateway process that owns the serial
//! port.  It speaks JSON text frames in both directions:
//!
//! | Direction | Frame | Rust type |
//! |---|---|---|
//! | gateway → bridge | `{"event": "value-added", ...}` | [`MeshEvent`] |
//! | bridge → gateway | `{"op": "set_value", ...}` | [`MeshCommand`] |
//!
//! Losing the gateway connection is reported to the session as
//! [`MeshEvent::DriverFailed`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use zwxpl_core::MeshDriver;
use zwxpl_types::{BridgeError, BridgeEvent, MeshCommand, MeshEvent, ValueId, ZValue};

/// Background tasks of a live gateway connection.
pub struct MeshGateway {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl MeshGateway {
    /// Connect to the gateway at `url`.
    ///
    /// Events read from the gateway are queued on `events`; commands queued
    /// on `pending` (see [`GatewayMeshDriver::channel`]) are written in
    /// order, including any queued before the connection was made.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Gateway`] if the WebSocket handshake fails.
    pub async fn connect(
        url: &str,
        events: UnboundedSender<BridgeEvent>,
        mut pending: UnboundedReceiver<MeshCommand>,
    ) -> Result<Self, BridgeError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| BridgeError::Gateway(format!("mesh gateway {url}: {e}")))?;
        info!(url = %url, "connected to mesh gateway");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let writer = tokio::spawn(async move {
            while let Some(command) = pending.recv().await {
                let json = match serde_json::to_string(&command) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "mesh command not serialisable");
                        continue;
                    }
                };
                trace!(frame = %json, "mesh command");
                if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                    warn!(error = %e, "mesh gateway write failed");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_mesh_frame(text.as_str())
                            && events.send(BridgeEvent::Mesh(event)).is_err()
                        {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mesh gateway read failed");
                        break;
                    }
                }
            }
            info!("mesh gateway connection closed");
            let _ = events.send(BridgeEvent::Mesh(MeshEvent::DriverFailed));
        });

        Ok(Self { reader, writer })
    }

    /// Wait up to `grace` for queued commands to be written, then drop the
    /// connection.  Every [`GatewayMeshDriver`] must have been dropped first
    /// or the writer never drains.
    pub async fn close(self, grace: Duration) {
        if tokio::time::timeout(grace, self.writer).await.is_err() {
            warn!("mesh gateway writer did not drain in time");
        }
        self.reader.abort();
    }
}

/// Decode one gateway frame. Unknown or malformed frames yield `None`.
pub fn parse_mesh_frame(text: &str) -> Option<MeshEvent> {
    match serde_json::from_str::<MeshEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "unrecognised mesh frame dropped");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Session seam
// ---------------------------------------------------------------------------

/// [`MeshDriver`] that queues every call as a [`MeshCommand`] frame.
#[derive(Clone, Debug)]
pub struct GatewayMeshDriver {
    commands: UnboundedSender<MeshCommand>,
    logging: bool,
    console_output: bool,
}

impl GatewayMeshDriver {
    pub fn new(commands: UnboundedSender<MeshCommand>, logging: bool, console_output: bool) -> Self {
        Self {
            commands,
            logging,
            console_output,
        }
    }

    /// Driver writing into a fresh channel. Hand the receiver to
    /// [`MeshGateway::connect`]. `logging` and `console_output` are forwarded
    /// with every connect command.
    pub fn channel(logging: bool, console_output: bool) -> (Self, UnboundedReceiver<MeshCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, logging, console_output), rx)
    }

    fn queue(&self, command: MeshCommand) {
        if self.commands.send(command).is_err() {
            warn!("mesh gateway writer gone, command dropped");
        }
    }
}

impl MeshDriver for GatewayMeshDriver {
    fn connect(&mut self, serial_port: &str) {
        self.queue(MeshCommand::Connect {
            port: serial_port.to_string(),
            logging: self.logging,
            console_output: self.console_output,
        });
    }

    fn disconnect(&mut self, serial_port: &str) {
        self.queue(MeshCommand::Disconnect {
            port: serial_port.to_string(),
        });
    }

    fn enable_poll(&mut self, node_id: u8, class_id: u8, intensity: u8) {
        self.queue(MeshCommand::EnablePoll {
            node_id,
            class_id,
            intensity,
        });
    }

    fn set_value(&mut self, id: ValueId, value: ZValue) {
        self.queue(MeshCommand::SetValue { id, value });
    }

    fn add_node(&mut self, secure: bool) {
        self.queue(MeshCommand::AddNode { secure });
    }

    fn remove_node(&mut self) {
        self.queue(MeshCommand::RemoveNode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn parses_value_added_frame() {
        let frame = r#"{
            "event": "value-added",
            "node_id": 5,
            "class_id": 38,
            "value": {"instance": 1, "index": 0, "label": "Level", "value": 50, "type": "byte"}
        }"#;
        let Some(MeshEvent::ValueAdded { node_id, class_id, value }) = parse_mesh_frame(frame) else {
            panic!("expected value-added");
        };
        assert_eq!((node_id, class_id), (5, 38));
        assert_eq!(value.label, "Level");
        assert_eq!(value.value, ZValue::Int(50));
        assert_eq!(value.value_type, "byte");
    }

    #[test]
    fn parses_lifecycle_frames() {
        assert_eq!(
            parse_mesh_frame(r#"{"event":"driver-ready","home_id":3735928559}"#),
            Some(MeshEvent::DriverReady { home_id: 0xdead_beef })
        );
        assert_eq!(
            parse_mesh_frame(r#"{"event":"scan-complete"}"#),
            Some(MeshEvent::ScanComplete)
        );
        assert_eq!(
            parse_mesh_frame(r#"{"event":"notification","node_id":3,"code":5}"#),
            Some(MeshEvent::Notification { node_id: 3, code: 5 })
        );
    }

    #[test]
    fn unknown_frames_are_dropped() {
        assert_eq!(parse_mesh_frame(r#"{"event":"polling-enabled"}"#), None);
        assert_eq!(parse_mesh_frame("garbage"), None);
    }

    #[test]
    fn driver_queues_commands_in_order() {
        let (mut driver, mut rx) = GatewayMeshDriver::channel(true, false);
        driver.connect("/dev/ttyACM0");
        driver.set_value(ValueId::new(9, 112, 1, 52), ZValue::Float(300.0));
        driver.execute(MeshCommand::RemoveNode);

        assert_eq!(
            rx.try_recv().ok(),
            Some(MeshCommand::Connect {
                port: "/dev/ttyACM0".to_string(),
                logging: true,
                console_output: false,
            })
        );
        assert!(matches!(rx.try_recv(), Ok(MeshCommand::SetValue { .. })));
        assert_eq!(rx.try_recv().ok(), Some(MeshCommand::RemoveNode));
    }

    #[test]
    fn driver_survives_closed_writer() {
        let (mut driver, rx) = GatewayMeshDriver::channel(false, false);
        drop(rx);
        driver.add_node(false);
    }

    #[tokio::test]
    async fn round_trip_through_gateway() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        // Fake gateway: expects a connect command, reports one value, closes.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected a command frame");
            };
            let command: Value = serde_json::from_str(text.as_str()).expect("json");
            let frame = r#"{"event":"node-added","node_id":7}"#;
            ws.send(Message::Text(frame.into())).await.expect("send");
            ws.close(None).await.expect("close");
            command
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut driver, pending) = GatewayMeshDriver::channel(false, false);
        // Queued before the connection exists.
        driver.connect("/dev/ttyUSB0");
        let gateway = MeshGateway::connect(&format!("ws://{addr}"), tx, pending).await?;

        let command = server.await?;
        assert_eq!(command["op"], "connect");
        assert_eq!(command["port"], "/dev/ttyUSB0");

        let timeout = Duration::from_secs(2);
        let first = tokio::time::timeout(timeout, rx.recv()).await?;
        assert_eq!(first, Some(BridgeEvent::Mesh(MeshEvent::NodeAdded { node_id: 7 })));
        let second = tokio::time::timeout(timeout, rx.recv()).await?;
        assert_eq!(second, Some(BridgeEvent::Mesh(MeshEvent::DriverFailed)));

        drop(driver);
        gateway.close(timeout).await;
        Ok(())
    }

    #[tokio::test]
    async fn connect_fails_without_gateway() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel();
        let (_driver, pending) = GatewayMeshDriver::channel(false, false);
        let result = MeshGateway::connect(&format!("ws://{addr}"), tx, pending).await;
        assert!(matches!(result, Err(BridgeError::Gateway(_))));
        Ok(())
    }
}
