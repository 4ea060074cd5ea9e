//! WebSocket endpoint for bus peers.
//!
//! Every connected peer receives each [`Announcement`] as one JSON text
//! frame, and may send [`BusMessage`] frames (`{"bodyName": ..., "body":
//! {...}}`) which are handed to the session as [`BusEvent::Message`].
//! Frames that do not parse are dropped.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use zwxpl_types::{BridgeError, BridgeEvent, BusEvent, BusMessage};

use crate::bus::EventBus;

/// Bound bus endpoint. Binding and serving are split so that a bind failure
/// can be reported before the mesh is started.
pub struct BusGateway {
    listener: TcpListener,
    bus: EventBus,
    events: UnboundedSender<BridgeEvent>,
}

impl BusGateway {
    /// Bind the endpoint on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Gateway`] if the TCP listener cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        bus: EventBus,
        events: UnboundedSender<BridgeEvent>,
    ) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Gateway(format!("bus bind error on {addr}: {e}")))?;
        info!(addr = %addr, "bus endpoint listening");
        Ok(Self {
            listener,
            bus,
            events,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept peers until the task is dropped.
    pub async fn serve(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = self.bus.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_peer(stream, peer, bus, events).await {
                            error!(peer = %peer, error = %e, "bus peer error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "bus accept error");
                }
            }
        }
    }
}

async fn handle_peer(
    stream: TcpStream,
    peer: SocketAddr,
    bus: EventBus,
    events: UnboundedSender<BridgeEvent>,
) -> Result<(), BridgeError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| BridgeError::Gateway(format!("ws handshake from {peer}: {e}")))?;
    debug!(peer = %peer, "bus peer connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut rx = bus.subscribe();

    loop {
        tokio::select! {
            // Forward announcements to the peer.
            result = rx.recv() => {
                match result {
                    Ok(announcement) => {
                        let json = serde_json::to_string(&announcement)?;
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(peer = %peer, lagged_by = n, "bus peer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            // Commands from the peer.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        let _ = events.send(BridgeEvent::Bus(BusEvent::Error(format!("{peer}: {e}"))));
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming_frame(text.as_str(), &events);
                    }
                    _ => {}
                }
            }
        }
    }

    debug!(peer = %peer, "bus peer disconnected");
    Ok(())
}

/// Parse one inbound frame and queue it for the session.
///
/// Returns `false` when the frame was dropped.
pub fn handle_incoming_frame(text: &str, events: &UnboundedSender<BridgeEvent>) -> bool {
    let message = match serde_json::from_str::<BusMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "malformed bus frame dropped");
            return false;
        }
    };
    events
        .send(BridgeEvent::Bus(BusEvent::Message(message)))
        .is_ok()
}
