//! The bridge's single ordered event queue.
//!
//! Mesh events, bus events and the shutdown signal all arrive on one
//! unbounded channel and are handed to the session strictly in arrival
//! order, one at a time.

use std::time::Instant;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, instrument, warn};
use zwxpl_core::{BridgeSession, Flow};
use zwxpl_types::BridgeEvent;

/// Feed events into `session` until it returns [`Flow::Exit`], and return
/// the exit code.
///
/// If every sender is dropped the queue is treated as a shutdown request.
#[instrument(skip_all, name = "bridge_event_loop")]
pub async fn run_event_loop(
    session: &mut BridgeSession,
    events: &mut UnboundedReceiver<BridgeEvent>,
) -> i32 {
    loop {
        let event = match events.recv().await {
            Some(event) => event,
            None => {
                warn!("event queue closed, shutting down");
                BridgeEvent::Shutdown
            }
        };
        if let Flow::Exit(code) = session.handle(event, Instant::now()) {
            info!(code, "bridge stopping");
            return code;
        }
    }
}
