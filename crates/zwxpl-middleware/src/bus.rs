//! In-process broadcast of outward announcements.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! connected bus peer receives every announcement without any single peer
//! blocking the others.  A slow peer loses the oldest announcements rather
//! than stalling the session.

use tokio::sync::broadcast;
use tracing::{debug, trace};
use zwxpl_core::BusClient;
use zwxpl_types::{Announcement, AnnouncementKind, BridgeError, StatusBody};

/// Default channel capacity (number of buffered announcements before old
/// ones are dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared announcement bus. Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Announcement>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an announcement to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the announcement.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Gateway`] when nobody is subscribed.
    pub fn publish(&self, announcement: Announcement) -> Result<usize, BridgeError> {
        self.sender
            .send(announcement)
            .map_err(|e| BridgeError::Gateway(format!("announcement bus send error: {e}")))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Session seam
// ---------------------------------------------------------------------------

/// [`BusClient`] that wraps each status body in an [`Announcement`] carrying
/// the configured source name and publishes it on an [`EventBus`].
#[derive(Clone, Debug)]
pub struct BroadcastBusClient {
    bus: EventBus,
    source: String,
}

impl BroadcastBusClient {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn announce(&self, kind: AnnouncementKind, body: StatusBody) {
        debug!(kind = ?kind, device = %body.device, "announcing");
        let announcement = Announcement::new(self.source.clone(), kind, body);
        // No connected peers is a normal condition on a quiet bus.
        if let Err(e) = self.bus.publish(announcement) {
            trace!(error = %e, "announcement not delivered");
        }
    }
}

impl BusClient for BroadcastBusClient {
    fn send_stat(&mut self, body: StatusBody) {
        self.announce(AnnouncementKind::Stat, body);
    }

    fn send_trig(&mut self, body: StatusBody) {
        self.announce(AnnouncementKind::Trig, body);
    }
}
