//! [`ChangeFilter`] – re-announcement debouncing.
//!
//! A changed value is announced immediately.  An unchanged value is only
//! re-announced once the quiescence window has elapsed since the last
//! announcement of that value point, which keeps chatty sensors quiet while
//! still giving the bus a periodic liveness signal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use zwxpl_types::{ValueId, ZValue};

/// Minimum time between two announcements of an unchanged value.
pub const QUIESCENCE_WINDOW: Duration = Duration::from_secs(10 * 60);

#[derive(Debug)]
pub struct ChangeFilter {
    window: Duration,
    last_announced: HashMap<ValueId, Instant>,
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::new(QUIESCENCE_WINDOW)
    }
}

impl ChangeFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_announced: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether a value-changed report should be announced, recording
    /// `now` as the last announcement when it is.
    ///
    /// `old` is the previously stored reading; `None` counts as a change.
    pub fn should_announce(
        &mut self,
        id: ValueId,
        old: Option<&ZValue>,
        new: &ZValue,
        now: Instant,
    ) -> bool {
        let changed = old != Some(new);
        let quiet_long_enough = match self.last_announced.get(&id) {
            Some(last) => now.saturating_duration_since(*last) > self.window,
            None => true,
        };

        if changed || quiet_long_enough {
            self.last_announced.insert(id, now);
            true
        } else {
            false
        }
    }

    /// Record an announcement made outside the filter (first observation).
    pub fn mark_announced(&mut self, id: ValueId, now: Instant) {
        self.last_announced.insert(id, now);
    }

    pub fn last_announced(&self, id: ValueId) -> Option<Instant> {
        self.last_announced.get(&id).copied()
    }
}
