//! [`VirtualDevices`] – emulated shutters and switches.
//!
//! Some actuators only expose a raw multilevel level (0–99) or a binary
//! state.  For the nodes listed at startup the bridge presents them on the
//! bus as higher-level devices:
//!
//! * **Shutter** – command class 38, instance 1, index 0.  The raw level is
//!   quantised to a percentage in steps of 5 and announced as two
//!   sub-devices, `<base>/target` and `<base>/state`.
//! * **Switch** – command class 37, instance 1, index 0.  Announced once as
//!   `<base>/status` with `enable`/`disable`.
//!
//! `<base>` is the node's alias or its id.  The mesh gives no position
//! feedback distinct from the level, so target and state are always set to
//! the same value from every reading.

use std::collections::BTreeMap;

use tracing::debug;
use zwxpl_types::{MeshValue, StatusBody, ZValue};

use crate::registry::{COMMAND_CLASS_SWITCH_BINARY, COMMAND_CLASS_SWITCH_MULTILEVEL};

/// Highest raw level a multilevel switch reports.
pub const SHUTTER_RAW_MAX: f64 = 99.0;
/// Units carried by emulated shutter announcements.
pub const PERCENT_UNITS: &str = "%";

/// Synthesised position for a raw level: `round(raw / 99 * 20) * 5`, so
/// always a multiple of 5 in `0..=100`.
pub fn raw_to_percent(raw: f64) -> i64 {
    let raw = raw.clamp(0.0, SHUTTER_RAW_MAX);
    ((raw / SHUTTER_RAW_MAX * 20.0).round() as i64) * 5
}

/// Raw level for a commanded percentage: `round(percent / 100 * 99)`.
pub fn percent_to_raw(percent: f64) -> i64 {
    let percent = percent.clamp(0.0, 100.0);
    (percent / 100.0 * SHUTTER_RAW_MAX).round() as i64
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShutterState {
    pub state: Option<i64>,
    pub target: Option<i64>,
    pub units: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchState {
    pub enabled: Option<bool>,
}

/// Emulated device state, keyed by node id.
#[derive(Debug, Default)]
pub struct VirtualDevices {
    shutters: BTreeMap<u8, ShutterState>,
    switches: BTreeMap<u8, SwitchState>,
}

impl VirtualDevices {
    /// Enable shutter emulation for `shutters` and switch emulation for
    /// `switches`.
    pub fn new(
        shutters: impl IntoIterator<Item = u8>,
        switches: impl IntoIterator<Item = u8>,
    ) -> Self {
        Self {
            shutters: shutters
                .into_iter()
                .map(|node| (node, ShutterState::default()))
                .collect(),
            switches: switches
                .into_iter()
                .map(|node| (node, SwitchState::default()))
                .collect(),
        }
    }

    pub fn shutter(&self, node_id: u8) -> Option<&ShutterState> {
        self.shutters.get(&node_id)
    }

    pub fn switch(&self, node_id: u8) -> Option<&SwitchState> {
        self.switches.get(&node_id)
    }

    pub fn is_shutter_point(&self, node_id: u8, class_id: u8, value: &MeshValue) -> bool {
        class_id == COMMAND_CLASS_SWITCH_MULTILEVEL
            && is_primary_point(value)
            && self.shutters.contains_key(&node_id)
    }

    pub fn is_switch_point(&self, node_id: u8, class_id: u8, value: &MeshValue) -> bool {
        class_id == COMMAND_CLASS_SWITCH_BINARY
            && is_primary_point(value)
            && self.switches.contains_key(&node_id)
    }

    /// First observation of a value: returns the status bodies to announce.
    pub fn on_value_added(
        &mut self,
        base: &str,
        node_id: u8,
        class_id: u8,
        value: &MeshValue,
    ) -> Vec<StatusBody> {
        if self.is_shutter_point(node_id, class_id, value) {
            let Some(percent) = self.update_shutter(node_id, &value.value) else {
                return Vec::new();
            };
            return vec![
                shutter_body(base, "target", percent),
                shutter_body(base, "state", percent),
            ];
        }

        if self.is_switch_point(node_id, class_id, value) {
            let enabled = value.value.as_bool();
            if let Some(switch) = self.switches.get_mut(&node_id) {
                switch.enabled = Some(enabled);
            }
            return vec![switch_body(base, enabled)];
        }

        Vec::new()
    }

    /// Subsequent reading: returns the trigger bodies to announce. The
    /// target is only re-announced when the raw level moved.
    pub fn on_value_changed(
        &mut self,
        base: &str,
        node_id: u8,
        class_id: u8,
        value: &MeshValue,
        old: Option<&ZValue>,
    ) -> Vec<StatusBody> {
        if !self.is_shutter_point(node_id, class_id, value) {
            return Vec::new();
        }
        let Some(percent) = self.update_shutter(node_id, &value.value) else {
            return Vec::new();
        };

        let mut bodies = Vec::with_capacity(2);
        if old != Some(&value.value) {
            bodies.push(shutter_body(base, "target", percent));
        }
        bodies.push(shutter_body(base, "state", percent));
        bodies
    }

    fn update_shutter(&mut self, node_id: u8, raw: &ZValue) -> Option<i64> {
        let Some(level) = raw.as_f64() else {
            debug!(node_id, value = %raw, "non-numeric shutter level ignored");
            return None;
        };
        let percent = raw_to_percent(level);
        let shutter = self.shutters.get_mut(&node_id)?;
        shutter.target = Some(percent);
        shutter.state = Some(percent);
        shutter.units = Some(PERCENT_UNITS);
        Some(percent)
    }
}

fn is_primary_point(value: &MeshValue) -> bool {
    value.instance == 1 && value.index == 0
}

fn shutter_body(base: &str, kind: &str, percent: i64) -> StatusBody {
    StatusBody::new(format!("{base}/{kind}"))
        .kind(kind)
        .current(percent)
        .units(PERCENT_UNITS)
}

fn switch_body(base: &str, enabled: bool) -> StatusBody {
    StatusBody::new(format!("{base}/status"))
        .kind("status")
        .current(if enabled { "enable" } else { "disable" })
}
