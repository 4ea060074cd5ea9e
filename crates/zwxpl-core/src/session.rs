//! [`BridgeSession`] – the single event-processing context.
//!
//! The session owns every piece of mutable bridge state (registry, external
//! keys, last-announced timestamps, emulated devices) and processes one
//! [`BridgeEvent`] at a time through [`BridgeSession::handle`].  Writes to the
//! mesh and announcements on the bus are fire-and-forget calls on the
//! [`MeshDriver`] and [`BusClient`] seams.
//!
//! Construct the session after the alias table is loaded and call
//! [`BridgeSession::start`] only once the bus side is up, since the mesh
//! starts reporting values as soon as it is connected.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};
use zwxpl_types::{
    BridgeError, BridgeEvent, BusEvent, BusMessage, EXIT_DRIVER_FAILED, EXIT_OK, MeshEvent,
    MeshValue, NodeInfo, StatusBody,
};

use crate::alias::AliasTable;
use crate::change_filter::{ChangeFilter, QUIESCENCE_WINDOW};
use crate::driver::{BusClient, MeshDriver};
use crate::emulation::VirtualDevices;
use crate::registry::{DeviceRegistry, POLL_INTENSITY};
use crate::resolver::{AddressResolver, ExternalTarget};
use crate::router;
use crate::schema::SchemaDump;

/// Startup parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial device of the mesh controller.
    pub serial_port: String,
    /// Nodes presented as emulated shutters.
    pub emulate_shutters: BTreeSet<u8>,
    /// Nodes presented as emulated switches.
    pub emulate_switches: BTreeSet<u8>,
    /// Minimum delay between two announcements of an unchanged value.
    pub quiescence_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".to_string(),
            emulate_shutters: BTreeSet::new(),
            emulate_switches: BTreeSet::new(),
            quiescence_window: QUIESCENCE_WINDOW,
        }
    }
}

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop processing and exit the process with this code.
    Exit(i32),
}

pub struct BridgeSession {
    serial_port: String,
    registry: DeviceRegistry,
    resolver: AddressResolver,
    filter: ChangeFilter,
    virtuals: VirtualDevices,
    schema: Option<SchemaDump>,
    mesh: Box<dyn MeshDriver>,
    bus: Box<dyn BusClient>,
}

impl BridgeSession {
    pub fn new(
        config: SessionConfig,
        aliases: AliasTable,
        mesh: Box<dyn MeshDriver>,
        bus: Box<dyn BusClient>,
    ) -> Self {
        Self {
            serial_port: config.serial_port,
            registry: DeviceRegistry::new(),
            resolver: AddressResolver::new(aliases),
            filter: ChangeFilter::new(config.quiescence_window),
            virtuals: VirtualDevices::new(config.emulate_shutters, config.emulate_switches),
            schema: None,
            mesh,
            bus,
        }
    }

    /// Append a row to `dump` for every value-added event (builder-style).
    pub fn with_schema_dump(mut self, dump: SchemaDump) -> Self {
        self.schema = Some(dump);
        self
    }

    /// Open the mesh controller.
    pub fn start(&mut self) {
        info!(serial_port = %self.serial_port, "connecting mesh controller");
        self.mesh.connect(&self.serial_port);
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn virtual_devices(&self) -> &VirtualDevices {
        &self.virtuals
    }

    /// Process one event. `now` drives the change filter.
    pub fn handle(&mut self, event: BridgeEvent, now: Instant) -> Flow {
        match event {
            BridgeEvent::Mesh(event) => self.handle_mesh(event, now),
            BridgeEvent::Bus(BusEvent::Message(message)) => {
                self.handle_bus_message(&message);
                Flow::Continue
            }
            BridgeEvent::Bus(BusEvent::Error(e)) => {
                error!(error = %e, "bus error");
                Flow::Continue
            }
            BridgeEvent::Shutdown => {
                info!(serial_port = %self.serial_port, "disconnecting mesh controller");
                self.mesh.disconnect(&self.serial_port);
                Flow::Exit(EXIT_OK)
            }
        }
    }

    fn handle_mesh(&mut self, event: MeshEvent, now: Instant) -> Flow {
        match event {
            MeshEvent::DriverReady { home_id } => {
                info!(home_id = %format!("0x{home_id:x}"), "driver ready, scanning");
            }
            MeshEvent::DriverFailed => {
                error!("mesh driver failed to start");
                self.mesh.disconnect(&self.serial_port);
                return Flow::Exit(EXIT_DRIVER_FAILED);
            }
            MeshEvent::NodeAdded { node_id } => {
                self.registry.on_node_added(node_id);
                info!(node_id, "node added");
            }
            MeshEvent::ValueAdded {
                node_id,
                class_id,
                value,
            } => self.on_value_added(node_id, class_id, value, now),
            MeshEvent::ValueChanged {
                node_id,
                class_id,
                value,
            } => self.on_value_changed(node_id, class_id, value, now),
            MeshEvent::ValueRemoved {
                node_id,
                class_id,
                index,
            } => {
                let removed = self.registry.on_value_removed(node_id, class_id, index);
                debug!(node_id, class_id, index, removed, "value removed");
            }
            MeshEvent::NodeReady { node_id, info } => self.on_node_ready(node_id, info),
            MeshEvent::Notification { node_id, code } => log_notification(node_id, code),
            MeshEvent::ScanComplete => info!("mesh scan complete"),
            MeshEvent::ControllerCommand { result, state } => {
                info!(result, state, "controller command feedback");
            }
        }
        Flow::Continue
    }

    fn on_value_added(&mut self, node_id: u8, class_id: u8, mut value: MeshValue, now: Instant) {
        value.node_id = node_id;
        value.class_id = class_id;
        self.registry.on_value_added(node_id, class_id, value.clone());

        let device = self.resolver.forward(&value);
        let target = ExternalTarget::new(node_id, class_id, value.clone());
        self.resolver.remember(device.clone(), target.clone());
        debug!(node_id, class_id, device = %device, value = %value.value, "value added");

        if let Some(dump) = self.schema.as_mut()
            && let Err(e) = dump.append(&device, &value)
        {
            warn!(path = %dump.path().display(), error = %e, "schema dump write failed");
        }

        if !value.write_only {
            self.bus.send_stat(value_body(device, &value));
            self.filter.mark_announced(value.id(), now);
        }

        let base = self.resolver.node_base(node_id);
        for body in self.virtuals.on_value_added(&base, node_id, class_id, &value) {
            self.resolver.remember(body.device.clone(), target.clone());
            self.bus.send_stat(body);
        }
    }

    fn on_value_changed(&mut self, node_id: u8, class_id: u8, mut value: MeshValue, now: Instant) {
        value.node_id = node_id;
        value.class_id = class_id;
        let ready = self.registry.is_ready(node_id);
        let old = self
            .registry
            .on_value_changed(node_id, class_id, value.clone());

        if ready {
            info!(
                node_id,
                class_id,
                label = %value.label,
                old = %old.as_ref().map(ToString::to_string).unwrap_or_default(),
                new = %value.value,
                "value changed"
            );
        } else {
            debug!(node_id, class_id, value = %value.value, "value changed before node ready");
        }

        let device = self.resolver.forward(&value);
        let target = ExternalTarget::new(node_id, class_id, value.clone());
        self.resolver.remember(device.clone(), target.clone());

        if !value.write_only {
            if self
                .filter
                .should_announce(value.id(), old.as_ref(), &value.value, now)
            {
                self.bus.send_trig(value_body(device, &value));
            } else {
                trace!(device = %device, "unchanged value suppressed");
            }
        }

        let base = self.resolver.node_base(node_id);
        for body in self
            .virtuals
            .on_value_changed(&base, node_id, class_id, &value, old.as_ref())
        {
            self.resolver.remember(body.device.clone(), target.clone());
            self.bus.send_trig(body);
        }
    }

    fn on_node_ready(&mut self, node_id: u8, info: NodeInfo) {
        let manufacturer = if info.manufacturer.is_empty() {
            format!("id={}", info.manufacturer_id)
        } else {
            info.manufacturer.clone()
        };
        let product = if info.product.is_empty() {
            format!("product={}, type={}", info.product_id, info.product_type)
        } else {
            info.product.clone()
        };
        info!(node_id, manufacturer = %manufacturer, product = %product, "node ready");
        debug!(
            node_id,
            name = %info.name,
            node_type = %info.node_type,
            location = %info.location,
            "node details"
        );

        for class_id in self.registry.on_node_ready(node_id, info) {
            info!(node_id, class_id, "enabling poll");
            self.mesh.enable_poll(node_id, class_id, POLL_INTENSITY);
        }

        if let Some(node) = self.registry.node(node_id) {
            for class_id in node.classes() {
                debug!(node_id, class_id, "node class");
                for value in node.class_values(class_id) {
                    debug!(
                        node_id,
                        index = value.index,
                        label = %value.label,
                        value = %value.value,
                        "  value"
                    );
                }
            }
        }
    }

    fn handle_bus_message(&mut self, message: &BusMessage) {
        trace!(body_name = %message.body_name, "bus message");
        match router::route(message, &self.resolver) {
            Ok(Some(routed)) => {
                debug!(command = ?routed.command, "issuing mesh command");
                self.mesh.execute(routed.command);
                if let Some(echo) = routed.echo {
                    self.bus.send_trig(echo);
                }
            }
            Ok(None) => trace!(body_name = %message.body_name, "message ignored"),
            Err(BridgeError::UnknownDevice(device)) => {
                warn!(device = %device, "command for unknown device dropped");
            }
            Err(e) => warn!(error = %e, "command dropped"),
        }
    }
}

fn value_body(device: String, value: &MeshValue) -> StatusBody {
    StatusBody::new(device)
        .current(value.value.to_json())
        .units(value.units.clone())
}

fn log_notification(node_id: u8, code: u8) {
    let what = match code {
        0 => "message complete",
        1 => "timeout",
        2 => "nop",
        3 => "node awake",
        4 => "node sleep",
        5 => "node dead",
        6 => "node alive",
        _ => {
            warn!(node_id, code, "unknown notification");
            return;
        }
    };
    info!(node_id, code, "{what}");
}
