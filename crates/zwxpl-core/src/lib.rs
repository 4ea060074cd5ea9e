//! `zwxpl-core` – Translation, addressing and debouncing
//!
//! Everything that decides *what* crosses the bridge lives here; the
//! transports in `zwxpl-middleware` only move bytes.
//!
//! # Modules
//!
//! - [`alias`] – [`AliasTable`][alias::AliasTable]: static mapping from mesh
//!   coordinates to external device names, resolved most-specific first.
//! - [`registry`] – [`DeviceRegistry`][registry::DeviceRegistry]: in-memory
//!   mirror of every node and value point reported by the mesh driver.
//! - [`resolver`] – [`AddressResolver`][resolver::AddressResolver]: forward
//!   (value → external id) and reverse (external id → write target)
//!   resolution, plus the raw coordinate literal syntax.
//! - [`change_filter`] – [`ChangeFilter`][change_filter::ChangeFilter]:
//!   suppresses unchanged re-reports inside the quiescence window.
//! - [`emulation`] – [`VirtualDevices`][emulation::VirtualDevices]: emulated
//!   shutters and switches derived from raw multilevel / binary values.
//! - [`router`] – [`route`][router::route]: maps inbound bus commands to mesh
//!   commands.
//! - [`coerce`] – permissive boolean grammar and raw value coercion.
//! - [`schema`] – [`SchemaDump`][schema::SchemaDump]: optional CSV listing of
//!   every discovered value point.
//! - [`driver`] – the [`MeshDriver`][driver::MeshDriver] and
//!   [`BusClient`][driver::BusClient] seams.
//! - [`session`] – [`BridgeSession`][session::BridgeSession]: owns all of the
//!   above and processes one [`BridgeEvent`][zwxpl_types::BridgeEvent] at a
//!   time.

pub mod alias;
pub mod change_filter;
pub mod coerce;
pub mod driver;
pub mod emulation;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod schema;
pub mod session;

pub use alias::AliasTable;
pub use change_filter::{ChangeFilter, QUIESCENCE_WINDOW};
pub use coerce::{coerce_literal, is_true};
pub use driver::{BusClient, MeshDriver};
pub use emulation::VirtualDevices;
pub use registry::{DeviceRegistry, Node};
pub use resolver::{AddressResolver, ExternalTarget};
pub use router::RoutedCommand;
pub use schema::SchemaDump;
pub use session::{BridgeSession, Flow, SessionConfig};
