//! `zwxpl-middleware` – Transports
//!
//! Moves events between the bridge session and the outside world without
//! caring what they mean.
//!
//! # Modules
//!
//! - [`bus`] – [`EventBus`]: in-process broadcast of outward announcements,
//!   plus [`BroadcastBusClient`], the session's [`BusClient`] seam.
//! - [`bus_gateway`] – [`BusGateway`]: WebSocket endpoint where bus peers
//!   receive announcements and submit command messages as JSON.
//! - [`mesh_gateway`] – [`MeshGateway`]: WebSocket client to the mesh driver
//!   gateway, plus [`GatewayMeshDriver`], the session's [`MeshDriver`] seam.
//!
//! [`BusClient`]: zwxpl_core::BusClient
//! [`MeshDriver`]: zwxpl_core::MeshDriver

pub mod bus;
pub mod bus_gateway;
pub mod mesh_gateway;

pub use bus::{BroadcastBusClient, EventBus};
pub use bus_gateway::BusGateway;
pub use mesh_gateway::{GatewayMeshDriver, MeshGateway};
