//! `zwxpl-runtime` – Process plumbing
//!
//! # Modules
//!
//! - [`event_loop`] – [`run_event_loop`][event_loop::run_event_loop]: drains
//!   the single ordered event queue into a
//!   [`BridgeSession`][zwxpl_core::BridgeSession] until it asks to exit.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.
//!   Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export to any
//!   OTLP-compatible collector.

pub mod event_loop;
pub mod telemetry;

pub use event_loop::run_event_loop;
