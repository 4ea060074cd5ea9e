//! `zwxpl` – Z-Wave ⇄ xPL bridge daemon
//!
//! Startup, in order:
//!
//! 1. Load `~/.zwxpl/config.toml` (or `$ZWXPL_CONFIG`) plus `ZWXPL_*`
//!    overrides, then the alias table.
//! 2. Build the [`BridgeSession`] around a gateway-backed mesh driver and a
//!    broadcast bus client.
//! 3. Bind the bus endpoint, connect the mesh gateway, open the controller.
//! 4. Run the event loop until Ctrl-C or a fatal driver error.
//!
//! | Exit code | Meaning |
//! |---|---|
//! | 0 | clean shutdown |
//! | 1 | mesh driver failed or unreachable |
//! | 2 | bus endpoint could not be bound |
//! | 3 | invalid configuration or alias table |

mod config;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use zwxpl_core::{AliasTable, BridgeSession, QUIESCENCE_WINDOW, SchemaDump, SessionConfig};
use zwxpl_middleware::{BroadcastBusClient, BusGateway, EventBus, GatewayMeshDriver, MeshGateway};
use zwxpl_runtime::{run_event_loop, telemetry};
use zwxpl_types::{
    BridgeError, BridgeEvent, EXIT_BUS_BIND_FAILED, EXIT_CONFIG, EXIT_DRIVER_FAILED,
};

use crate::config::Config;

/// How long queued mesh commands get to reach the gateway on shutdown.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

fn main() {
    // Hold the guard until the very end; process::exit skips destructors.
    let guard = telemetry::init_tracing("zwxpl");

    let code = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run()),
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            EXIT_DRIVER_FAILED
        }
    };

    drop(guard);
    std::process::exit(code);
}

async fn run() -> i32 {
    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %config::config_path().display(), error = %e, "configuration error");
            return EXIT_CONFIG;
        }
    };
    info!(
        serial_port = %cfg.serial_port,
        gateway_url = %cfg.gateway_url,
        bus_port = cfg.bus_port,
        source = %cfg.xpl_source,
        "configuration loaded"
    );

    let aliases = match load_aliases(&cfg) {
        Ok(aliases) => aliases,
        Err(e) => {
            error!(error = %e, "alias table error");
            return EXIT_CONFIG;
        }
    };
    let session_config = match session_config(&cfg) {
        Ok(session_config) => session_config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return EXIT_CONFIG;
        }
    };

    // ── Session ───────────────────────────────────────────────────────────
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<BridgeEvent>();

    let shutdown_tx = events_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("interrupt received, shutting down");
        let _ = shutdown_tx.send(BridgeEvent::Shutdown);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; interrupt will not shut down cleanly");
    }

    let bus = EventBus::default();
    let (driver, pending) =
        GatewayMeshDriver::channel(cfg.zwave_logging, cfg.zwave_console_output);
    let mut session = BridgeSession::new(
        session_config,
        aliases,
        Box::new(driver),
        Box::new(BroadcastBusClient::new(bus.clone(), cfg.xpl_source.clone())),
    );
    if let Some(path) = &cfg.schema_dump {
        match SchemaDump::open(path) {
            Ok(dump) => {
                info!(path = %path.display(), "schema dump enabled");
                session = session.with_schema_dump(dump);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "schema dump disabled"),
        }
    }

    // ── Transports ────────────────────────────────────────────────────────
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.bus_port));
    let gateway = match BusGateway::bind(addr, bus, events_tx.clone()).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "bus endpoint unavailable");
            return EXIT_BUS_BIND_FAILED;
        }
    };
    let bus_task = tokio::spawn(gateway.serve());

    let mesh = match MeshGateway::connect(&cfg.gateway_url, events_tx, pending).await {
        Ok(mesh) => mesh,
        Err(e) => {
            error!(error = %e, "mesh driver unavailable");
            bus_task.abort();
            return EXIT_DRIVER_FAILED;
        }
    };

    // ── Event loop ────────────────────────────────────────────────────────
    session.start();
    let code = run_event_loop(&mut session, &mut events_rx).await;

    // The session owns the last driver handle; dropping it lets the writer
    // drain the final disconnect.
    drop(session);
    mesh.close(DRAIN_GRACE).await;
    bus_task.abort();
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_aliases(cfg: &Config) -> Result<AliasTable, BridgeError> {
    let Some(source) = cfg.device_aliases.as_deref().filter(|s| !s.trim().is_empty()) else {
        return Ok(AliasTable::new());
    };
    let aliases = AliasTable::load(source)?;
    info!(entries = aliases.len(), "alias table loaded");
    Ok(aliases)
}

fn session_config(cfg: &Config) -> Result<SessionConfig, BridgeError> {
    Ok(SessionConfig {
        serial_port: cfg.serial_port.clone(),
        emulate_shutters: cfg.shutter_nodes()?,
        emulate_switches: cfg.switch_nodes()?,
        quiescence_window: QUIESCENCE_WINDOW,
    })
}
