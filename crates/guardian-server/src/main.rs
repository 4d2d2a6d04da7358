//! # guardian-server
//!
//! HTTP surface and process wiring for the Guardian attendance engine.
//!
//! This binary provides:
//! - the gated attendance write path (clock-in / clock-out / check-in)
//! - the presence roster projection, recomputed on a polling cadence
//! - per-guard check-in deadline timers
//! - panic alert fan-out over SSE with a polling fallback
//! - narrow directory registration so a deployment can be populated

mod api;
mod config;
mod error;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guardian_engine::alerts::PanicChannel;
use guardian_engine::attendance::AttendanceService;
use guardian_engine::monitor::PresenceMonitor;
use guardian_engine::scheduler::CheckInScheduler;
use guardian_engine::SharedDb;
use guardian_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,guardian_server=debug")),
        )
        .init();

    info!("Starting Guardian server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::open_default()?,
    };
    let db: SharedDb = Arc::new(Mutex::new(database));

    // -----------------------------------------------------------------------
    // 4. Initialize subsystems
    // -----------------------------------------------------------------------
    let scheduler = Arc::new(CheckInScheduler::new(config.checkin_interval()));
    let attendance = Arc::new(AttendanceService::new(
        Arc::clone(&db),
        Arc::clone(&scheduler),
        config.shift_offset(),
    ));
    let alerts = Arc::new(PanicChannel::new(Arc::clone(&db)));
    let monitor = PresenceMonitor::new(
        Arc::clone(&db),
        config.checkin_interval(),
        config.shift_offset(),
        config.sweep_interval(),
    );

    let state = AppState {
        db,
        attendance,
        roster: monitor.roster(),
        alerts,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 5. Spawn background tasks
    // -----------------------------------------------------------------------

    // Presence sweep on the configured cadence.
    let sweep_task = monitor.spawn();

    // Log missed check-in transitions as they happen; the roster projection
    // carries the same state for pollers.
    let mut lapses = scheduler.subscribe();
    tokio::spawn(async move {
        loop {
            match lapses.recv().await {
                Ok(lapse) => warn!(
                    guard = %lapse.guard_id,
                    deadline = %lapse.deadline,
                    "guard missed a check-in deadline"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // -----------------------------------------------------------------------
    // 6. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly and stop the background sweep.
    let http_addr = state.config.http_addr;
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                sweep_task.abort();
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    sweep_task.abort();
    Ok(())
}
