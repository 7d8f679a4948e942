//! CLOE Prep · Adaptive Language Assessment Backend
//!
//! - Axum HTTP + WebSocket API over an adaptive, timed question engine
//! - Learner snapshots (score, solved questions, preferences) on disk or in memory
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   ASSESSMENT_CONFIG_PATH : path to TOML config (engine tuning + extra questions)
//!   SNAPSHOT_DIR           : directory for learner snapshots; overrides `[persistence] dir`
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod seeds;
mod bank;
mod scoring;
mod timer;
mod session;
mod engine;
mod grading;
mod persistence;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Question bank, engine settings, snapshot store.
  let state = Arc::new(AppState::new()?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "cloe_prep_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "cloe_prep_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "cloe_prep_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
