//! Chronicle · History Learning Backend
//!
//! - Axum HTTP API over the Era -> Topic -> Event content tree
//! - Per-language content stores with swappable persistence (local / document)
//! - Sessions, progress profiles, quiz and leaderboard
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000, overrides the config file)
//!   CHRONICLE_CONFIG_PATH : path to TOML config (storage backend, data dirs)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod domain;
mod config;
mod content;
mod storage;
mod seeds;
mod store;
mod session;
mod search;
mod progress;
mod quiz;
mod error;
mod protocol;
mod state;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::from_env();

  // Content for every language is loaded (storage or seed) before serving.
  let state = Arc::new(AppState::from_config(&cfg).await);

  let app = build_router(state, &cfg.static_dir);

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "chronicle_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "chronicle_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "chronicle_backend", error = %e, "Failed to listen for shutdown signal");
  }
}
