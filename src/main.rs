//! FlowSolve · Math Tutor Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini integration (via environment variables)
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   GEMINI_API_KEY           : enables solving (API_KEY is accepted too)
//!   GEMINI_BASE_URL          : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL             : default "gemini-2.5-flash"
//!   GEMINI_TIMEOUT_SECS      : request timeout (default 60)
//!   TYPESET_READY_TIMEOUT_MS : wait for the math engine before text fallback (default 2000)
//!   SOLVER_CONFIG_PATH       : path to TOML config (prompt overrides)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use flowsolve_backend::{build_router, telemetry, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: solver backend, typesetter, prompts.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "flowsolve", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "flowsolve", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "flowsolve", "Shutting down");
}
