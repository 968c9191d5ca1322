//! Shift Roster - Axum Server
//!
//! Run with: cargo run
//! Then open: http://localhost:7860

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use shift_roster::api;
use shift_roster::engine::RosterEngine;
use shift_roster::solver::{NoSolverBackend, SolverClient};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shift_roster=info")),
        )
        .init();

    let engine = RosterEngine::new().with_solver(SolverClient::spawn(NoSolverBackend));
    let state = Arc::new(api::AppState::new(engine));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 7860));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
