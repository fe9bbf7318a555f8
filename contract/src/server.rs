//! Standalone runner for the ingestion stub — useful for pointing a
//! real client or `wiremock`-free integration test at a live HTTP
//! server instead of driving the router in-process.
//!
//! Grounded on `opal-fetcher::server::{OpalFetcherServer, run_server}`:
//! bind, serve, graceful shutdown on Ctrl+C.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;

use crate::routes::create_router;
use crate::state::AppState;

/// Binds `addr` and serves the ingestion stub until Ctrl+C. Blocks.
pub async fn run(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ingestion stub listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
