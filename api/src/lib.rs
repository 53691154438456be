//! WebSocket API server.
//!
//! One persistent duplex connection per client; JSON messages with a
//! `type` discriminator drive the login → query → response-stream state
//! machine. See [`protocol`] for the wire model.

mod auth;
mod core;
mod error_handler;
pub mod protocol;
mod routes;

pub use crate::auth::{CredentialStore, FileCredentialStore};
pub use crate::core::app_state::AppState;
pub use crate::error_handler::AppError;

use axum::{Router, routing::get};
use tokio::signal;
use tracing::info;

use crate::routes::ws_route::ws_route;

/// Builds state from the environment and serves the WebSocket endpoint
/// until Ctrl+C.
///
/// # Errors
/// Returns [`AppError`] for configuration, bind, or server failures.
pub async fn start() -> Result<(), AppError> {
    let state = AppState::from_env()?;

    // History and facts collections must exist before the first query.
    state.store.create_side_collections().await?;

    let addr =
        std::env::var("API_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8001".to_string());

    let app = Router::new()
        .route("/ws/assist", get(ws_route))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(%addr, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
}
