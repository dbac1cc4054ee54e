pub mod config;
pub mod room;
pub mod signaling;
pub mod store;

pub use config::*;
pub use room::*;
pub use signaling::*;
pub use store::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state of the axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingService,
    pub rooms: RoomManager,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryRoomStore::new()))
    }

    pub fn with_store(config: &RelayConfig, store: Arc<dyn RoomStore>) -> Self {
        let signaling = SignalingService::new(config.ice_servers.clone());
        let rooms = RoomManager::new(store, Arc::new(signaling.clone()), config.room_idle_ttl);
        Self { signaling, rooms }
    }
}

/// `/ws` and `/api/socket` upgrade to the signaling socket, `/health` answers `ok`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/socket", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        "Signaling relay listening on ws://{}/ws",
        listener.local_addr().context("Listener has no address")?
    );

    axum::serve(listener, router(AppState::new(&config)))
        .await
        .context("Relay server failed")?;
    Ok(())
}
