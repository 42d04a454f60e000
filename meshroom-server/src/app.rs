use crate::config::RelayConfig;
use crate::relay::{RelayHandle, RelayStats};
use crate::signaling::ws_handler;
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use meshroom_core::{ParticipantId, RoomId};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
}

pub fn router(relay: RelayHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/rooms/{room_id}", get(room_members))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { relay })
}

/// Runs the relay until the listener fails.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    serve_on(listener, config).await
}

pub async fn serve_on(listener: TcpListener, config: RelayConfig) -> Result<()> {
    let relay = RelayHandle::spawn(config.ice_servers);
    let app = router(relay);

    info!("Signaling relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Relay server failed")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AppState>) -> Result<Json<RelayStats>, StatusCode> {
    state
        .relay
        .stats()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn room_members(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ParticipantId>>, StatusCode> {
    state
        .relay
        .members_of(RoomId::from(room_id))
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}
