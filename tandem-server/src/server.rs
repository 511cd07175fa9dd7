use crate::config::ServerConfig;
use crate::lobby::Lobby;
use crate::signaling::{SignalingService, ws_handler};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub connections: usize,
    pub waiting: usize,
    pub active_sessions: usize,
    /// Queue and registry agree; `false` means a lobby invariant broke.
    pub consistent: bool,
}

async fn health(
    State(service): State<SignalingService>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let stats = service.lobby_stats().await.map_err(|e| {
        error!("Health check failed: {:#}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        service: "tandem",
        connections: service.connection_count(),
        waiting: stats.waiting,
        active_sessions: stats.active_sessions,
        consistent: stats.consistent,
    }))
}

/// Spawn the lobby and return a service wired to it.
pub fn start_signaling(config: &ServerConfig) -> SignalingService {
    let service = SignalingService::new(config.ice_servers.clone());
    let lobby_tx = Lobby::spawn(Arc::new(service.clone()), config.lobby_buffer);
    service.with_lobby(lobby_tx)
}

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    serve_listener(listener, start_signaling(&config)).await
}

/// Serve on an already bound listener, e.g. one on an ephemeral port.
pub async fn serve_listener(listener: TcpListener, service: SignalingService) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no address")?;
    info!("Signaling server listening on http://{}", addr);

    axum::serve(listener, router(service))
        .await
        .context("Server terminated")?;
    Ok(())
}
