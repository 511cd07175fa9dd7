use crate::lobby::{LobbyCommand, LobbyStats};
use crate::signaling::SignalingOutput;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{ConnectionId, IceServerConfig, ServerMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

struct SignalingInner {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Connection table of the WebSocket transport.
///
/// Cheap to clone; every clone shares the same table and lobby.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    lobby_tx: Option<mpsc::Sender<LobbyCommand>>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
                ice_servers,
            }),
            lobby_tx: None,
        }
    }

    /// Attach the lobby that inbound frames are forwarded to.
    pub fn with_lobby(mut self, lobby_tx: mpsc::Sender<LobbyCommand>) -> Self {
        self.lobby_tx = Some(lobby_tx);
        self
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub(crate) fn add_connection(
        &self,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        self.inner.connections.insert(connection_id, tx);
    }

    pub(crate) fn remove_connection(&self, connection_id: &ConnectionId) {
        self.inner.connections.remove(connection_id);
    }

    pub(crate) async fn dispatch(&self, cmd: LobbyCommand) -> Result<()> {
        let lobby_tx = self.lobby_tx.as_ref().context("No lobby attached")?;
        lobby_tx.send(cmd).await.context("Lobby died")?;
        Ok(())
    }

    pub async fn lobby_stats(&self) -> Result<LobbyStats> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(LobbyCommand::Stats { reply }).await?;
        rx.await.context("Lobby dropped the stats request")
    }

    pub fn send_message(&self, connection_id: ConnectionId, msg: &ServerMessage) {
        let Some(connection) = self.inner.connections.get(&connection_id) else {
            warn!(
                "Attempted to send {:?} to disconnected connection {}",
                msg, connection_id
            );
            return;
        };
        match serde_json::to_string(msg) {
            Ok(json) => {
                // Unbounded send never waits, so the DashMap read guard is short-lived.
                if let Err(e) = connection.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", connection_id, e);
                }
            }
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send(&self, connection_id: ConnectionId, msg: ServerMessage) {
        self.send_message(connection_id, &msg);
    }
}
