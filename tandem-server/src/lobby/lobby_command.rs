use serde::Serialize;
use tandem_core::{ClientMessage, ConnectionId, SessionId, Signal};
use tokio::sync::oneshot;

/// Commands the lobby receives from the transport layer.
#[derive(Debug)]
pub enum LobbyCommand {
    /// The connection wants a partner.
    RequestMatch { connection_id: ConnectionId },

    /// The connection stops looking for a partner.
    CancelMatch { connection_id: ConnectionId },

    /// End the current session and look for a new partner right away.
    Skip { connection_id: ConnectionId },

    /// End the current session (or stop searching) without re-queueing.
    End { connection_id: ConnectionId },

    /// Negotiation message for the partner in `session_id`.
    Relay {
        from: ConnectionId,
        to: ConnectionId,
        session_id: SessionId,
        signal: Signal,
    },

    /// The transport lost the connection.
    Disconnect { connection_id: ConnectionId },

    Stats { reply: oneshot::Sender<LobbyStats> },
}

impl LobbyCommand {
    pub fn from_client(connection_id: ConnectionId, msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::RequestMatch => LobbyCommand::RequestMatch { connection_id },
            ClientMessage::CancelMatch => LobbyCommand::CancelMatch { connection_id },
            ClientMessage::Skip => LobbyCommand::Skip { connection_id },
            ClientMessage::End => LobbyCommand::End { connection_id },
            ClientMessage::Signal {
                to,
                session_id,
                signal,
            } => LobbyCommand::Relay {
                from: connection_id,
                to,
                session_id,
                signal,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LobbyStats {
    pub waiting: usize,
    pub active_sessions: usize,
    /// No connection is both queued and paired, and the registry agrees with itself.
    pub consistent: bool,
}
