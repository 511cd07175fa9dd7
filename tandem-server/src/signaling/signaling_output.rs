use async_trait::async_trait;
use tandem_core::{ConnectionId, ServerMessage};

/// Outbound side of the message transport, as seen by the lobby.
///
/// Implementations must hand the frame off without waiting on the recipient, so
/// one slow socket cannot stall matchmaking for everyone else.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Deliver `msg` to `connection_id`. Frames for unknown connections are dropped.
    async fn send(&self, connection_id: ConnectionId, msg: ServerMessage);
}
