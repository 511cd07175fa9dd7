use tandem_core::{
    ConnectionId, EndReason, ErrorKind, IceConnectivity, MediaKind, SessionId, StreamKey,
};

/// What a [`crate::PeerSession`] tells the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Queued {
        position: usize,
    },
    QueueLeft,
    Matched {
        session_id: SessionId,
        partner_id: ConnectionId,
        is_initiator: bool,
    },
    /// Emitted once per stream after its announcements went quiet. `kinds` may
    /// hold a single kind.
    StreamReady {
        stream_key: StreamKey,
        kinds: Vec<MediaKind>,
    },
    ConnectivityChanged(IceConnectivity),
    SessionEnded(EndReason),
    RecoverableError {
        kind: ErrorKind,
        message: String,
    },
    FatalError {
        kind: ErrorKind,
        message: String,
    },
    /// Negotiation resources were rebuilt for retry number `attempt`.
    Renegotiating {
        attempt: u32,
    },
}
