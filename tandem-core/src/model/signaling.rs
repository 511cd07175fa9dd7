use crate::model::connection::ConnectionId;
use crate::model::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
    /// Asks the initiator to re-offer after the sender rebuilt its resources.
    RenegotiationRequest,
}

/// One negotiation message. The relay forwards it without looking inside.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signal {
    pub kind: SignalKind,
    /// Negotiation round the payload belongs to.
    pub round: u32,
    pub payload: String,
}

impl Signal {
    pub fn new(kind: SignalKind, round: u32, payload: impl Into<String>) -> Self {
        Self {
            kind,
            round,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// This side ended the session.
    Ended,
    /// This side skipped to the next partner.
    Skipped,
    PartnerLeft,
    PartnerDisconnected,
    /// Recovery gave up on the session.
    ConnectionFailed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StaleSession,
    MalformedMessage,
    InvalidState,
    Negotiation,
    Connectivity,
    RecoveryExhausted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::StaleSession => "stale_session",
            ErrorKind::MalformedMessage => "malformed_message",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Negotiation => "negotiation",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::RecoveryExhausted => "recovery_exhausted",
        };
        f.write_str(name)
    }
}

/// Frames a participant sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ClientMessage {
    RequestMatch,
    CancelMatch,
    Skip,
    End,
    Signal {
        to: ConnectionId,
        session_id: SessionId,
        signal: Signal,
    },
}

/// Frames the server sends to a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
    },
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    Queued {
        position: usize,
    },
    QueueLeft,
    Matched {
        session_id: SessionId,
        partner_id: ConnectionId,
        is_initiator: bool,
    },
    Signal {
        from: ConnectionId,
        session_id: SessionId,
        signal: Signal,
    },
    SessionEnded {
        reason: EndReason,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}
