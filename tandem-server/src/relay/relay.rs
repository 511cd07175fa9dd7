use crate::session::SessionRegistry;
use tandem_core::{ConnectionId, ServerMessage, SessionId, Signal};
use thiserror::Error;

/// Why a signal was dropped instead of forwarded. All variants read as "stale
/// session" to the sender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("stale session: {0} is not active")]
    UnknownSession(SessionId),
    #[error("stale session: {from} is not a participant of {session_id}")]
    NotParticipant {
        from: ConnectionId,
        session_id: SessionId,
    },
    #[error("stale session: {to} is not the partner of {from} in {session_id}")]
    PartnerMismatch {
        from: ConnectionId,
        to: ConnectionId,
        session_id: SessionId,
    },
}

/// A validated signal, ready to be delivered to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedSignal {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

/// Check that `to` is the registered partner of `from` in `session_id` and wrap the
/// signal for delivery. The payload is passed through untouched.
pub fn relay(
    registry: &SessionRegistry,
    from: ConnectionId,
    to: ConnectionId,
    session_id: SessionId,
    signal: Signal,
) -> Result<RelayedSignal, RelayError> {
    let session = registry
        .get(&session_id)
        .ok_or(RelayError::UnknownSession(session_id))?;

    let partner = session
        .partner_of(&from)
        .ok_or(RelayError::NotParticipant { from, session_id })?;

    if partner != to {
        return Err(RelayError::PartnerMismatch {
            from,
            to,
            session_id,
        });
    }

    Ok(RelayedSignal {
        to,
        message: ServerMessage::Signal {
            from,
            session_id,
            signal,
        },
    })
}
