use std::time::Instant;
use tandem_core::{ConnectionId, SessionId};

/// A registered pair. `participant_a` is the side that was waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub participant_a: ConnectionId,
    pub participant_b: ConnectionId,
    pub created_at: Instant,
}

impl Session {
    pub fn involves(&self, connection_id: &ConnectionId) -> bool {
        &self.participant_a == connection_id || &self.participant_b == connection_id
    }

    /// The other participant, or `None` if `connection_id` is not part of this session.
    pub fn partner_of(&self, connection_id: &ConnectionId) -> Option<ConnectionId> {
        if &self.participant_a == connection_id {
            Some(self.participant_b)
        } else if &self.participant_b == connection_id {
            Some(self.participant_a)
        } else {
            None
        }
    }
}
