use crate::session::Session;
use std::collections::HashMap;
use std::time::Instant;
use tandem_core::{ConnectionId, SessionId};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} already has an active session")]
    AlreadyInSession(ConnectionId),
    #[error("a connection cannot be paired with itself ({0})")]
    SelfPairing(ConnectionId),
}

/// Result of tearing down a session on behalf of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    pub session: Session,
    /// The participant that did not trigger the teardown.
    pub partner: ConnectionId,
}

/// Single source of truth for who is paired with whom.
///
/// Both lookup directions are only ever changed together, inside one `&mut self` call.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    by_connection: HashMap<ConnectionId, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pair. `a` is the side that was waiting, `b` the new arrival.
    pub fn create_session(
        &mut self,
        a: ConnectionId,
        b: ConnectionId,
    ) -> Result<SessionId, RegistryError> {
        if a == b {
            return Err(RegistryError::SelfPairing(a));
        }
        for id in [a, b] {
            if self.by_connection.contains_key(&id) {
                return Err(RegistryError::AlreadyInSession(id));
            }
        }

        let session_id = SessionId::new();
        self.sessions.insert(
            session_id,
            Session {
                session_id,
                participant_a: a,
                participant_b: b,
                created_at: Instant::now(),
            },
        );
        self.by_connection.insert(a, session_id);
        self.by_connection.insert(b, session_id);

        info!("Created {} for {} and {}", session_id, a, b);
        Ok(session_id)
    }

    pub fn lookup_session(&self, connection_id: &ConnectionId) -> Option<&Session> {
        self.by_connection
            .get(connection_id)
            .and_then(|session_id| self.sessions.get(session_id))
    }

    pub fn lookup_partner(&self, connection_id: &ConnectionId) -> Option<ConnectionId> {
        self.lookup_session(connection_id)
            .and_then(|session| session.partner_of(connection_id))
    }

    pub fn get(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.by_connection.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove the session and both participant entries. A second call returns `None`.
    pub fn end_session(&mut self, session_id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        self.by_connection.remove(&session.participant_a);
        self.by_connection.remove(&session.participant_b);

        debug!("Ended {}", session_id);
        Some(session)
    }

    /// Resolve the session of `connection_id` and end it.
    pub fn end_session_for(&mut self, connection_id: &ConnectionId) -> Option<EndedSession> {
        let session_id = *self.by_connection.get(connection_id)?;
        let session = self.end_session(&session_id)?;
        let partner = session.partner_of(connection_id)?;

        Some(EndedSession { session, partner })
    }

    /// Both lookup directions agree and no connection appears twice.
    pub fn is_consistent(&self) -> bool {
        if self.by_connection.len() != self.sessions.len() * 2 {
            return false;
        }
        self.by_connection.iter().all(|(connection_id, session_id)| {
            self.sessions
                .get(session_id)
                .is_some_and(|session| session.involves(connection_id))
        })
    }
}
