use crate::session::SessionRegistry;
use std::collections::VecDeque;
use std::time::Instant;
use tandem_core::{ConnectionId, SessionId};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub enqueued_at: Instant,
}

/// A pair produced by the queue and already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub session_id: SessionId,
    /// The requester that found someone waiting. It places the offer.
    pub initiator: ConnectionId,
    /// The entry that had been waiting.
    pub responder: ConnectionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No one was waiting; 1-based position in the queue.
    Queued { position: usize },
    Paired(Pairing),
    /// Already queued or already in a session. Nothing changed.
    Ignored,
}

/// FIFO pool of connections looking for a partner.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<WaitingEntry>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `connection_id` with the oldest waiter, or enqueue it.
    ///
    /// The dequeue and the session registration happen under the same exclusive
    /// borrow, so a waiter can never be handed out twice.
    pub fn request_match(
        &mut self,
        connection_id: ConnectionId,
        registry: &mut SessionRegistry,
    ) -> MatchOutcome {
        if self.contains(&connection_id) {
            warn!("{} already in queue", connection_id);
            return MatchOutcome::Ignored;
        }
        if registry.contains(&connection_id) {
            warn!("{} requested a match while in a session", connection_id);
            return MatchOutcome::Ignored;
        }

        let Some(waiter) = self.waiting.pop_front() else {
            self.waiting.push_back(WaitingEntry {
                connection_id,
                enqueued_at: Instant::now(),
            });
            let position = self.waiting.len();
            info!(
                "{} added to queue. Queue size: {}",
                connection_id, position
            );
            return MatchOutcome::Queued { position };
        };

        match registry.create_session(waiter.connection_id, connection_id) {
            Ok(session_id) => {
                info!(
                    "Matched {} with {} after {:?} in queue",
                    waiter.connection_id,
                    connection_id,
                    waiter.enqueued_at.elapsed()
                );
                MatchOutcome::Paired(Pairing {
                    session_id,
                    initiator: connection_id,
                    responder: waiter.connection_id,
                })
            }
            Err(e) => {
                // Queue and registry membership are disjoint, so this only fires on a
                // broken invariant. Put the waiter back where it was.
                warn!("Refusing to pair from queue: {}", e);
                self.waiting.push_front(waiter);
                MatchOutcome::Ignored
            }
        }
    }

    /// Remove `connection_id` from the queue. Returns whether it was waiting.
    pub fn cancel_match(&mut self, connection_id: &ConnectionId) -> bool {
        let Some(index) = self
            .waiting
            .iter()
            .position(|entry| &entry.connection_id == connection_id)
        else {
            return false;
        };
        self.waiting.remove(index);
        info!("{} left queue", connection_id);
        true
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.waiting
            .iter()
            .any(|entry| &entry.connection_id == connection_id)
    }

    /// 1-based position of `connection_id`, if it is waiting.
    pub fn position(&self, connection_id: &ConnectionId) -> Option<usize> {
        self.waiting
            .iter()
            .position(|entry| &entry.connection_id == connection_id)
            .map(|index| index + 1)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &ConnectionId> {
        self.waiting.iter().map(|entry| &entry.connection_id)
    }
}
