use crate::controller::{ActiveSession, PeerError, PeerEvent, PeerSession, PeerState, Role, TimerKey};
use tandem_core::{ClientMessage, ConnectionId, EndReason, ErrorKind, ServerMessage, SessionId};
use tracing::{debug, info, warn};

impl PeerSession {
    pub(super) async fn request_match(&mut self) {
        match self.state {
            PeerState::Idle | PeerState::Ended => {}
            PeerState::Searching => {
                debug!("Match request already outstanding");
                return;
            }
            _ => {
                self.report(PeerError::InvalidState(
                    "skip or end the current session before requesting a match".to_owned(),
                ));
                return;
            }
        }

        self.timers.cancel(&TimerKey::Requeue);
        self.state = PeerState::Searching;
        self.send(ClientMessage::RequestMatch).await;
    }

    pub(super) async fn cancel_match(&mut self) {
        self.timers.cancel(&TimerKey::Requeue);
        if self.state == PeerState::Searching {
            self.send(ClientMessage::CancelMatch).await;
        }
    }

    pub(super) async fn skip(&mut self) {
        if self.session.is_some() {
            self.end_session_locally(EndReason::Skipped).await;
        } else if self.state == PeerState::Searching {
            debug!("Skip while searching, nothing to skip");
            return;
        }

        self.timers.cancel(&TimerKey::Requeue);
        self.state = PeerState::Searching;
        self.send(ClientMessage::Skip).await;
    }

    pub(super) async fn end(&mut self) {
        self.timers.cancel(&TimerKey::Requeue);
        if self.session.is_some() {
            self.end_session_locally(EndReason::Ended).await;
            self.send(ClientMessage::End).await;
        } else if self.state == PeerState::Searching {
            // The server drops the queue entry and answers with `queue_left`.
            self.send(ClientMessage::End).await;
        }
    }

    pub(super) async fn deliver(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Welcome { connection_id } => {
                info!("Connected to signaling server as {}", connection_id);
                self.connection_id = Some(connection_id);
            }

            ServerMessage::IceConfig { ice_servers } => {
                info!("Received ICE config: {} servers", ice_servers.len());
                if !ice_servers.is_empty() {
                    self.ice_servers = ice_servers;
                }
            }

            ServerMessage::Queued { position } => {
                if self.session.is_none() {
                    self.state = PeerState::Searching;
                }
                self.emit(PeerEvent::Queued { position });
            }

            ServerMessage::QueueLeft => {
                if self.state == PeerState::Searching {
                    self.state = PeerState::Idle;
                }
                self.emit(PeerEvent::QueueLeft);
            }

            ServerMessage::Matched {
                session_id,
                partner_id,
                is_initiator,
            } => {
                self.begin_session(session_id, partner_id, is_initiator)
                    .await;
            }

            ServerMessage::Signal {
                from,
                session_id,
                signal,
            } => {
                let result = self.handle_signal(from, session_id, signal).await;
                self.settle(result).await;
            }

            ServerMessage::SessionEnded { reason } => self.on_session_ended(reason).await,

            ServerMessage::Error { kind, message } => {
                warn!("Signaling server reported {}: {}", kind, message);
                self.emit(PeerEvent::RecoverableError { kind, message });
            }
        }
    }

    async fn begin_session(
        &mut self,
        session_id: SessionId,
        partner_id: ConnectionId,
        is_initiator: bool,
    ) {
        if self.session.is_some() {
            warn!("Matched into {} with a session still open", session_id);
            self.teardown_session().await;
        }

        let role = if is_initiator {
            Role::Initiator
        } else {
            Role::Responder
        };
        self.timers.cancel(&TimerKey::Requeue);
        self.session = Some(ActiveSession::new(session_id, partner_id, role));
        self.state = PeerState::Negotiating(role);

        info!("Matched with {} in {} as {:?}", partner_id, session_id, role);
        self.emit(PeerEvent::Matched {
            session_id,
            partner_id,
            is_initiator,
        });

        if let Err(e) = self.build_negotiator().await {
            self.handle_failure(ErrorKind::Negotiation, format!("{:#}", e))
                .await;
            return;
        }
        if role == Role::Initiator {
            let result = self.send_offer().await;
            self.settle(result).await;
        }
    }

    async fn on_session_ended(&mut self, reason: EndReason) {
        if self.session.is_none() {
            debug!("Server closed a session already torn down ({:?})", reason);
            return;
        }

        self.end_session_locally(reason).await;

        if matches!(
            reason,
            EndReason::PartnerLeft | EndReason::PartnerDisconnected
        ) {
            if let Some(delay) = self.config.auto_requeue_delay {
                debug!("Requeueing in {:?}", delay);
                self.timers.arm(TimerKey::Requeue, delay, self.epoch);
            }
        }
    }

    pub(super) async fn end_session_locally(&mut self, reason: EndReason) {
        self.teardown_session().await;
        self.state = PeerState::Ended;
        self.emit(PeerEvent::SessionEnded(reason));
    }

    /// Drop every piece of per-session state. Safe to call without a session.
    pub(super) async fn teardown_session(&mut self) {
        self.timers.clear();
        let Some(session) = self.session.take() else {
            return;
        };
        self.epoch += 1;

        if let Some(negotiator) = session.negotiator {
            if let Err(e) = negotiator.close().await {
                warn!("Failed to close negotiator: {:#}", e);
            }
        }
        info!(
            "Session {} torn down ({} buffered candidates dropped)",
            session.session_id,
            session.buffered_candidates.len()
        );
    }
}
