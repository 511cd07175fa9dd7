use crate::controller::{ActiveSession, PeerError, PeerSession, PeerState, Role, TimerKey};
use crate::negotiator::{Negotiator, NegotiatorEventSender, SignalingState};
use anyhow::Context;
use tandem_core::{ConnectionId, SessionId, Signal, SignalKind};
use tracing::{debug, info, warn};

impl PeerSession {
    pub(super) async fn handle_signal(
        &mut self,
        from: ConnectionId,
        session_id: SessionId,
        signal: Signal,
    ) -> Result<(), PeerError> {
        let partner_id = self.check_session(session_id)?.partner_id;
        if from != partner_id {
            return Err(PeerError::StaleSession(format!(
                "{} is not the partner in {}",
                from, session_id
            )));
        }

        let Signal {
            kind,
            round,
            payload,
        } = signal;
        match kind {
            SignalKind::Offer => self.accept_offer(session_id, round, payload).await,
            SignalKind::Answer => self.accept_answer(session_id, round, payload).await,
            SignalKind::Candidate => self.submit_candidate(session_id, round, payload).await,
            SignalKind::RenegotiationRequest => self.on_renegotiation_request(session_id).await,
        }
    }

    pub(super) async fn produce_offer(&mut self) -> Result<(), PeerError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| PeerError::InvalidState("no active session".to_owned()))?;
        if session.role != Role::Initiator {
            return Err(PeerError::InvalidState(
                "only the initiator places offers".to_owned(),
            ));
        }
        if session.recovering {
            return Err(PeerError::InvalidState(
                "a retry is already scheduled".to_owned(),
            ));
        }
        let state = session.signaling_state();
        if state != SignalingState::Stable {
            return Err(PeerError::InvalidState(format!(
                "cannot offer in {:?}",
                state
            )));
        }

        self.send_offer().await
    }

    /// Open a new round with an offer, on fresh resources if the current ones
    /// already served a round.
    pub(super) async fn send_offer(&mut self) -> Result<(), PeerError> {
        let needs_fresh = self
            .session
            .as_ref()
            .is_some_and(|s| s.negotiator.is_none() || s.negotiator_round.is_some());
        if needs_fresh {
            self.replace_negotiator().await?;
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.round += 1;
        session.remote_applied = false;
        session.negotiator_round = Some(session.round);
        let round = session.round;
        self.state = PeerState::Negotiating(Role::Initiator);

        let sdp = self.negotiator()?.create_offer().await?;
        info!("Sending offer for round {}", round);
        self.send_signal(Signal::new(SignalKind::Offer, round, sdp))
            .await;
        Ok(())
    }

    pub(super) async fn accept_offer(
        &mut self,
        session_id: SessionId,
        round: u32,
        sdp: String,
    ) -> Result<(), PeerError> {
        let session = self.check_session(session_id)?;
        if session.role != Role::Responder {
            return Err(PeerError::InvalidState(
                "the initiator does not accept offers".to_owned(),
            ));
        }
        if round < session.round || (round == session.round && session.remote_applied) {
            return Err(PeerError::StaleSession(format!(
                "offer for round {} already superseded (current round {})",
                round, session.round
            )));
        }
        // A negotiator that already served a round is replaced, so only a
        // reused one has to be stable.
        let needs_fresh = session.negotiator.is_none() || session.negotiator_round.is_some();
        let state = session.signaling_state();
        if !needs_fresh && state != SignalingState::Stable {
            return Err(PeerError::InvalidState(format!(
                "cannot accept an offer in {:?}",
                state
            )));
        }

        if needs_fresh {
            self.replace_negotiator().await?;
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.recovering {
            info!("Partner re-offered, dropping the scheduled retry");
            session.recovering = false;
            self.timers.cancel(&TimerKey::RetryBackoff);
        }
        session.round = round;
        session.remote_applied = false;
        session.negotiator_round = Some(round);
        self.state = PeerState::Negotiating(Role::Responder);

        self.negotiator()?.set_remote_offer(sdp).await?;
        self.mark_remote_applied().await;

        let answer = self.negotiator()?.create_answer().await?;
        info!("Sending answer for round {}", round);
        self.send_signal(Signal::new(SignalKind::Answer, round, answer))
            .await;
        Ok(())
    }

    pub(super) async fn accept_answer(
        &mut self,
        session_id: SessionId,
        round: u32,
        sdp: String,
    ) -> Result<(), PeerError> {
        let session = self.check_session(session_id)?;
        if session.role != Role::Initiator {
            return Err(PeerError::InvalidState(
                "the responder does not accept answers".to_owned(),
            ));
        }
        if round != session.round {
            return Err(PeerError::StaleSession(format!(
                "answer for round {} while negotiating round {}",
                round, session.round
            )));
        }
        if session.remote_applied {
            return Err(PeerError::InvalidState(format!(
                "round {} already has a remote description",
                round
            )));
        }
        let state = session.signaling_state();
        if !matches!(
            state,
            SignalingState::Stable | SignalingState::HaveLocalOffer
        ) {
            return Err(PeerError::InvalidState(format!(
                "cannot accept an answer in {:?}",
                state
            )));
        }

        self.negotiator()?.set_remote_answer(sdp).await?;
        debug!("Applied answer for round {}", round);
        self.mark_remote_applied().await;
        Ok(())
    }

    pub(super) async fn on_renegotiation_request(
        &mut self,
        session_id: SessionId,
    ) -> Result<(), PeerError> {
        let session = self.check_session(session_id)?;
        if session.role != Role::Initiator {
            return Err(PeerError::InvalidState(
                "only the initiator answers renegotiation requests".to_owned(),
            ));
        }
        if session.recovering {
            debug!("Renegotiation requested while our own retry is pending");
            return Ok(());
        }

        info!("Partner asked for a new offer");
        self.send_offer().await
    }

    /// Build negotiation resources for the current session under the current epoch.
    pub(super) async fn build_negotiator(&mut self) -> anyhow::Result<()> {
        let events = NegotiatorEventSender::new(self.epoch, self.negotiator_tx.clone());
        let negotiator = self
            .factory
            .create(&self.ice_servers, events)
            .await
            .context("Failed to build negotiation resources")?;

        match self.session.as_mut() {
            Some(session) => {
                session.negotiator = Some(negotiator);
                session.negotiator_round = None;
                session.remote_applied = false;
            }
            None => {
                if let Err(e) = negotiator.close().await {
                    warn!("Failed to close orphaned negotiator: {:#}", e);
                }
            }
        }
        Ok(())
    }

    /// Close the current resources and open fresh ones for the same session.
    pub(super) async fn replace_negotiator(&mut self) -> anyhow::Result<()> {
        self.reset_resources().await;
        self.build_negotiator().await
    }

    /// Close the current negotiator and forget everything tied to it. The
    /// session, its round, and its candidate buffer survive.
    pub(super) async fn reset_resources(&mut self) {
        self.timers.clear();
        self.epoch += 1;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.tracks.clear();
        session.remote_applied = false;
        session.negotiator_round = None;
        if let Some(negotiator) = session.negotiator.take() {
            if let Err(e) = negotiator.close().await {
                warn!("Failed to close negotiator: {:#}", e);
            }
        }
    }

    pub(super) fn negotiator(&self) -> Result<&dyn Negotiator, PeerError> {
        self.session
            .as_ref()
            .and_then(|s| s.negotiator.as_deref())
            .ok_or_else(|| PeerError::InvalidState("no negotiation resources".to_owned()))
    }

    pub(super) fn check_session(
        &self,
        session_id: SessionId,
    ) -> Result<&ActiveSession, PeerError> {
        match &self.session {
            Some(session) if session.session_id == session_id => Ok(session),
            Some(session) => Err(PeerError::StaleSession(format!(
                "{} is not the current session {}",
                session_id, session.session_id
            ))),
            None => Err(PeerError::StaleSession(format!(
                "{} is no longer active",
                session_id
            ))),
        }
    }
}
