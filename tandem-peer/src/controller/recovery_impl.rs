use crate::controller::{PeerEvent, PeerSession, PeerState, Role, TimerKey};
use tandem_core::{ClientMessage, EndReason, ErrorKind, Signal, SignalKind};
use tracing::{debug, error, info, warn};

impl PeerSession {
    /// Schedule a rebuild of the negotiation resources, or give up once the
    /// attempts are spent.
    pub(super) async fn handle_failure(&mut self, kind: ErrorKind, message: String) {
        let max_attempts = self.config.max_reconnect_attempts;
        let Some(session) = self.session.as_mut() else {
            debug!("Failure outside a session ignored: {}", message);
            return;
        };
        if session.recovering {
            debug!("Already recovering, ignoring: {}", message);
            return;
        }

        if session.reconnect_attempts >= max_attempts {
            error!(
                "Giving up on {} after {} attempts: {}",
                session.session_id, max_attempts, message
            );
            self.emit(PeerEvent::FatalError {
                kind: ErrorKind::RecoveryExhausted,
                message: format!(
                    "recovery failed after {} attempts: {}",
                    max_attempts, message
                ),
            });
            self.end_session_locally(EndReason::ConnectionFailed).await;
            self.send(ClientMessage::End).await;
            return;
        }

        session.reconnect_attempts += 1;
        session.recovering = true;
        let attempt = session.reconnect_attempts;
        let delay = self.config.backoff_delay(attempt);

        self.state = PeerState::Recovering;
        self.timers.cancel(&TimerKey::CheckingTimeout);
        self.timers.cancel(&TimerKey::DisconnectGrace);
        self.timers.arm(TimerKey::RetryBackoff, delay, self.epoch);

        warn!(
            "Retry {}/{} in {:?} after {}: {}",
            attempt, max_attempts, delay, kind, message
        );
        self.emit(PeerEvent::RecoverableError { kind, message });
    }

    /// Rebuild the negotiation resources and restart the handshake in the same
    /// session.
    pub(super) async fn retry(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.recovering = false;
        session.buffered_candidates.clear();
        let attempt = session.reconnect_attempts;
        let role = session.role;

        self.reset_resources().await;
        self.state = PeerState::Negotiating(role);
        info!("Renegotiating, attempt {}", attempt);
        self.emit(PeerEvent::Renegotiating { attempt });

        if let Err(e) = self.build_negotiator().await {
            self.handle_failure(ErrorKind::Negotiation, format!("{:#}", e))
                .await;
            return;
        }

        match role {
            Role::Initiator => {
                let result = self.send_offer().await;
                self.settle(result).await;
            }
            Role::Responder => {
                let round = self.session.as_ref().map_or(0, |s| s.round);
                self.send_signal(Signal::new(SignalKind::RenegotiationRequest, round, ""))
                    .await;
            }
        }
    }
}
