use crate::controller::{BufferedCandidate, PeerError, PeerSession};
use tandem_core::SessionId;
use tracing::debug;

impl PeerSession {
    pub(super) async fn submit_candidate(
        &mut self,
        session_id: SessionId,
        round: u32,
        candidate: String,
    ) -> Result<(), PeerError> {
        let session = self.check_session(session_id)?;
        if round < session.round {
            return Err(PeerError::StaleSession(format!(
                "candidate for round {} while negotiating round {}",
                round, session.round
            )));
        }

        let apply_now =
            round == session.round && session.remote_applied && session.negotiator.is_some();
        if !apply_now {
            let Some(session) = self.session.as_mut() else {
                return Ok(());
            };
            session
                .buffered_candidates
                .push(BufferedCandidate { round, candidate });
            debug!(
                "Buffered candidate for round {} ({} pending)",
                round,
                session.buffered_candidates.len()
            );
            return Ok(());
        }

        self.negotiator()?
            .add_candidate(candidate)
            .await
            .map_err(PeerError::Candidate)
    }

    /// Record that the remote description of the current round is in place and
    /// apply the candidates that were waiting for it, oldest first.
    pub(super) async fn mark_remote_applied(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.remote_applied = true;

        let round = session.round;
        let buffered = std::mem::take(&mut session.buffered_candidates);
        let mut ready = Vec::new();
        for entry in buffered {
            if entry.round == round {
                ready.push(entry.candidate);
            } else if entry.round > round {
                session.buffered_candidates.push(entry);
            } else {
                debug!("Discarding buffered candidate of round {}", entry.round);
            }
        }
        if ready.is_empty() {
            return;
        }

        debug!("Applying {} buffered candidates for round {}", ready.len(), round);
        for candidate in ready {
            let result = match self.negotiator() {
                Ok(negotiator) => negotiator
                    .add_candidate(candidate)
                    .await
                    .map_err(PeerError::Candidate),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                self.report(e);
            }
        }
    }
}
