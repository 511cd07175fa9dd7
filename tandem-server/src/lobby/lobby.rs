use crate::lobby::{LobbyCommand, LobbyStats};
use crate::matchmaking::{MatchOutcome, MatchmakingQueue, Pairing};
use crate::relay::relay;
use crate::session::SessionRegistry;
use crate::signaling::SignalingOutput;
use std::sync::Arc;
use tandem_core::{ConnectionId, EndReason, ErrorKind, ServerMessage, SessionId, Signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owner of the matchmaking queue and the session registry.
///
/// Every mutation of pairing state runs inside one iteration of [`Lobby::run`], so
/// the check-and-mutate steps never interleave. Outbound frames go through
/// [`SignalingOutput`], which must not block.
pub struct Lobby {
    queue: MatchmakingQueue,
    registry: SessionRegistry,
    command_rx: mpsc::Receiver<LobbyCommand>,
    signaling: Arc<dyn SignalingOutput>,
}

impl Lobby {
    pub fn new(command_rx: mpsc::Receiver<LobbyCommand>, signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            queue: MatchmakingQueue::new(),
            registry: SessionRegistry::new(),
            command_rx,
            signaling,
        }
    }

    /// Spawn a lobby on the current runtime and return its command sender.
    pub fn spawn(signaling: Arc<dyn SignalingOutput>, buffer: usize) -> mpsc::Sender<LobbyCommand> {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(Lobby::new(rx, signaling).run());
        tx
    }

    pub async fn run(mut self) {
        info!("Lobby event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
            debug_assert!(self.is_consistent(), "lobby invariant broken");
        }

        info!("Command channel closed. Lobby event loop finished");
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::RequestMatch { connection_id } => {
                self.request_match(connection_id).await;
            }

            LobbyCommand::CancelMatch { connection_id } => {
                if self.queue.cancel_match(&connection_id) {
                    self.signaling
                        .send(connection_id, ServerMessage::QueueLeft)
                        .await;
                }
            }

            LobbyCommand::Skip { connection_id } => {
                if self.leave_session(connection_id, EndReason::Skipped).await {
                    info!("{} skipped to the next partner", connection_id);
                }
                self.request_match(connection_id).await;
            }

            LobbyCommand::End { connection_id } => {
                if !self.leave_session(connection_id, EndReason::Ended).await
                    && self.queue.cancel_match(&connection_id)
                {
                    self.signaling
                        .send(connection_id, ServerMessage::QueueLeft)
                        .await;
                }
            }

            LobbyCommand::Relay {
                from,
                to,
                session_id,
                signal,
            } => {
                self.relay(from, to, session_id, signal).await;
            }

            LobbyCommand::Disconnect { connection_id } => {
                info!("Connection {} disconnected", connection_id);
                self.queue.cancel_match(&connection_id);

                if let Some(ended) = self.registry.end_session_for(&connection_id) {
                    info!(
                        "{} ended by disconnect of {}",
                        ended.session.session_id, connection_id
                    );
                    self.signaling
                        .send(
                            ended.partner,
                            ServerMessage::SessionEnded {
                                reason: EndReason::PartnerDisconnected,
                            },
                        )
                        .await;
                }
            }

            LobbyCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    async fn request_match(&mut self, connection_id: ConnectionId) {
        match self.queue.request_match(connection_id, &mut self.registry) {
            MatchOutcome::Queued { position } => {
                self.signaling
                    .send(connection_id, ServerMessage::Queued { position })
                    .await;
            }
            MatchOutcome::Paired(pairing) => self.announce_pairing(pairing).await,
            MatchOutcome::Ignored => {}
        }
    }

    async fn announce_pairing(&self, pairing: Pairing) {
        let Pairing {
            session_id,
            initiator,
            responder,
        } = pairing;

        // If either side is already gone, its Disconnect command is still queued
        // behind this one and will end the session for the survivor.
        self.signaling
            .send(
                responder,
                ServerMessage::Matched {
                    session_id,
                    partner_id: initiator,
                    is_initiator: false,
                },
            )
            .await;
        self.signaling
            .send(
                initiator,
                ServerMessage::Matched {
                    session_id,
                    partner_id: responder,
                    is_initiator: true,
                },
            )
            .await;
    }

    /// End the session of `connection_id`, telling both sides. Returns whether a
    /// session existed.
    async fn leave_session(&mut self, connection_id: ConnectionId, reason: EndReason) -> bool {
        let Some(ended) = self.registry.end_session_for(&connection_id) else {
            return false;
        };
        info!(
            "Call ended in {} by {} ({:?})",
            ended.session.session_id, connection_id, reason
        );

        self.signaling
            .send(
                ended.partner,
                ServerMessage::SessionEnded {
                    reason: EndReason::PartnerLeft,
                },
            )
            .await;
        self.signaling
            .send(connection_id, ServerMessage::SessionEnded { reason })
            .await;
        true
    }

    async fn relay(
        &self,
        from: ConnectionId,
        to: ConnectionId,
        session_id: SessionId,
        signal: Signal,
    ) {
        let kind = signal.kind;
        match relay(&self.registry, from, to, session_id, signal) {
            Ok(relayed) => {
                debug!("Forwarding {:?} from {} to {} in {}", kind, from, to, session_id);
                self.signaling.send(relayed.to, relayed.message).await;
            }
            Err(e) => {
                warn!("Dropping {:?} from {}: {}", kind, from, e);
                self.signaling
                    .send(
                        from,
                        ServerMessage::Error {
                            kind: ErrorKind::StaleSession,
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    fn stats(&self) -> LobbyStats {
        LobbyStats {
            waiting: self.queue.len(),
            active_sessions: self.registry.len(),
            consistent: self.is_consistent(),
        }
    }

    fn is_consistent(&self) -> bool {
        self.registry.is_consistent() && self.queue.waiting().all(|id| !self.registry.contains(id))
    }
}
