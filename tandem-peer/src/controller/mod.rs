mod candidates_impl;
mod connectivity_impl;
mod lifecycle_impl;
mod negotiation_impl;
mod peer_command;
mod peer_error;
mod peer_event;
mod recovery_impl;
mod timers;
mod tracks_impl;

pub use peer_command::*;
pub use peer_error::*;
pub use peer_event::*;
pub use timers::TimerKey;

use crate::client::SignalingSink;
use crate::config::PeerConfig;
use crate::negotiator::{
    EpochEvent, Negotiator, NegotiatorEvent, NegotiatorFactory, SignalingState, TransportConfig,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tandem_core::{
    ClientMessage, ConnectionId, ErrorKind, IceServerConfig, MediaKind, SessionId, Signal,
    SignalKind, StreamKey,
};
use timers::{TimerEvent, Timers};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    /// A match request is outstanding.
    Searching,
    Negotiating(Role),
    Connected,
    /// Waiting out the backoff before rebuilding negotiation resources.
    Recovering,
    Ended,
}

/// Point-in-time view of a controller, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub state: PeerState,
    pub connection_id: Option<ConnectionId>,
    pub session_id: Option<SessionId>,
    pub partner_id: Option<ConnectionId>,
    pub round: u32,
    pub buffered_candidates: usize,
    pub tracked_streams: usize,
    pub reconnect_attempts: u32,
    pub armed_timers: Vec<TimerKey>,
    pub epoch: u64,
}

#[derive(Debug, Clone)]
struct BufferedCandidate {
    round: u32,
    candidate: String,
}

#[derive(Debug, Default)]
struct TrackEntry {
    seen_kinds: BTreeSet<MediaKind>,
    ready_emitted: bool,
}

/// Everything that lives exactly as long as one pairing.
struct ActiveSession {
    session_id: SessionId,
    partner_id: ConnectionId,
    role: Role,
    /// Offer/answer round currently being negotiated.
    round: u32,
    /// The remote description of `round` has been applied.
    remote_applied: bool,
    negotiator: Option<Box<dyn Negotiator>>,
    /// Round the current negotiator was used for. Every new round runs on
    /// fresh resources.
    negotiator_round: Option<u32>,
    buffered_candidates: Vec<BufferedCandidate>,
    tracks: HashMap<StreamKey, TrackEntry>,
    reconnect_attempts: u32,
    recovering: bool,
}

impl ActiveSession {
    fn new(session_id: SessionId, partner_id: ConnectionId, role: Role) -> Self {
        Self {
            session_id,
            partner_id,
            role,
            round: 0,
            remote_applied: false,
            negotiator: None,
            negotiator_round: None,
            buffered_candidates: Vec::new(),
            tracks: HashMap::new(),
            reconnect_attempts: 0,
            recovering: false,
        }
    }

    fn signaling_state(&self) -> SignalingState {
        self.negotiator
            .as_ref()
            .map_or(SignalingState::Stable, |negotiator| {
                negotiator.signaling_state()
            })
    }
}

/// Per-connection controller driving matchmaking requests, the offer/answer
/// handshake, readiness detection, and recovery.
///
/// It runs as one task. Application commands, server frames, negotiator events,
/// and timer firings are all handled one at a time from [`PeerSession::run`].
pub struct PeerSession {
    config: PeerConfig,
    state: PeerState,
    connection_id: Option<ConnectionId>,
    ice_servers: Vec<IceServerConfig>,
    session: Option<ActiveSession>,
    /// Bumped whenever negotiation resources are torn down.
    epoch: u64,
    timers: Timers,
    factory: Arc<dyn NegotiatorFactory>,
    sink: Arc<dyn SignalingSink>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    command_rx: mpsc::Receiver<PeerCommand>,
    negotiator_tx: mpsc::UnboundedSender<EpochEvent>,
    negotiator_rx: mpsc::UnboundedReceiver<EpochEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
}

impl PeerSession {
    pub fn new(
        config: PeerConfig,
        transport: TransportConfig,
        factory: Arc<dyn NegotiatorFactory>,
        sink: Arc<dyn SignalingSink>,
    ) -> (Self, PeerHandle, mpsc::UnboundedReceiver<PeerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (negotiator_tx, negotiator_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let session = Self {
            config,
            state: PeerState::Idle,
            connection_id: None,
            ice_servers: transport.ice_servers,
            session: None,
            epoch: 0,
            timers: Timers::new(timer_tx),
            factory,
            sink,
            events_tx,
            command_rx,
            negotiator_tx,
            negotiator_rx,
            timer_rx,
        };

        (session, PeerHandle::new(command_tx), events_rx)
    }

    /// Spawn a controller on the current runtime.
    pub fn spawn(
        config: PeerConfig,
        transport: TransportConfig,
        factory: Arc<dyn NegotiatorFactory>,
        sink: Arc<dyn SignalingSink>,
    ) -> (PeerHandle, mpsc::UnboundedReceiver<PeerEvent>) {
        let (session, handle, events) = Self::new(config, transport, factory, sink);
        tokio::spawn(session.run());
        (handle, events)
    }

    pub async fn run(mut self) {
        info!("Peer session started");

        loop {
            // Transport and timer events are drained before new commands.
            tokio::select! {
                biased;

                Some(event) = self.negotiator_rx.recv() => {
                    self.handle_negotiator_event(event).await;
                }
                Some(event) = self.timer_rx.recv() => {
                    self.handle_timer(event).await;
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(PeerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
            }
        }

        self.teardown_session().await;
        info!("Peer session finished");
    }

    async fn handle_command(&mut self, cmd: PeerCommand) {
        match cmd {
            PeerCommand::RequestMatch => self.request_match().await,
            PeerCommand::CancelMatch => self.cancel_match().await,
            PeerCommand::Skip => self.skip().await,
            PeerCommand::End => self.end().await,
            PeerCommand::ProduceOffer => {
                let result = self.produce_offer().await;
                self.settle(result).await;
            }
            PeerCommand::AcceptOffer {
                session_id,
                round,
                sdp,
            } => {
                let result = self.accept_offer(session_id, round, sdp).await;
                self.settle(result).await;
            }
            PeerCommand::AcceptAnswer {
                session_id,
                round,
                sdp,
            } => {
                let result = self.accept_answer(session_id, round, sdp).await;
                self.settle(result).await;
            }
            PeerCommand::SubmitCandidate {
                session_id,
                round,
                candidate,
            } => {
                let result = self.submit_candidate(session_id, round, candidate).await;
                self.settle(result).await;
            }
            PeerCommand::Deliver(msg) => self.deliver(msg).await,
            PeerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            PeerCommand::Shutdown => {}
        }
    }

    async fn handle_negotiator_event(&mut self, event: EpochEvent) {
        if event.epoch != self.epoch || self.session.is_none() {
            debug!("Dropping event from retired negotiator: {:?}", event);
            return;
        }

        match event.event {
            NegotiatorEvent::LocalCandidate(candidate) => {
                let Some(round) = self.session.as_ref().map(|s| s.round) else {
                    return;
                };
                self.send_signal(Signal::new(SignalKind::Candidate, round, candidate))
                    .await;
            }
            NegotiatorEvent::IceConnectivity(connectivity) => {
                self.on_connectivity(connectivity).await;
            }
            NegotiatorEvent::RemoteTrack { stream_key, kind } => {
                self.announce_track(stream_key, kind);
            }
        }
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        if event.epoch != self.epoch || !self.timers.claim(&event) {
            debug!("Dropping stale timer {:?}", event.key);
            return;
        }

        match event.key {
            TimerKey::TrackDebounce(stream_key) => self.stream_settled(stream_key),
            TimerKey::CheckingTimeout => {
                let message = format!(
                    "ICE checking did not finish within {:?}",
                    self.config.checking_timeout
                );
                self.handle_failure(ErrorKind::Connectivity, message).await;
            }
            TimerKey::DisconnectGrace => {
                let message = format!(
                    "Connection did not recover within {:?}",
                    self.config.disconnected_grace
                );
                self.handle_failure(ErrorKind::Connectivity, message).await;
            }
            TimerKey::RetryBackoff => self.retry().await,
            TimerKey::Requeue => {
                if self.state == PeerState::Ended {
                    info!("Looking for a new partner");
                    self.request_match().await;
                }
            }
        }
    }

    /// Route the outcome of a negotiation step. Negotiator failures start
    /// recovery; everything else is reported and leaves state untouched.
    async fn settle(&mut self, result: Result<(), PeerError>) {
        match result {
            Ok(()) => {}
            Err(PeerError::Negotiation(e)) => {
                self.handle_failure(ErrorKind::Negotiation, format!("{:#}", e))
                    .await;
            }
            Err(e) => self.report(e),
        }
    }

    fn report(&self, err: PeerError) {
        warn!("{}", err);
        self.emit(PeerEvent::RecoverableError {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn emit(&self, event: PeerEvent) {
        debug!("Peer event: {:?}", event);
        let _ = self.events_tx.send(event);
    }

    async fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.sink.send(msg).await {
            warn!("Failed to reach signaling server: {:#}", e);
        }
    }

    async fn send_signal(&self, signal: Signal) {
        let Some(session) = &self.session else {
            return;
        };
        self.send(ClientMessage::Signal {
            to: session.partner_id,
            session_id: session.session_id,
            signal,
        })
        .await;
    }

    fn snapshot(&self) -> PeerSnapshot {
        let session = self.session.as_ref();
        PeerSnapshot {
            state: self.state,
            connection_id: self.connection_id,
            session_id: session.map(|s| s.session_id),
            partner_id: session.map(|s| s.partner_id),
            round: session.map_or(0, |s| s.round),
            buffered_candidates: session.map_or(0, |s| s.buffered_candidates.len()),
            tracked_streams: session.map_or(0, |s| s.tracks.len()),
            reconnect_attempts: session.map_or(0, |s| s.reconnect_attempts),
            armed_timers: self.timers.armed_keys(),
            epoch: self.epoch,
        }
    }
}
