use std::time::Duration;
use tandem_core::{
    ConnectionId, ErrorKind, ServerMessage, SessionId, Signal, SignalKind,
};
use tandem_peer::{PeerEvent, PeerHandle, PeerSnapshot};
use tokio::sync::mpsc;

use crate::utils::{MockNegotiatorFactory, RecordingSink};

const WAIT: Duration = Duration::from_secs(120);

/// A controller under test together with everything needed to drive it.
pub struct TestPeer {
    pub handle: PeerHandle,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    pub sink: RecordingSink,
    pub factory: MockNegotiatorFactory,
    pub partner: ConnectionId,
    pub session_id: SessionId,
}

impl TestPeer {
    pub async fn snapshot(&self) -> PeerSnapshot {
        self.handle.snapshot().await.expect("controller is running")
    }

    pub async fn deliver(&self, msg: ServerMessage) {
        self.handle.deliver(msg).await.expect("controller is running");
    }

    /// Deliver a signal from the partner in the current session.
    pub async fn signal(&self, kind: SignalKind, round: u32, payload: &str) {
        self.deliver(ServerMessage::Signal {
            from: self.partner,
            session_id: self.session_id,
            signal: Signal::new(kind, round, payload),
        })
        .await;
    }

    /// Deliver `Matched` and consume the resulting event. An initiator's
    /// first offer is left in the sink.
    pub async fn match_as(&mut self, is_initiator: bool) {
        self.deliver(ServerMessage::Matched {
            session_id: self.session_id,
            partner_id: self.partner,
            is_initiator,
        })
        .await;
        assert_eq!(
            self.next_event().await,
            PeerEvent::Matched {
                session_id: self.session_id,
                partner_id: self.partner,
                is_initiator,
            }
        );
    }

    /// Initiator that has sent its offer and applied the answer.
    pub async fn negotiated_initiator(&mut self) {
        self.match_as(true).await;
        let (_, _, offer) = self.sink.next_signal().await;
        assert_eq!(offer.kind, SignalKind::Offer);
        self.signal(SignalKind::Answer, offer.round, "remote-answer")
            .await;
        self.snapshot().await;
    }

    pub async fn next_event(&mut self) -> PeerEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("no event in time")
            .expect("controller stopped")
    }

    /// Skip events until one matches, returning it.
    pub async fn wait_for(&mut self, matches: impl Fn(&PeerEvent) -> bool) -> PeerEvent {
        loop {
            let event = self.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    }

    /// Events emitted so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn expect_recoverable(&mut self, kind: ErrorKind) -> String {
        match self.next_event().await {
            PeerEvent::RecoverableError { kind: got, message } if got == kind => message,
            other => panic!("expected a {} error, got {:?}", kind, other),
        }
    }
}
