use std::time::Duration;
use tandem_core::{ClientMessage, EndReason, ErrorKind, IceConnectivity, SignalKind};
use tandem_peer::{PeerEvent, PeerState, TimerKey};
use tokio::time::Instant;

use crate::integration::{create_test_peer, init_tracing};

#[tokio::test(start_paused = true)]
async fn test_failure_schedules_a_rebuild() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let start = Instant::now();

    peer.factory.probe(0).connectivity(IceConnectivity::Failed);
    assert_eq!(
        peer.next_event().await,
        PeerEvent::ConnectivityChanged(IceConnectivity::Failed)
    );
    peer.expect_recoverable(ErrorKind::Connectivity).await;

    let snapshot = peer.snapshot().await;
    assert_eq!(snapshot.state, PeerState::Recovering);
    assert_eq!(snapshot.reconnect_attempts, 1);
    assert_eq!(snapshot.armed_timers, vec![TimerKey::RetryBackoff]);

    assert_eq!(
        peer.next_event().await,
        PeerEvent::Renegotiating { attempt: 1 }
    );
    assert!(start.elapsed() >= Duration::from_secs(1));

    let (_, session_id, offer) = peer.sink.next_signal().await;
    assert_eq!(session_id, peer.session_id, "recovery stays in the session");
    assert_eq!(offer.kind, SignalKind::Offer);
    assert_eq!(offer.round, 2);
    assert_eq!(offer.payload, "offer-1");
    assert_eq!(peer.factory.created(), 2);
    assert!(peer.factory.probe(0).is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_and_ends_in_fatal_error() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    peer.factory.fail_next_creates(100);
    let start = Instant::now();

    peer.factory.probe(0).connectivity(IceConnectivity::Failed);

    let mut retries = Vec::new();
    let fatal = loop {
        match peer.next_event().await {
            PeerEvent::Renegotiating { attempt } => {
                retries.push((attempt, start.elapsed().as_secs()));
            }
            event @ PeerEvent::FatalError { .. } => break event,
            _ => {}
        }
    };

    assert_eq!(retries, vec![(1, 1), (2, 3), (3, 7), (4, 15), (5, 25)]);
    let PeerEvent::FatalError { kind, .. } = fatal else {
        unreachable!()
    };
    assert_eq!(kind, ErrorKind::RecoveryExhausted);
    assert_eq!(
        peer.next_event().await,
        PeerEvent::SessionEnded(EndReason::ConnectionFailed)
    );
    assert_eq!(peer.sink.next().await, ClientMessage::End);

    let snapshot = peer.snapshot().await;
    assert_eq!(snapshot.state, PeerState::Ended);
    assert_eq!(snapshot.session_id, None);
    assert!(snapshot.armed_timers.is_empty(), "exhaustion does not requeue");
}

#[tokio::test(start_paused = true)]
async fn test_failure_while_recovering_is_ignored() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let probe = peer.factory.probe(0);

    probe.connectivity(IceConnectivity::Failed);
    probe.connectivity(IceConnectivity::Failed);
    let snapshot = peer.snapshot().await;

    assert_eq!(snapshot.reconnect_attempts, 1);
    let errors = peer
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, PeerEvent::RecoverableError { .. }))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_resets_the_attempt_counter() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;

    peer.factory.probe(0).connectivity(IceConnectivity::Failed);
    peer.wait_for(|event| matches!(event, PeerEvent::Renegotiating { .. }))
        .await;
    let (_, _, offer) = peer.sink.next_signal().await;
    peer.signal(SignalKind::Answer, offer.round, "answer-again")
        .await;
    assert_eq!(peer.snapshot().await.reconnect_attempts, 1);

    peer.factory.probe(1).connectivity(IceConnectivity::Connected);
    let snapshot = peer.snapshot().await;

    assert_eq!(snapshot.reconnect_attempts, 0);
    assert_eq!(snapshot.state, PeerState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_retired_negotiator_is_not_heard() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;

    peer.factory.probe(0).connectivity(IceConnectivity::Failed);
    peer.wait_for(|event| matches!(event, PeerEvent::Renegotiating { .. }))
        .await;
    peer.sink.next_signal().await;
    peer.drain_events();

    peer.factory.probe(0).connectivity(IceConnectivity::Failed);
    peer.factory.probe(0).local_candidate("from-the-past");
    let snapshot = peer.snapshot().await;

    assert!(peer.drain_events().is_empty());
    assert!(peer.sink.drain().is_empty());
    assert_eq!(snapshot.reconnect_attempts, 1);
    assert!(snapshot.armed_timers.is_empty());
}
