use std::time::Duration;
use tandem_core::{ErrorKind, IceConnectivity};
use tandem_peer::{PeerEvent, PeerState, TimerKey};
use tokio::time::Instant;

use crate::integration::{create_test_peer, init_tracing};

#[tokio::test(start_paused = true)]
async fn test_stuck_checking_counts_as_failure() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let start = Instant::now();

    peer.factory.probe(0).connectivity(IceConnectivity::Checking);
    assert_eq!(
        peer.next_event().await,
        PeerEvent::ConnectivityChanged(IceConnectivity::Checking)
    );
    assert_eq!(
        peer.snapshot().await.armed_timers,
        vec![TimerKey::CheckingTimeout]
    );

    peer.expect_recoverable(ErrorKind::Connectivity).await;
    assert!(start.elapsed() >= Duration::from_secs(10));

    assert_eq!(
        peer.next_event().await,
        PeerEvent::Renegotiating { attempt: 1 }
    );
    assert!(start.elapsed() >= Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_checking_that_connects_is_fine() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let probe = peer.factory.probe(0);

    probe.connectivity(IceConnectivity::Checking);
    tokio::time::sleep(Duration::from_secs(4)).await;
    probe.connectivity(IceConnectivity::Connected);
    let snapshot = peer.snapshot().await;

    assert!(snapshot.armed_timers.is_empty());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        peer.drain_events(),
        vec![
            PeerEvent::ConnectivityChanged(IceConnectivity::Checking),
            PeerEvent::ConnectivityChanged(IceConnectivity::Connected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_brief_disconnect_heals_within_grace() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let probe = peer.factory.probe(0);
    probe.connectivity(IceConnectivity::Connected);

    probe.connectivity(IceConnectivity::Disconnected);
    assert_eq!(
        peer.snapshot().await.armed_timers,
        vec![TimerKey::DisconnectGrace]
    );
    tokio::time::sleep(Duration::from_secs(2)).await;
    probe.connectivity(IceConnectivity::Connected);
    let snapshot = peer.snapshot().await;

    assert!(snapshot.armed_timers.is_empty());
    assert_eq!(snapshot.state, PeerState::Connected);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(
        !peer
            .drain_events()
            .iter()
            .any(|event| matches!(event, PeerEvent::RecoverableError { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_lasting_disconnect_counts_as_failure() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;
    let probe = peer.factory.probe(0);
    probe.connectivity(IceConnectivity::Connected);
    peer.snapshot().await;
    let start = Instant::now();

    probe.connectivity(IceConnectivity::Disconnected);
    peer.wait_for(|event| matches!(event, PeerEvent::RecoverableError { .. }))
        .await;

    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(peer.snapshot().await.state, PeerState::Recovering);
}
