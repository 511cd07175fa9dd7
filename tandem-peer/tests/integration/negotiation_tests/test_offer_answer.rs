use tandem_core::{ClientMessage, IceConnectivity, IceServerConfig, ServerMessage, SignalKind};
use tandem_peer::{PeerEvent, PeerState, Role};

use crate::integration::{create_test_peer, init_tracing};
use crate::utils::NegotiatorCall;

#[tokio::test(start_paused = true)]
async fn test_initiator_offers_then_applies_answer() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.match_as(true).await;

    let (to, session_id, offer) = peer.sink.next_signal().await;
    assert_eq!(to, peer.partner);
    assert_eq!(session_id, peer.session_id);
    assert_eq!(offer.kind, SignalKind::Offer);
    assert_eq!(offer.round, 1);
    assert_eq!(offer.payload, "offer-0");

    peer.signal(SignalKind::Answer, 1, "remote-answer").await;
    let snapshot = peer.snapshot().await;
    assert_eq!(snapshot.state, PeerState::Negotiating(Role::Initiator));
    assert_eq!(
        peer.factory.probe(0).calls(),
        vec![
            NegotiatorCall::CreateOffer,
            NegotiatorCall::SetRemoteAnswer("remote-answer".to_owned()),
        ]
    );

    peer.factory.probe(0).connectivity(IceConnectivity::Connected);
    assert_eq!(
        peer.next_event().await,
        PeerEvent::ConnectivityChanged(IceConnectivity::Connected)
    );
    assert_eq!(peer.snapshot().await.state, PeerState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_responder_answers_each_offer() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.match_as(false).await;
    peer.snapshot().await;
    assert!(peer.sink.drain().is_empty(), "the responder waits for an offer");

    peer.signal(SignalKind::Offer, 1, "remote-offer").await;
    let (to, _, answer) = peer.sink.next_signal().await;
    assert_eq!(to, peer.partner);
    assert_eq!(answer.kind, SignalKind::Answer);
    assert_eq!(answer.round, 1);
    assert_eq!(answer.payload, "answer-0");

    // A later round runs on fresh resources.
    peer.signal(SignalKind::Offer, 2, "second-offer").await;
    let (_, _, answer) = peer.sink.next_signal().await;
    assert_eq!(answer.round, 2);
    assert_eq!(answer.payload, "answer-1");
    assert_eq!(peer.factory.created(), 2);
    assert!(peer.factory.probe(0).is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_local_candidates_are_trickled_with_round() {
    init_tracing();

    let mut peer = create_test_peer();
    peer.negotiated_initiator().await;

    peer.factory.probe(0).local_candidate(r#"{"candidate":"local-1"}"#);
    let (to, session_id, candidate) = peer.sink.next_signal().await;

    assert_eq!(to, peer.partner);
    assert_eq!(session_id, peer.session_id);
    assert_eq!(candidate.kind, SignalKind::Candidate);
    assert_eq!(candidate.round, 1);
    assert_eq!(candidate.payload, r#"{"candidate":"local-1"}"#);
}

#[tokio::test(start_paused = true)]
async fn test_ice_config_feeds_new_negotiators() {
    init_tracing();

    let mut peer = create_test_peer();
    let servers = vec![IceServerConfig {
        urls: vec!["turn:turn.example.org:3478".to_owned()],
        username: Some("user".to_owned()),
        credential: Some("secret".to_owned()),
    }];
    peer.deliver(ServerMessage::IceConfig {
        ice_servers: servers.clone(),
    })
    .await;

    peer.match_as(false).await;
    peer.snapshot().await;

    assert_eq!(peer.factory.latest().ice_servers(), servers);
    assert!(
        !peer
            .sink
            .drain()
            .iter()
            .any(|frame| matches!(frame, ClientMessage::Signal { .. }))
    );
}
