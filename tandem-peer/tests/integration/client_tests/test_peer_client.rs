use std::sync::Arc;
use std::time::Duration;
use tandem_core::{EndReason, SessionId};
use tandem_peer::{PeerClient, PeerConfig, PeerEvent, TransportConfig};
use tandem_server::{ServerConfig, serve_listener, start_signaling};
use tokio::net::TcpListener;

use crate::integration::init_tracing;
use crate::utils::{MockNegotiatorFactory, NegotiatorCall};

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_listener(
        listener,
        start_signaling(&ServerConfig::default()),
    ));
    format!("ws://{}/ws", addr)
}

async fn connect(url: &str) -> (PeerClient, MockNegotiatorFactory) {
    let factory = MockNegotiatorFactory::new();
    let client = PeerClient::connect(
        url,
        PeerConfig::default(),
        TransportConfig::default(),
        Arc::new(factory.clone()),
    )
    .await
    .unwrap();
    (client, factory)
}

async fn next_event(client: &mut PeerClient) -> PeerEvent {
    tokio::time::timeout(WAIT, client.events.recv())
        .await
        .expect("no event in time")
        .expect("controller stopped")
}

async fn expect_matched(client: &mut PeerClient) -> (SessionId, bool) {
    match next_event(client).await {
        PeerEvent::Matched {
            session_id,
            is_initiator,
            ..
        } => (session_id, is_initiator),
        other => panic!("expected a match, got {:?}", other),
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out: {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_two_clients_negotiate_through_server() {
    init_tracing();

    let url = spawn_server().await;
    let (mut waiter, waiter_factory) = connect(&url).await;
    waiter.handle.request_match().await.unwrap();
    assert_eq!(
        next_event(&mut waiter).await,
        PeerEvent::Queued { position: 1 }
    );

    let (mut newcomer, newcomer_factory) = connect(&url).await;
    newcomer.handle.request_match().await.unwrap();

    let (waiter_session, waiter_initiates) = expect_matched(&mut waiter).await;
    let (newcomer_session, newcomer_initiates) = expect_matched(&mut newcomer).await;
    assert_eq!(waiter_session, newcomer_session);
    assert!(!waiter_initiates);
    assert!(newcomer_initiates);

    // offer-0 travels to the waiter, answer-0 comes back.
    eventually("answer applied by the initiator", || {
        newcomer_factory.created() == 1
            && newcomer_factory
                .probe(0)
                .calls()
                .contains(&NegotiatorCall::SetRemoteAnswer("answer-0".to_owned()))
    })
    .await;
    let responder = waiter_factory.probe(0);
    assert_eq!(
        responder.calls(),
        vec![
            NegotiatorCall::SetRemoteOffer("offer-0".to_owned()),
            NegotiatorCall::CreateAnswer,
        ]
    );
    assert_eq!(
        responder.ice_servers(),
        ServerConfig::default().ice_servers,
        "ice_config from the server is used"
    );

    responder.local_candidate("candidate:waiter");
    eventually("candidate relayed to the initiator", || {
        newcomer_factory.probe(0).applied_candidates() == vec!["candidate:waiter".to_owned()]
    })
    .await;
}

#[tokio::test]
async fn test_closing_client_ends_partner_session() {
    init_tracing();

    let url = spawn_server().await;
    let (mut waiter, _) = connect(&url).await;
    waiter.handle.request_match().await.unwrap();
    next_event(&mut waiter).await;
    let (mut newcomer, _) = connect(&url).await;
    newcomer.handle.request_match().await.unwrap();
    expect_matched(&mut waiter).await;
    expect_matched(&mut newcomer).await;

    newcomer.close().await;

    loop {
        match next_event(&mut waiter).await {
            PeerEvent::SessionEnded(reason) => {
                assert_eq!(reason, EndReason::PartnerDisconnected);
                break;
            }
            PeerEvent::RecoverableError { .. } => {}
            other => panic!("unexpected event {:?}", other),
        }
    }
}
