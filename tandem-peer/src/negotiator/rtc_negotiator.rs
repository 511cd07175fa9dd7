use crate::negotiator::{
    Negotiator, NegotiatorEvent, NegotiatorEventSender, NegotiatorFactory, SignalingState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::{IceConnectivity, IceServerConfig, MediaKind, StreamKey};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_remote::TrackRemote;

/// [`Negotiator`] backed by a `webrtc` peer connection.
pub struct RtcNegotiator {
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcNegotiator {
    pub async fn new(ice_servers: &[IceServerConfig], events: NegotiatorEventSender) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_events = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let events = state_events.clone();

                Box::pin(async move {
                    info!("ICE connection state changed: {:?}", s);
                    if let Some(connectivity) = map_ice_state(s) {
                        events.emit(NegotiatorEvent::IceConnectivity(connectivity));
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(str_candidate) = serde_json::to_string(&json_candidate) else {
                    return;
                };
                events.emit(NegotiatorEvent::LocalCandidate(str_candidate));
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        RTPCodecType::Video => MediaKind::Video,
                        _ => return,
                    };
                    let stream_key = StreamKey(track.stream_id());
                    debug!("Remote {} track on stream {}", kind, stream_key);
                    events.emit(NegotiatorEvent::RemoteTrack { stream_key, kind });
                })
            },
        ));

        Ok(Self { peer_connection })
    }

    /// Offer to receive audio and video even when nothing is sent.
    async fn ensure_transceivers(&self) -> Result<()> {
        if !self.peer_connection.get_transceivers().await.is_empty() {
            return Ok(());
        }
        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            self.peer_connection
                .add_transceiver_from_kind(kind, None)
                .await
                .with_context(|| format!("Failed to add {:?} transceiver", kind))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Negotiator for RtcNegotiator {
    async fn create_offer(&self) -> Result<String> {
        self.ensure_transceivers().await?;
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: String) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_str(&candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveLocalPranswer => {
                SignalingState::HaveLocalOffer
            }
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveRemotePranswer => {
                SignalingState::HaveRemoteOffer
            }
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Stable,
        }
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn map_ice_state(state: RTCIceConnectionState) -> Option<IceConnectivity> {
    Some(match state {
        RTCIceConnectionState::New => IceConnectivity::New,
        RTCIceConnectionState::Checking => IceConnectivity::Checking,
        RTCIceConnectionState::Connected => IceConnectivity::Connected,
        RTCIceConnectionState::Completed => IceConnectivity::Completed,
        RTCIceConnectionState::Disconnected => IceConnectivity::Disconnected,
        RTCIceConnectionState::Failed => IceConnectivity::Failed,
        RTCIceConnectionState::Closed => IceConnectivity::Closed,
        _ => return None,
    })
}

/// Builds an [`RtcNegotiator`] per session or retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcNegotiatorFactory;

#[async_trait]
impl NegotiatorFactory for RtcNegotiatorFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: NegotiatorEventSender,
    ) -> Result<Box<dyn Negotiator>> {
        debug!(
            "Creating peer connection (epoch {}, {} ICE servers)",
            events.epoch(),
            ice_servers.len()
        );
        Ok(Box::new(RtcNegotiator::new(ice_servers, events).await?))
    }
}
