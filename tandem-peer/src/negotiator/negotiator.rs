use crate::negotiator::NegotiatorEventSender;
use anyhow::Result;
use async_trait::async_trait;
use tandem_core::IceServerConfig;

/// Offer/answer state of one set of negotiation resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// The media-connection half of a session: descriptions, candidates, and the
/// transport they configure. Asynchronous happenings (local candidates, ICE
/// state, remote tracks) are reported through the [`NegotiatorEventSender`]
/// handed to the factory.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Create an offer and apply it as the local description.
    async fn create_offer(&self) -> Result<String>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    /// Create an answer to the applied remote offer and apply it locally.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_candidate(&self, candidate: String) -> Result<()>;

    fn signaling_state(&self) -> SignalingState;

    async fn close(&self) -> Result<()>;
}

/// Builds fresh negotiation resources for a session or a retry.
#[async_trait]
pub trait NegotiatorFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: NegotiatorEventSender,
    ) -> Result<Box<dyn Negotiator>>;
}
