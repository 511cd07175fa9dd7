use tandem_core::{IceConnectivity, MediaKind, StreamKey};
use tokio::sync::mpsc;

/// What the negotiation resources report back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatorEvent {
    /// A local candidate that must be trickled to the partner.
    LocalCandidate(String),

    IceConnectivity(IceConnectivity),

    /// One media kind of an inbound stream showed up.
    RemoteTrack { stream_key: StreamKey, kind: MediaKind },
}

/// A [`NegotiatorEvent`] stamped with the epoch of the resources that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochEvent {
    pub epoch: u64,
    pub event: NegotiatorEvent,
}

/// Handed to each negotiator on creation. Events from resources that have since
/// been torn down carry an old epoch and are dropped by the controller.
#[derive(Debug, Clone)]
pub struct NegotiatorEventSender {
    epoch: u64,
    tx: mpsc::UnboundedSender<EpochEvent>,
}

impl NegotiatorEventSender {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<EpochEvent>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns `false` once the controller is gone.
    pub fn emit(&self, event: NegotiatorEvent) -> bool {
        self.tx
            .send(EpochEvent {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}
