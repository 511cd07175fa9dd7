use crate::controller::PeerSnapshot;
use anyhow::{Result, anyhow};
use tandem_core::{ServerMessage, SessionId};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum PeerCommand {
    RequestMatch,
    CancelMatch,
    /// End the current session and look for the next partner.
    Skip,
    /// End the current session without looking again.
    End,
    ProduceOffer,
    AcceptOffer {
        session_id: SessionId,
        round: u32,
        sdp: String,
    },
    AcceptAnswer {
        session_id: SessionId,
        round: u32,
        sdp: String,
    },
    SubmitCandidate {
        session_id: SessionId,
        round: u32,
        candidate: String,
    },
    /// A frame received from the signaling server.
    Deliver(ServerMessage),
    Snapshot {
        reply: oneshot::Sender<PeerSnapshot>,
    },
    Shutdown,
}

/// Cloneable front door of a running [`crate::PeerSession`].
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::Sender<PeerCommand>,
}

impl PeerHandle {
    pub(crate) fn new(tx: mpsc::Sender<PeerCommand>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, cmd: PeerCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("Peer session is gone"))
    }

    pub async fn request_match(&self) -> Result<()> {
        self.send(PeerCommand::RequestMatch).await
    }

    pub async fn cancel_match(&self) -> Result<()> {
        self.send(PeerCommand::CancelMatch).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.send(PeerCommand::Skip).await
    }

    pub async fn end(&self) -> Result<()> {
        self.send(PeerCommand::End).await
    }

    pub async fn produce_offer(&self) -> Result<()> {
        self.send(PeerCommand::ProduceOffer).await
    }

    pub async fn accept_offer(&self, session_id: SessionId, round: u32, sdp: String) -> Result<()> {
        self.send(PeerCommand::AcceptOffer {
            session_id,
            round,
            sdp,
        })
        .await
    }

    pub async fn accept_answer(
        &self,
        session_id: SessionId,
        round: u32,
        sdp: String,
    ) -> Result<()> {
        self.send(PeerCommand::AcceptAnswer {
            session_id,
            round,
            sdp,
        })
        .await
    }

    pub async fn submit_candidate(
        &self,
        session_id: SessionId,
        round: u32,
        candidate: String,
    ) -> Result<()> {
        self.send(PeerCommand::SubmitCandidate {
            session_id,
            round,
            candidate,
        })
        .await
    }

    pub async fn deliver(&self, msg: ServerMessage) -> Result<()> {
        self.send(PeerCommand::Deliver(msg)).await
    }

    /// Resolves once every command sent before it has been handled.
    pub async fn snapshot(&self) -> Result<PeerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(PeerCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| anyhow!("Peer session dropped the snapshot"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(PeerCommand::Shutdown).await
    }
}
