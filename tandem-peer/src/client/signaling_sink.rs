use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tandem_core::ClientMessage;
use tokio::sync::mpsc;

/// Where a controller writes the frames meant for the signaling server.
#[async_trait]
pub trait SignalingSink: Send + Sync {
    async fn send(&self, msg: ClientMessage) -> Result<()>;
}

/// Sink feeding an in-process channel, drained by a socket writer or a test.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SignalingSink for ChannelSink {
    async fn send(&self, msg: ClientMessage) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow!("Signaling connection closed"))
    }
}
