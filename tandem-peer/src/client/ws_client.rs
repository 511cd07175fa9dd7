use crate::client::ChannelSink;
use crate::config::PeerConfig;
use crate::controller::{PeerEvent, PeerHandle, PeerSession};
use crate::negotiator::{NegotiatorFactory, TransportConfig};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::ServerMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A controller wired to a signaling server over a WebSocket.
pub struct PeerClient {
    pub handle: PeerHandle,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    socket_task: JoinHandle<()>,
}

impl PeerClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:3001/ws`) and start a controller.
    pub async fn connect(
        url: &str,
        config: PeerConfig,
        transport: TransportConfig,
        factory: Arc<dyn NegotiatorFactory>,
    ) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        info!("Connected to {}", url);

        let (sink, mut outbound) = ChannelSink::new();
        let (handle, events) = PeerSession::spawn(config, transport, factory, Arc::new(sink));
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let inbound_handle = handle.clone();
        let closing_handle = handle.clone();
        let socket_task = tokio::spawn(async move {
            let mut send_task = tokio::spawn(async move {
                while let Some(msg) = outbound.recv().await {
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to encode {:?}: {}", msg, e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::text(json)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let mut recv_task = tokio::spawn(async move {
                while let Some(Ok(msg)) = ws_receiver.next().await {
                    match msg {
                        Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                debug!("Server frame: {:?}", server_msg);
                                if inbound_handle.deliver(server_msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid ServerMessage: {}", e),
                        },
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            });

            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            };
            info!("Signaling connection closed");
            let _ = closing_handle.shutdown().await;
        });

        Ok(Self {
            handle,
            events,
            socket_task,
        })
    }

    /// Stop the controller and close the socket.
    ///
    /// The socket pumps finish once the stopped controller releases its sink.
    pub async fn close(mut self) {
        if let Err(e) = self.handle.shutdown().await {
            debug!("Controller already stopped: {:#}", e);
        }
        if timeout(CLOSE_TIMEOUT, &mut self.socket_task).await.is_err() {
            warn!("Socket did not close within {:?}", CLOSE_TIMEOUT);
            self.socket_task.abort();
        }
    }
}
