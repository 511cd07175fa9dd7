use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tandem_core::{ClientMessage, ServerMessage};
use tandem_server::{ServerConfig, SignalingService, serve_listener, start_signaling};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a full server on an ephemeral local port.
pub async fn spawn_test_server() -> Result<(SocketAddr, SignalingService)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let service = start_signaling(&ServerConfig::default());

    tokio::spawn(serve_listener(listener, service.clone()));
    Ok((addr, service))
}

/// `GET /health` over a plain HTTP/1.1 connection, returning the JSON body.
pub async fn get_health(addr: SocketAddr) -> Result<serde_json::Value> {
    let mut stream = TcpStream::connect(addr).await?;
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;

    let mut response = String::new();
    tokio::time::timeout(FRAME_TIMEOUT, stream.read_to_string(&mut response))
        .await
        .context("health response timed out")??;

    if !response.starts_with("HTTP/1.1 200") {
        bail!("unexpected response: {}", response);
    }
    let (_, body) = response
        .split_once("\r\n\r\n")
        .context("response without body")?;
    Ok(serde_json::from_str(body)?)
}

/// A raw WebSocket connection speaking the wire protocol directly.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (stream, _) = connect_async(format!("ws://{}/ws", addr)).await?;
        Ok(Self { stream })
    }

    /// Connect and consume the `welcome` and `ice_config` frames.
    pub async fn connect_ready(addr: SocketAddr) -> Result<Self> {
        let mut client = Self::connect(addr).await?;
        client.recv().await?;
        client.recv().await?;
        Ok(client)
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        self.send_text(&serde_json::to_string(msg)?).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            let frame = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .context("no frame in time")?
                .context("socket closed")??;
            if let Message::Text(text) = frame {
                return Ok(serde_json::from_str(&text)?);
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
