use crate::lobby::LobbyCommand;
use crate::signaling::SignalingService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tandem_core::{ClientMessage, ConnectionId, ErrorKind, ServerMessage};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let connection_id = ConnectionId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, service))
}

async fn handle_socket(socket: WebSocket, connection_id: ConnectionId, service: SignalingService) {
    info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_connection(connection_id, tx);
    service.send_message(connection_id, &ServerMessage::Welcome { connection_id });
    service.send_message(
        connection_id,
        &ServerMessage::IceConfig {
            ice_servers: service.ice_servers(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            let cmd = LobbyCommand::from_client(connection_id, client_msg);
                            if let Err(e) = service.dispatch(cmd).await {
                                error!("Lobby unavailable: {:#}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Invalid ClientMessage from {}: {}", connection_id, e);
                            service.send_message(
                                connection_id,
                                &ServerMessage::Error {
                                    kind: ErrorKind::MalformedMessage,
                                    message: e.to_string(),
                                },
                            );
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_connection(&connection_id);
    if let Err(e) = service
        .dispatch(LobbyCommand::Disconnect { connection_id })
        .await
    {
        warn!("Could not report disconnect of {}: {:#}", connection_id, e);
    }
    info!("WebSocket disconnected: {}", connection_id);
}
