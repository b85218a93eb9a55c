//! Realtime Event Stream
//!
//! WebSocket endpoint that forwards every published [`ChangeEvent`] to the
//! connected device as a JSON text frame. Delivery is at-most-once with no
//! replay: a device that reconnects runs its bootstrap pull to catch up.

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use std::net::SocketAddr;
use tokio::sync::broadcast::error::RecvError;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/events", get(upgrade))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(mut socket: WebSocket, addr: SocketAddr, state: ServerState) {
    let client_id = shared::util::new_id();
    state.notifier.register(&client_id, Some(addr));

    let mut events = state.notifier.subscribe();
    let shutdown = state.notifier.shutdown_token().clone();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let frame = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(%client_id, "failed to encode event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Device fell behind the broadcast buffer; it will
                        // heal via bootstrap, keep streaming from here.
                        tracing::warn!(%client_id, missed, "event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    // Clients only send pings/closes; payload frames are ignored
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            _ = shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.notifier.deregister(&client_id);
}
