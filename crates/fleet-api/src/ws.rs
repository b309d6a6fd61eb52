//! Worker channel over WebSocket.
//!
//! One text frame carries one JSON message. Replies (`registered`,
//! `error`) and operator commands travel back on the same socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use serde::Serialize;
use tracing::{debug, info, warn};

use fleet_coordinator::{Coordinator, Reply};

use crate::ApiState;

/// GET /ws
pub async fn worker_socket(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let coordinator = state.coordinator.clone();
    ws.on_upgrade(move |socket| run_worker_socket(socket, coordinator, Some(addr.to_string())))
}

/// Drive one worker channel until either side closes it.
pub async fn run_worker_socket(mut socket: WebSocket, coordinator: Arc<Coordinator>, source: Option<String>) {
    let mut session = coordinator.open_session(source);
    debug!(session = session.id(), source = ?session.source(), "worker channel opened");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match coordinator.handle_text(&mut session, text.as_str()) {
                            Ok(reply) => reply,
                            Err(e) => {
                                warn!(session = session.id(), error = %e, "worker message rejected");
                                Some(Reply::Error { message: e.to_string() })
                            }
                        };
                        if let Some(reply) = reply
                            && !send_json(&mut socket, &reply).await
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(session = session.id(), error = %e, "worker channel error");
                        break;
                    }
                    _ => {}
                }
            }
            cmd = session.next_command() => {
                match cmd {
                    Some(command) => {
                        if !send_json(&mut socket, &command).await {
                            break;
                        }
                    }
                    None => {
                        info!(session = session.id(), worker_id = ?session.worker_id(), "channel superseded");
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    coordinator.close_session(session);
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode outbound message");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}
