//! Per-connection handler: one task per accepted WebSocket.
//!
//! The connection IS the player's identity — there is no handshake or
//! auth step. The handler registers an outbound channel with the lobby,
//! then multiplexes two directions in one loop: inbound frames are
//! decoded into [`ClientEvent`]s and dispatched, outbound
//! [`ServerEvent`]s from the lobby and match actors are encoded and
//! written to the socket.
//!
//! Teardown always goes through the lobby's disconnect transition, never
//! through transport side effects alone: a drop guard fires it even if
//! the handler task panics.

use std::sync::Arc;

use knockout_protocol::{ClientEvent, Codec, ConnectionId, JsonCodec, ServerEvent};
use knockout_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::KnockoutError;
use crate::server::ServerState;

/// Drop guard that runs the lobby disconnect transition when the handler
/// exits. `Drop` is synchronous, so the async work is spawned
/// fire-and-forget.
struct DisconnectGuard {
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.lobby.lock().await.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), KnockoutError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    state.lobby.lock().await.register(conn_id, event_tx);
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                // lobby dropped our sender — we are being torn down
                let Some(event) = event else { break };
                let text = encode_event(&state.codec, &event)?;
                if let Err(e) = conn.send(&text).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                    break;
                }
            }
            frame = conn.recv() => {
                match frame {
                    Ok(Some(text)) => {
                        match state.codec.decode::<ClientEvent>(text.as_bytes()) {
                            Ok(event) => {
                                dispatch(&conn, &state, conn_id, event).await?;
                            }
                            Err(e) => {
                                tracing::debug!(
                                    %conn_id, error = %e,
                                    "malformed client event, skipping"
                                );
                                send_error(&conn, &state.codec, 400, "malformed event")
                                    .await?;
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                }
            }
        }
    }

    // _guard drops here → lobby disconnect fires.
    Ok(())
}

/// Routes one decoded client event into the lobby.
///
/// The lobby lock covers only the routing decision; match state lives in
/// its actor, reached through the handle's channel.
async fn dispatch(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    event: ClientEvent,
) -> Result<(), KnockoutError> {
    match event {
        ClientEvent::JoinQueue => {
            state.lobby.lock().await.join_queue(conn_id).await;
        }

        ClientEvent::LeaveQueue => {
            state.lobby.lock().await.leave_queue(conn_id);
        }

        ClientEvent::JoinMatch {
            match_id,
            display_name,
        } => {
            let result = state
                .lobby
                .lock()
                .await
                .join_match(conn_id, match_id, display_name)
                .await;
            match result {
                Ok(snapshot) => {
                    let ack = ServerEvent::JoinResult {
                        success: true,
                        message: None,
                        snapshot: Some(snapshot.clone()),
                    };
                    send_event(conn, &state.codec, &ack).await?;
                    // Full match detail follows the ack, same as the
                    // broadcast the rest of the match will get on the
                    // next flush.
                    let info = ServerEvent::MatchInfo { snapshot };
                    send_event(conn, &state.codec, &info).await?;
                }
                Err(e) => {
                    tracing::debug!(
                        %conn_id, %match_id, error = %e, "join refused"
                    );
                    let reply = ServerEvent::JoinResult {
                        success: false,
                        message: Some(e.client_message()),
                        snapshot: None,
                    };
                    send_event(conn, &state.codec, &reply).await?;
                }
            }
        }

        ClientEvent::LeaveMatch => {
            state.lobby.lock().await.leave_match(conn_id).await;
        }

        ClientEvent::SelfEliminate => {
            state.lobby.lock().await.self_eliminate(conn_id).await;
        }

        ClientEvent::MatchUpdate {
            match_id,
            points,
            field,
        } => {
            let result = state
                .lobby
                .lock()
                .await
                .report_update(conn_id, match_id, points, field)
                .await;
            if let Err(e) = result {
                tracing::debug!(
                    %conn_id, %match_id, error = %e, "update dropped"
                );
                send_error(conn, &state.codec, 404, &e.client_message())
                    .await?;
            }
        }
    }
    Ok(())
}

/// Encodes a server event as a JSON text frame.
fn encode_event(
    codec: &JsonCodec,
    event: &ServerEvent,
) -> Result<String, KnockoutError> {
    let bytes = codec.encode(event)?;
    String::from_utf8(bytes).map_err(|e| {
        KnockoutError::Protocol(
            knockout_protocol::ProtocolError::InvalidMessage(format!(
                "encoded event is not UTF-8: {e}"
            )),
        )
    })
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    event: &ServerEvent,
) -> Result<(), KnockoutError> {
    let text = encode_event(codec, event)?;
    conn.send(&text).await.map_err(KnockoutError::Transport)
}

/// Sends a `ServerEvent::Error` frame to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    code: u16,
    message: &str,
) -> Result<(), KnockoutError> {
    send_event(
        conn,
        codec,
        &ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    )
    .await
}
