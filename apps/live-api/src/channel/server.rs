//! WebSocket upgrade handler and per-connection event loop.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use lectern_common::id::{prefix, prefixed_ulid};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::AppState;

use super::events::{
    ClientFrame, CommentPayload, JoinPayload, LeavePayload, ServerFrame, JOIN, LEAVE,
    SEND_COMMENT,
};
use super::fanout::Scope;

type WsSink = SplitSink<WebSocket, Message>;

pub fn router() -> Router<AppState> {
    Router::new().route("/live/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Per-connection state.
struct Connection {
    id: String,
    /// Rooms this connection has joined; used to filter room-scoped events.
    rooms: HashSet<String>,
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut broadcast_rx = state.broadcast.subscribe();
    let mut conn = Connection {
        id: prefixed_ulid(prefix::CONNECTION),
        rooms: HashSet::new(),
    };

    tracing::debug!(connection_id = %conn.id, "presence connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&state, &mut conn, text.as_str()) {
                            if send_frame(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %conn.id, "ws read error");
                        break;
                    }
                    Some(Ok(_)) => continue,
                }
            }

            result = broadcast_rx.recv() => {
                match result {
                    Ok(event) => {
                        if !event.scope.includes(&conn.rooms) {
                            continue;
                        }
                        if send_frame(&mut ws_tx, &event.frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %conn.id,
                            skipped = n,
                            "presence connection lagged behind broadcast"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Disconnect: only members of the rooms this connection was in hear about it.
    state.presence.remove_member(&conn.id, |room_id, count| {
        let frame = ServerFrame::viewer_count(room_id, count);
        state.broadcast.dispatch(Scope::Room(room_id.to_string()), frame);
    });

    tracing::debug!(connection_id = %conn.id, "presence connection closed");
}

/// Apply one client frame. Returns a frame to send back to this connection
/// only, used for errors.
fn handle_frame(state: &AppState, conn: &mut Connection, text: &str) -> Option<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => return Some(ServerFrame::error("invalid JSON frame")),
    };

    match frame.event.as_str() {
        JOIN => {
            let payload: JoinPayload = match payload(frame.data) {
                Ok(p) => p,
                Err(reply) => return Some(reply),
            };
            join(state, conn, payload);
            None
        }
        LEAVE => {
            let payload: LeavePayload = match payload(frame.data) {
                Ok(p) => p,
                Err(reply) => return Some(reply),
            };
            conn.rooms.remove(&payload.room_id);
            state.presence.leave(&payload.room_id, &conn.id, |count| {
                let frame = ServerFrame::viewer_count(&payload.room_id, count);
                state.broadcast.dispatch(Scope::Room(payload.room_id.clone()), frame);
            });
            None
        }
        SEND_COMMENT => {
            let comment: CommentPayload = match payload(frame.data.clone()) {
                Ok(p) => p,
                Err(reply) => return Some(reply),
            };
            if comment.comment.is_null() {
                return Some(ServerFrame::error("comment is required"));
            }
            tracing::debug!(connection_id = %conn.id, room_id = %comment.room_id, "comment relayed");
            state
                .broadcast
                .dispatch(Scope::All, ServerFrame::comment(frame.data));
            None
        }
        other => Some(ServerFrame::error(format!("unknown event: {other}"))),
    }
}

fn join(state: &AppState, conn: &mut Connection, payload: JoinPayload) {
    // Join announces the new count to every client, not just the room.
    let added = state.presence.join(&payload.room_id, &conn.id, |count| {
        tracing::debug!(
            connection_id = %conn.id,
            room_id = %payload.room_id,
            count,
            "viewer joined room"
        );
        state
            .broadcast
            .dispatch(Scope::All, ServerFrame::viewer_count(&payload.room_id, count));
    });
    conn.rooms.insert(payload.room_id.clone());

    if added {
        record_attendee(state, payload);
    }
}

/// Best-effort attendee row for the session owning the room.
fn record_attendee(state: &AppState, payload: JoinPayload) {
    let store = state.schedule.store().clone();
    tokio::spawn(async move {
        match store
            .record_attendee(&payload.room_id, &payload.viewer_name)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(room_id = %payload.room_id, "join for room without a session");
            }
            Err(err) => {
                tracing::warn!(
                    room_id = %payload.room_id,
                    error = %err,
                    "failed to record attendee"
                );
            }
        }
    });
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, ServerFrame> {
    serde_json::from_value(data).map_err(|e| ServerFrame::error(format!("invalid payload: {e}")))
}

async fn send_frame(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}
