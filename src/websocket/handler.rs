use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        OriginalUri, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::connection_manager::ConnectionHandle;
use crate::error::CloseReason;
use crate::identity::{decode_token, UserIdentity};
use crate::server::AppState;

use super::message::{ChatEvent, OutboundFrame};

/// How long a rejected peer gets to acknowledge our close frame
const REJECT_LINGER: Duration = Duration::from_secs(1);

/// Lifecycle of one chat connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closed,
}

impl ConnectionState {
    /// Move to `next` if the transition is allowed. `Closed` is terminal.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        let allowed = matches!(
            (*self, next),
            (Self::Connecting, Self::Active)
                | (Self::Connecting, Self::Closed)
                | (Self::Active, Self::Closed)
        );
        if allowed {
            tracing::debug!(from = ?*self, to = ?next, "Connection state transition");
            *self = next;
        }
        allowed
    }
}

/// Upgrade handler for every path on the listener.
///
/// The upgrade is always accepted; path and identity are checked on the
/// live socket so that a rejected peer still sees a close code and reason.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, uri, headers),
    fields(path = %uri.path())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let token = state.token_source.extract(&headers);
    let path = uri.path().to_string();

    tracing::debug!(has_token = token.is_some(), "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, path, token))
}

/// Decide whether an upgraded socket may join the room
pub fn admit(path: &str, token: Option<&str>, chat_path: &str) -> Result<UserIdentity, CloseReason> {
    if path != chat_path {
        return Err(CloseReason::INVALID_URL);
    }
    token.and_then(decode_token).ok_or(CloseReason::INVALID_USER)
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state, token))]
async fn handle_socket(socket: WebSocket, state: AppState, path: String, token: Option<String>) {
    let mut conn_state = ConnectionState::Connecting;

    let identity = match admit(&path, token.as_deref(), &state.settings.chat.path) {
        Ok(identity) => identity,
        Err(reason) => {
            conn_state.advance(ConnectionState::Closed);
            reject(socket, &state, reason).await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel::<OutboundFrame>(state.settings.chat.send_buffer.max(1));
    let handle = Arc::new(ConnectionHandle::new(identity, tx));
    let connection_id = handle.id;
    let connection_start = std::time::Instant::now();

    let (ws_sender, ws_receiver) = socket.split();

    // The writer starts first so the join and roster frames have somewhere to go
    let write_timeout = Duration::from_millis(state.settings.chat.write_timeout_ms);
    let mut send_task = tokio::spawn(write_loop(ws_sender, rx, write_timeout, connection_id));

    if let Err(e) = state.registry.register(handle.clone()) {
        tracing::error!(connection_id = %connection_id, error = %e, "Connection rejected");
        send_task.abort();
        return;
    }
    conn_state.advance(ConnectionState::Active);
    state.hooks.on_connect(&handle.identity);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %handle.identity.id,
        user_name = %handle.identity.name,
        "Chat connection established"
    );

    if let Err(e) = state.hub.broadcast(ChatEvent::join(handle.identity.clone())).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Failed to broadcast join");
    }
    if let Err(e) = state.hub.send_roster(&handle).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Failed to send roster");
    }

    let mut recv_task = tokio::spawn(read_loop(ws_receiver, state.clone(), handle.clone()));

    // Whichever side finishes first ends the connection
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    conn_state.advance(ConnectionState::Closed);
    teardown(&state, &handle).await;

    tracing::info!(
        connection_id = %connection_id,
        user_id = %handle.identity.id,
        duration_secs = connection_start.elapsed().as_secs_f64(),
        "Chat connection closed"
    );
}

/// Close a socket that failed admission, without registering it
async fn reject(mut socket: WebSocket, state: &AppState, reason: CloseReason) {
    tracing::warn!(code = reason.code, reason = reason.reason, "Closing WebSocket connection");

    let label = match reason {
        CloseReason::INVALID_URL => "invalid_url",
        CloseReason::INVALID_USER => "invalid_user",
        _ => "other",
    };
    state.metrics.record_rejected(label);

    let frame = CloseFrame {
        code: reason.code,
        reason: reason.reason.into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "Failed to send close frame");
        return;
    }

    // Give the peer a moment to answer the close handshake
    let _ = timeout(REJECT_LINGER, async {
        while let Some(Ok(msg)) = socket.recv().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
}

/// Deregister the connection and tell the room it left.
///
/// Only the call that actually removes the entry broadcasts `left`.
async fn teardown(state: &AppState, handle: &ConnectionHandle) {
    if state.registry.deregister(handle.id).is_none() {
        return;
    }
    state.hooks.on_close(&handle.identity);

    if let Err(e) = state.hub.broadcast(ChatEvent::left(handle.identity.clone())).await {
        tracing::error!(connection_id = %handle.id, error = %e, "Failed to broadcast left");
    }
}

/// Drain the outbound queue onto the socket
async fn write_loop(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundFrame>,
    write_timeout: Duration,
    connection_id: uuid::Uuid,
) {
    while let Some(frame) = rx.recv().await {
        let (msg, closing) = match frame {
            OutboundFrame::Text(frame) => (Message::Text(frame.text.to_string().into()), false),
            OutboundFrame::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
                true,
            ),
        };

        match timeout(write_timeout, ws_sender.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket send error");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "WebSocket send timed out"
                );
                break;
            }
        }

        if closing {
            break;
        }
    }
}

/// Forward inbound text to the room until the peer goes away
async fn read_loop(
    mut ws_receiver: SplitStream<WebSocket>,
    state: AppState,
    handle: Arc<ConnectionHandle>,
) {
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => process_text(text.as_str(), &state, &handle).await,
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %handle.id, "Ignoring binary frame");
            }
            // Axum answers pings itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::debug!(
                    connection_id = %handle.id,
                    code = ?frame.as_ref().map(|f| f.code),
                    "Received close frame"
                );
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %handle.id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}

/// Broadcast a chat line; blank lines are dropped silently
#[tracing::instrument(
    name = "ws.message",
    skip(text, state, handle),
    fields(connection_id = %handle.id, user_id = %handle.identity.id)
)]
async fn process_text(text: &str, state: &AppState, handle: &ConnectionHandle) {
    let Some(event) = ChatEvent::chat(handle.identity.clone(), text) else {
        return;
    };

    state.hooks.on_message(&handle.identity, text.trim());

    if let Err(e) = state.hub.broadcast(event).await {
        tracing::error!(error = %e, "Failed to broadcast chat message");
    }
}
