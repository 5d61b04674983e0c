//! WebSocket connection lifecycle
//!
//! One reader and one writer task per peer. The reader dispatches text
//! frames to the protocol handler and binary frames to the pipeline; the
//! writer drains the peer's bounded outbound queue. Teardown stops the
//! slot's pipeline in the background, then detaches state and releases the
//! slot without waiting on it.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};

use crate::protocol::{ClientMessage, ServerMessage};

use super::hub::{Hub, PeerSink, SERVER_FULL_MSG};

/// WebSocket upgrade handler for `/ws`
pub async fn ws_handler(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade) -> Response {
    let limit = hub.config().max_frame_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Run one peer's connection from admission to teardown
async fn handle_socket(mut socket: WebSocket, hub: Arc<Hub>) {
    let (tx, rx) = mpsc::channel(hub.config().outbound_queue);
    let kill = Arc::new(Notify::new());

    let slot = match hub
        .attach(PeerSink {
            tx,
            kill: kill.clone(),
        })
        .await
    {
        Ok(slot) => slot,
        Err(_) => {
            tracing::warn!("connection refused: server full");
            if let Ok(text) = serde_json::to_string(&ServerMessage::Error {
                message: SERVER_FULL_MSG.into(),
            }) {
                let _ = socket.send(Message::Text(text.into())).await;
            }
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: Utf8Bytes::from_static("server full"),
                })))
                .await;
            return;
        }
    };

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(ws_tx, rx, kill.clone()));

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(msg) => hub.handle_message(slot, msg).await,
                    Err(e) => {
                        tracing::warn!(slot, error = %e, "dropping unrecognized frame");
                    }
                }
            }
            Ok(Message::Binary(chunk)) => {
                hub.pipelines().feed(slot, chunk).await;
            }
            Ok(Message::Close(_)) => break,
            // The transport layer answers ping/pong on its own.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(slot, error = %e, "socket error");
                break;
            }
        }
    }

    // Stop-and-upload runs in the background; slot release must not wait
    // on it. The completion event drives the stream_status broadcast.
    let pipelines = Arc::clone(hub.pipelines());
    tokio::spawn(async move {
        pipelines.stop(slot).await;
    });

    hub.detach(slot).await;
    kill.notify_waiters();
    let _ = writer.await;
}

/// Drain the outbound queue into the socket until the channel closes, the
/// peer stops accepting writes, or the kill switch fires.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    kill: Arc<Notify>,
) {
    loop {
        let frame = tokio::select! {
            _ = kill.notified() => None,
            maybe = rx.recv() => maybe,
        };
        let Some(frame) = frame else { break };

        let sent = tokio::select! {
            _ = kill.notified() => false,
            result = ws_tx.send(Message::Text(frame)) => result.is_ok(),
        };
        if !sent {
            break;
        }
    }

    let _ = ws_tx.close().await;
}
