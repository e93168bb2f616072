//! WebSocket handler bridging viewers to their room
//!
//! Each accepted socket gets a bounded frame channel that the room actor
//! broadcasts into. The socket task only shuttles bytes: room state never
//! lives here, and a slow client stalls nothing but its own channel.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::ApiState;
use crate::room::{ClientMessage, ErrorData, RoomHandle, ServerMessage};

/// WebSocket upgrade handler
///
/// GET /ws/:code
///
/// The room is resolved before the upgrade so an unknown or expired code
/// fails as a plain HTTP 404 instead of a doomed socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let room = state.registry.room(&code)?;
    let buffer = state.config.rooms.connection_buffer;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, room, buffer)))
}

/// Drive one viewer's connection until either side hangs up
async fn handle_socket(socket: WebSocket, room: RoomHandle, buffer: usize) {
    let id = Uuid::new_v4();
    let (frames_tx, mut frames_rx) = mpsc::channel::<Arc<String>>(buffer);

    // Local replies (parse errors, rejected commands) go through the same
    // channel as room broadcasts, so the viewer sees one ordered stream
    let reply_tx = frames_tx.clone();

    if room.attach(id, frames_tx).await.is_err() {
        tracing::debug!(viewer = %id, room = %room.code(), "Room closed before attach");
        return;
    }
    tracing::debug!(viewer = %id, room = %room.code(), "Viewer attached");

    let (mut sender, mut receiver) = socket.split();

    // Outbound: forward room frames; a closed channel means the room
    // dropped this viewer (expiry, shutdown, or backpressure)
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if sender.send(Message::Text(frame.as_str().to_owned())).await.is_err() {
                return;
            }
        }
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "room closed".into(),
            })))
            .await;
    });

    // Inbound: decode client commands and submit them to the room
    let recv_room = room.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_message(&recv_room, id, &reply_tx, &text).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    room.detach(id).await;
    tracing::debug!(viewer = %id, room = %room.code(), "Viewer detached");
}

async fn handle_client_message(
    room: &RoomHandle,
    id: Uuid,
    reply_tx: &mpsc::Sender<Arc<String>>,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            deliver_error(reply_tx, "validation_failed", format!("Unrecognized message: {}", e))
                .await;
            return;
        }
    };

    match message {
        ClientMessage::RequestSync => room.request_sync(id).await,
        ClientMessage::AddWallet(data) => {
            if let Err(e) = room.add_wallet(data.address, data.label).await {
                deliver_error(reply_tx, e.reason(), e.to_string()).await;
            }
        }
        ClientMessage::RemoveWallet(data) => {
            if let Err(e) = room.remove_wallet(data.address).await {
                deliver_error(reply_tx, e.reason(), e.to_string()).await;
            }
        }
    }
}

/// Push an error frame to this viewer only
async fn deliver_error(reply_tx: &mpsc::Sender<Arc<String>>, code: &str, message: String) {
    let frame = ServerMessage::Error(ErrorData {
        code: code.to_string(),
        message,
    });
    match serde_json::to_string(&frame) {
        Ok(json) => {
            let _ = reply_tx.send(Arc::new(json)).await;
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize error frame"),
    }
}
