//! WebSocket announcement stream

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::ws::protocol::Announcement;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let observer_id = Uuid::new_v4();
    debug!(observer_id = %observer_id, "WebSocket upgrade for observer");
    ws.on_upgrade(move |socket| handle_socket(socket, observer_id, state))
}

/// Forward director announcements until either side goes away
async fn handle_socket(socket: WebSocket, observer_id: Uuid, state: AppState) {
    info!(observer_id = %observer_id, "Observer connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut announcements = state.director.subscribe();

    // Writer task: broadcast announcements -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match announcements.recv().await {
                Ok(announcement) => {
                    if let Err(e) = send_msg(&mut ws_sink, &announcement).await {
                        debug!(observer_id = %observer_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(observer_id = %observer_id, lagged_count = n, "Observer lagged, skipping announcements");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(observer_id = %observer_id, "Announcement channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: only watches for the client going away
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Close(_)) => {
                info!(observer_id = %observer_id, "Observer initiated close");
                break;
            }
            Ok(Message::Text(_)) | Ok(Message::Binary(_)) => {
                debug!(observer_id = %observer_id, "Ignoring message on read-only stream");
            }
            Ok(_) => {}
            Err(e) => {
                error!(observer_id = %observer_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
    info!(observer_id = %observer_id, "Observer disconnected");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &Announcement,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
