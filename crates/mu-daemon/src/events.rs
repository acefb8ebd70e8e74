//! WebSocket event stream
//!
//! `GET /events` upgrades to a socket that pushes one JSON payload per
//! committed graph event, in commit order. The payload shape is the
//! wire contract from the worker's `GraphEvent`.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::project::DaemonState;

pub async fn events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DaemonState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<DaemonState>) {
    info!("event subscriber connected");
    state.connections.fetch_add(1, Ordering::Relaxed);

    let project = state.default_project();
    let mut events = project.events.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Drain the client side for pings/close; content is ignored.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Close(_) => {
                    debug!("event subscriber sent close");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
                other => debug!(?other, "ignoring client message"),
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.connections.fetch_sub(1, Ordering::Relaxed);
    info!("event subscriber disconnected");
}
