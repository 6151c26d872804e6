// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live ride notifications over WebSocket.
//!
//! A connection is subscribed to the caller's own topics for as long as the
//! socket stays open. Events published before the upgrade are not replayed.

use crate::middleware::auth::AuthUser;
use crate::models::{RideEvent, Role};
use crate::services::Topic;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use futures_util::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

/// Topics a user listens on.
///
/// Everyone hears about rides they requested. Drivers also get their own
/// room plus the open request feed.
pub fn topics_for(user: &AuthUser) -> Vec<Topic> {
    let mut topics = vec![Topic::Rider(user.user_id)];
    if user.role == Role::Driver {
        topics.push(Topic::for_party(user.user_id, Role::Driver));
        topics.push(Topic::AvailableDrivers);
    }
    topics
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    // Subscribe before the upgrade so nothing published after the 101 is missed
    let receivers: Vec<_> = topics_for(&user)
        .into_iter()
        .map(|topic| {
            let rx = state.notifier.subscribe(topic.clone());
            (topic, rx)
        })
        .collect();

    tracing::info!(user_id = user.user_id, role = %user.role, "WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, user, receivers))
}

async fn handle_socket(
    socket: WebSocket,
    user: AuthUser,
    receivers: Vec<(Topic, broadcast::Receiver<RideEvent>)>,
) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<RideEvent>(32);

    let forwarders: Vec<_> = receivers
        .into_iter()
        .map(|(topic, rx)| tokio::spawn(forward(topic, rx, tx.clone())))
        .collect();
    drop(tx);

    let mut send_task = tokio::spawn(pump(rx, sender));

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            // Clients only listen; anything but a close is ignored
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    for task in forwarders {
        task.abort();
    }

    tracing::info!(user_id = user.user_id, "WebSocket connection closed");
}

/// Write queued events to the socket as JSON text frames, in queue order.
async fn pump<S>(mut rx: mpsc::Receiver<RideEvent>, mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(event) = rx.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize ride event");
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Pump one topic into the connection's outbound queue.
async fn forward(
    topic: Topic,
    mut rx: broadcast::Receiver<RideEvent>,
    tx: mpsc::Sender<RideEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(%topic, skipped, "Subscriber lagging, skipped events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
