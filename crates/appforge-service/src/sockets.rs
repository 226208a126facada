//! Subscription fabric: a persistent WebSocket channel bridging the log bus
//! to clients. Clients join and leave per-workspace rooms; every joined
//! room's log events arrive as `terminal:log` messages. No durable
//! guarantees - reconnecting clients see only the bounded replay.

use crate::context::AppContext;
use crate::logbus::{LogEvent, LogSubscription};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientCommand {
    #[serde(rename = "join-app")]
    JoinApp {
        #[serde(rename = "appId")]
        app_id: i64,
    },
    #[serde(rename = "leave-app")]
    LeaveApp {
        #[serde(rename = "appId")]
        app_id: i64,
    },
}

pub async fn ws_handler(
    State(ctx): State<Arc<AppContext>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(ctx, socket))
}

async fn handle_connection(ctx: Arc<AppContext>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(100);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(Message::Text(message)).await.is_err() {
                break;
            }
        }
    });

    let mut rooms: HashMap<i64, JoinHandle<()>> = HashMap::new();
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(ClientCommand::JoinApp { app_id }) => {
                    if rooms.contains_key(&app_id) {
                        continue;
                    }
                    let subscription = ctx.bus.subscribe(app_id);
                    rooms.insert(app_id, spawn_forwarder(subscription, tx.clone()));
                }
                Ok(ClientCommand::LeaveApp { app_id }) => {
                    if let Some(task) = rooms.remove(&app_id) {
                        task.abort();
                        ctx.bus.gc(app_id);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "unparseable socket command");
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Disconnect removes every subscription this connection held.
    for (app_id, task) in rooms {
        task.abort();
        ctx.bus.gc(app_id);
    }
    send_task.abort();
}

/// Forward a room's replay burst and then its live events to the client.
fn spawn_forwarder(mut subscription: LogSubscription, tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for event in std::mem::take(&mut subscription.replay) {
            if tx.send(log_frame(&event)).await.is_err() {
                return;
            }
        }
        while let Some(event) = subscription.recv().await {
            if tx.send(log_frame(&event)).await.is_err() {
                return;
            }
        }
    })
}

fn log_frame(event: &LogEvent) -> String {
    json!({
        "type": "terminal:log",
        "appId": event.app_id,
        "message": event.message,
        "isError": event.is_error,
        "timestamp": event.timestamp,
    })
    .to_string()
}
