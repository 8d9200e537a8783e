//! Real-time notification endpoint
//!
//! Long-lived WebSocket per dashboard; the hub pushes one frame per
//! ingest commit. The socket half only ever receives pings/closes from
//! the client; any send failure or client close tears the subscription
//! down immediately.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use std::sync::Arc;

use crate::api::ApiState;
use crate::hub::Hub;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| pump(socket, hub))
}

async fn pump(mut socket: WebSocket, hub: Arc<Hub>) {
    let mut subscription = hub.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                    // pings are answered by axum; other frames are ignored
                    Some(Ok(_)) => {}
                }
            }
            notification = subscription.recv() => {
                match notification {
                    Some(payload) => {
                        if socket.send(Message::Text(payload.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    // subscription drop removes this client from the hub
}
