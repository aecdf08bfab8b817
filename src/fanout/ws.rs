//! Realtime WebSocket endpoint: `GET /ws/{device_id}`.
//!
//! Each connection registers one observer with the hub. Queued envelopes are
//! written as text frames; a client text frame `ping` is answered with
//! `pong`. The observer is disconnected when the socket closes or errors, or
//! the connection ends on its own when the hub evicts it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::fanout::FanoutHub;

pub fn router(hub: Arc<FanoutHub>) -> Router {
    Router::new()
        .route("/ws/{device_id}", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(hub)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    State(hub): State<Arc<FanoutHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, device_id, hub))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn handle_socket(socket: WebSocket, device_id: String, hub: Arc<FanoutHub>) {
    let (sink, stream) = socket.split();
    serve_observer(&hub, &device_id, sink, stream).await;
}

/// Register one observer for `device_id` and relay frames until either side
/// ends, then remove it from the hub.
async fn serve_observer<S, R, E>(hub: &FanoutHub, device_id: &str, sink: S, stream: R)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    let (handle, outbound) = hub.new_handle();
    let handle_id = handle.id();
    hub.connect(handle, device_id);

    relay(sink, stream, outbound).await;

    hub.disconnect(handle_id, device_id);
    debug!(
        device_id = %device_id,
        observer = %handle_id,
        remaining = hub.observer_count(device_id),
        "Realtime connection closed"
    );
}

async fn relay<S, R, E>(mut sink: S, mut stream: R, mut outbound: mpsc::Receiver<String>)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Evicted by the hub
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if text.as_str() == "ping" && sink.send(Message::Text("pong".into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
