// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and WebSocket transports.
//!
//! HTTP: `POST /rpc` (one JSON-RPC request per body), `GET /health`, and
//! `GET /events` (server-sent events fed from the event bus). WebSocket:
//! every text frame is one request; responses may interleave out of order
//! but carry their `id`, and every connection is auto-subscribed to all
//! bus events. CORS is permissive on both.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use futures_util::stream::{SplitSink, Stream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, warn};

use crate::rpc::{Router, RpcRequest};
use hq_core::WireEvent;

/// Build the HTTP app (`/rpc`, `/health`, `/events`).
pub fn http_app(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/health", get(handle_health))
        .route("/events", get(handle_events))
        .layer(CorsLayer::permissive())
        .with_state(router)
}

/// Build the WebSocket app (single upgrade route).
pub fn ws_app(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .route("/", get(handle_ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(router)
}

pub async fn serve_http(listener: TcpListener, router: Arc<Router>) {
    if let Err(e) = axum::serve(listener, http_app(router)).await {
        error!(error = %e, "http server stopped");
    }
}

pub async fn serve_ws(listener: TcpListener, router: Arc<Router>) {
    if let Err(e) = axum::serve(listener, ws_app(router)).await {
        error!(error = %e, "websocket server stopped");
    }
}

async fn handle_rpc(State(router): State<Arc<Router>>, body: String) -> impl IntoResponse {
    Json(router.dispatch_text(&body).await)
}

async fn handle_health(State(router): State<Arc<Router>>) -> impl IntoResponse {
    // Same report as daemon.health, addressed directly
    let request = RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(Value::Null),
        method: Some("daemon.health".to_string()),
        params: None,
    };
    let response = router.dispatch(request).await;
    match response.result {
        Some(result) => Json(result),
        None => Json(json!({ "status": "error" })),
    }
}

/// Server-sent events: one `event:`/`data:` pair per bus event. A lagging
/// client silently loses the oldest events, never sees reordering.
async fn handle_events(State(router): State<Arc<Router>>) -> impl IntoResponse {
    let rx = router.context().bus.watch();
    Sse::new(event_stream(rx))
}

fn event_stream(
    rx: broadcast::Receiver<WireEvent>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = SseEvent::default().event(event.name.clone());
                    match sse.json_data(&event) {
                        Ok(sse) => return Some((Ok(sse), rx)),
                        Err(e) => {
                            warn!(error = %e, "event serialisation failed");
                            continue;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "sse subscriber lagged, dropping oldest");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

async fn handle_ws_upgrade(
    State(router): State<Arc<Router>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_ws(socket, router))
}

/// One WebSocket connection: requests dispatch concurrently (responses
/// carry their ids), and all bus events are pushed as frames.
async fn handle_ws(socket: WebSocket, router: Arc<Router>) {
    let (sink, mut stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(write_frames(sink, out_rx));

    // Auto-subscribe: forward bus events to this connection
    let event_tx = out_tx.clone();
    let mut events = router.context().bus.watch();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(frame) = serde_json::to_string(&event) else { continue };
                    if event_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "websocket subscriber lagged, dropping oldest");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                break;
            }
        };
        let Message::Text(text) = message else {
            continue;
        };
        let router = Arc::clone(&router);
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let response = router.dispatch_text(&text).await;
            if let Ok(frame) = serde_json::to_string(&response) {
                let _ = out_tx.send(frame).await;
            }
        });
    }

    forwarder.abort();
    writer.abort();
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(frame) = rx.recv().await {
        if sink.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
}
