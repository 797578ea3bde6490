// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport server: the inbound channels of the daemon.
//!
//! Three independently-enabled listeners — Unix socket (newline-delimited
//! JSON-RPC, in-order responses per connection), HTTP (`/rpc`, `/health`,
//! `/events` SSE), and WebSocket (one request per frame, responses by id,
//! auto-subscribed to events) — all dispatching into the same router.

mod http;
mod socket;

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::rpc::Router;
use hq_core::Config;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind and spawn every enabled transport. Returns the listener tasks so
/// the worker can abort them on shutdown.
pub async fn start(
    config: &Config,
    router: Arc<Router>,
) -> Result<Vec<JoinHandle<()>>, TransportError> {
    let mut handles = Vec::new();

    if config.server.enable_unix_socket {
        let path = config.socket_path();
        let listener = socket::bind(&path).map_err(|source| TransportError::Bind {
            endpoint: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "unix socket transport listening");
        handles.push(tokio::spawn(socket::serve(listener, Arc::clone(&router))));
    }

    if config.server.enable_http {
        let addr = format!("{}:{}", config.server.http_host, config.server.http_port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|source| {
            TransportError::Bind { endpoint: addr.clone(), source }
        })?;
        info!(addr = %addr, "http transport listening");
        handles.push(tokio::spawn(http::serve_http(listener, Arc::clone(&router))));
    }

    if config.server.enable_web_socket {
        let addr = format!("{}:{}", config.server.http_host, config.server.ws_port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|source| {
            TransportError::Bind { endpoint: addr.clone(), source }
        })?;
        info!(addr = %addr, "websocket transport listening");
        handles.push(tokio::spawn(http::serve_ws(listener, Arc::clone(&router))));
    }

    Ok(handles)
}
