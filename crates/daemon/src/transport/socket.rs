// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket transport: newline-delimited JSON-RPC, one response per
//! request, written back in arrival order on the same connection.

use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::rpc::Router;

/// Bind the socket, clearing a stale file from a previous run.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(path)
}

/// Accept loop: one task per connection.
pub async fn serve(listener: UnixListener, router: Arc<Router>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, router).await {
                        debug!(error = %e, "socket connection closed");
                    }
                });
            }
            Err(e) => error!(error = %e, "unix accept failed"),
        }
    }
}

/// Requests on one connection are handled sequentially, so responses go
/// out in arrival order.
async fn handle_connection(stream: UnixStream, router: Arc<Router>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = router.dispatch_text(&line).await;
        let mut payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "response serialisation failed");
                continue;
            }
        };
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
        write_half.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
