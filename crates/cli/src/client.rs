// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC client over the daemon's Unix socket.
//!
//! Newline-delimited framing, one response per request, matched by id.

use anyhow::{anyhow, bail, Result};
use hq_daemon::RpcResponse;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Per-request timeout; long enough for `sendPrompt --wait`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DaemonClient {
    socket_path: PathBuf,
    next_id: AtomicU64,
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path, next_id: AtomicU64::new(1) }
    }

    /// Send one request and return its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|_| {
            anyhow!(
                "daemon not running (no socket at {}), try `hq daemon start`",
                self.socket_path.display()
            )
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut payload = serde_json::to_vec(&request)?;
        payload.push(b'\n');
        stream.write_all(&payload).await?;

        let (read_half, _) = stream.split();
        let mut lines = BufReader::new(read_half).lines();
        let line = tokio::time::timeout(REQUEST_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| anyhow!("daemon did not answer within {REQUEST_TIMEOUT:?}"))??
            .ok_or_else(|| anyhow!("daemon closed the connection"))?;

        let response: RpcResponse = serde_json::from_str(&line)?;
        if let Some(error) = response.error {
            bail!("{}", error.message);
        }
        response.result.ok_or_else(|| anyhow!("empty response"))
    }

    /// Whether the daemon answers on its socket.
    pub async fn is_up(&self) -> bool {
        self.call("daemon.health", Value::Null).await.is_ok()
    }
}
