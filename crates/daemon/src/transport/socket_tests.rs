// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_adapters::{FakeRuntime, RuntimeManager};
use hq_core::{Config, SystemClock};
use hq_storage::FileStore;
use serde_json::json;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;

use crate::event_bus::EventBus;
use crate::kanban::Kanban;
use crate::pipeline::PipelineEngine;
use crate::rpc::{RpcContext, RpcResponse};

fn test_router() -> Arc<Router> {
    let runtimes = Arc::new(RuntimeManager::with_adapters(
        vec![Arc::new(FakeRuntime::new("local"))],
        Some("local".to_string()),
    ));
    let store: Arc<dyn hq_storage::Store> = Arc::new(FileStore::in_memory());
    let bus = EventBus::new();
    let orchestrator = crate::orchestrator::spawn(
        Arc::clone(&store),
        Arc::clone(&runtimes),
        bus.clone(),
        SystemClock,
    );
    let kanban = Arc::new(Kanban::new(Arc::clone(&store), bus.clone(), SystemClock));
    let engine = Arc::new(PipelineEngine::new(
        Arc::clone(&store),
        bus.clone(),
        orchestrator.clone(),
        SystemClock,
    ));
    Arc::new(Router::new(Arc::new(RpcContext {
        config: Config::parse("").unwrap(),
        store,
        bus,
        runtimes,
        orchestrator,
        kanban,
        engine,
        started_at: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    })))
}

#[tokio::test]
async fn responses_come_back_in_request_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hqd.sock");
    let listener = bind(&path).unwrap();
    tokio::spawn(serve(listener, test_router()));

    let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    for n in 0..5 {
        let request = json!({
            "jsonrpc": "2.0",
            "id": n,
            "method": "daemon.stats",
        });
        write_half
            .write_all(format!("{request}\n").as_bytes())
            .await
            .unwrap();
    }

    for n in 0..5 {
        let line = lines.next_line().await.unwrap().unwrap();
        let response: RpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.id, json!(n));
        assert!(response.error.is_none());
    }
}

#[tokio::test]
async fn bad_json_yields_parse_error_response() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hqd.sock");
    let listener = bind(&path).unwrap();
    tokio::spawn(serve(listener, test_router()));

    let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half.write_all(b"{ not json }\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let response: RpcResponse = serde_json::from_str(&line).unwrap();
    assert_eq!(response.error.unwrap().code, crate::rpc::PARSE_ERROR);
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hqd.sock");
    std::fs::write(&path, b"stale").unwrap();
    let listener = bind(&path).unwrap();
    drop(listener);
    assert!(path.exists());
}
