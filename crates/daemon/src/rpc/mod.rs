// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 router.
//!
//! Methods live in a static table keyed by `namespace.method`. Each handler
//! is an async function over `(params, context)`; parameter records are
//! per-method serde structs validated once, here at the boundary. Handlers
//! are the only place errors become wire errors.

mod context;
mod methods;

pub use context::RpcContext;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

// JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32000;

/// A parsed JSON-RPC request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Wire error object.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// Internal / domain errors: the message, never a backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl From<crate::orchestrator::OrchError> for RpcError {
    fn from(e: crate::orchestrator::OrchError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<crate::kanban::KanbanError> for RpcError {
    fn from(e: crate::kanban::KanbanError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<crate::pipeline::EngineError> for RpcError {
    fn from(e: crate::pipeline::EngineError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<hq_storage::StoreError> for RpcError {
    fn from(e: hq_storage::StoreError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<hq_adapters::AdapterError> for RpcError {
    fn from(e: hq_adapters::AdapterError) -> Self {
        Self::internal(e.to_string())
    }
}

/// A response, success or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }

    /// Response for a body that did not parse as JSON at the transport.
    pub fn parse_error() -> Self {
        Self::failure(Value::Null, RpcError::new(PARSE_ERROR, "parse error"))
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send>>;
type Handler = Arc<dyn Fn(Value, Arc<RpcContext>) -> HandlerFuture + Send + Sync>;

/// Table of method handlers, filled by the per-namespace modules.
#[derive(Default)]
pub struct MethodTable {
    handlers: HashMap<&'static str, Handler>,
}

impl MethodTable {
    /// Register an async handler function under a method name.
    pub fn register<F, Fut>(&mut self, name: &'static str, f: F)
    where
        F: Fn(Value, Arc<RpcContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        self.handlers.insert(name, Arc::new(move |params, ctx| Box::pin(f(params, ctx))));
    }
}

/// Dispatches parsed requests to handlers.
pub struct Router {
    table: MethodTable,
    ctx: Arc<RpcContext>,
}

impl Router {
    /// Build the router with every namespace registered.
    pub fn new(ctx: Arc<RpcContext>) -> Self {
        let mut table = MethodTable::default();
        methods::register_all(&mut table);
        Self { table, ctx }
    }

    pub fn context(&self) -> Arc<RpcContext> {
        Arc::clone(&self.ctx)
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validate and dispatch one request.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc.as_deref() != Some("2.0") {
            return RpcResponse::failure(
                id,
                RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            );
        }
        let method = match request.method.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => {
                return RpcResponse::failure(
                    id,
                    RpcError::new(INVALID_REQUEST, "method must be a non-empty string"),
                );
            }
        };

        let Some(handler) = self.table.handlers.get(method) else {
            return RpcResponse::failure(
                id,
                RpcError::new(METHOD_NOT_FOUND, format!("method not found: {method}")),
            );
        };

        debug!(method, "dispatching rpc");
        let params = request.params.unwrap_or(Value::Null);
        match handler(params, Arc::clone(&self.ctx)).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => {
                warn!(method, code = error.code, message = %error.message, "rpc error");
                RpcResponse::failure(id, error)
            }
        }
    }

    /// Parse a raw JSON text frame and dispatch it.
    pub async fn dispatch_text(&self, raw: &str) -> RpcResponse {
        match serde_json::from_str::<RpcRequest>(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(_) => RpcResponse::parse_error(),
        }
    }
}

/// Decode a method's parameter record. `null`/absent params decode as an
/// empty object so methods with all-optional records accept them.
pub fn params<T: DeserializeOwned>(value: Value) -> Result<T, RpcError> {
    let value = if value.is_null() { Value::Object(Default::default()) } else { value };
    serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// Serialise a handler result.
pub fn result<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
