// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hq-daemon library: the worker kernel and supervisor of `hqd`.
//!
//! The binary is a thin dispatcher; everything it runs lives here so the
//! kernel components can be exercised directly by tests and by the CLI
//! (which reuses the JSON-RPC types).

pub mod event_bus;
pub mod health;
pub mod kanban;
pub mod logger;
pub mod orchestrator;
pub mod pipeline;
pub mod reconciler;
pub mod rpc;
pub mod supervisor;
pub mod transport;
pub mod worker;

pub use event_bus::EventBus;
pub use rpc::{RpcError, RpcRequest, RpcResponse};
