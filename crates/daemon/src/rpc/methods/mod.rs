// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Method handlers, one module per namespace.

mod agent;
mod daemon;
mod fanout;
mod kanban;
mod pipeline;
mod runtime;
mod task;
mod team;

use super::MethodTable;

pub fn register_all(table: &mut MethodTable) {
    agent::register(table);
    task::register(table);
    team::register(table);
    pipeline::register(table);
    kanban::register(table);
    runtime::register(table);
    daemon::register(table);
    fanout::register(table);
}
