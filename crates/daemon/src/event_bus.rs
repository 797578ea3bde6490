// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus.
//!
//! `publish` delivers synchronously to every local subscriber before
//! returning; a subscriber error is logged and never aborts delivery to the
//! rest. External transports tap the bus through a bounded broadcast
//! channel: a slow sink lags and loses the oldest events for that sink
//! only, never blocking publishers and never reordering.

use hq_core::{Event, WireEvent};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Default per-external-subscriber buffer (events, not bytes).
const BROADCAST_CAPACITY: usize = 256;

type Subscriber = Arc<dyn Fn(&Event) -> Result<(), String> + Send + Sync>;

struct Registration {
    /// Dotted topic this subscriber wants, `None` for all events.
    topic: Option<String>,
    callback: Subscriber,
}

struct Inner {
    subscribers: RwLock<Vec<Registration>>,
    external: broadcast::Sender<WireEvent>,
    published: AtomicU64,
}

/// Cloneable handle to the bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        let (external, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Vec::new()),
                external,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Register a local subscriber for one topic (`agent.spawned`) or for
    /// all events (`None`).
    pub fn subscribe(
        &self,
        topic: Option<&str>,
        callback: impl Fn(&Event) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.inner.subscribers.write().push(Registration {
            topic: topic.map(str::to_string),
            callback: Arc::new(callback),
        });
    }

    /// Tap the bus as an external sink. Each receiver has its own bounded
    /// buffer; on overflow the oldest events for that receiver are dropped.
    pub fn watch(&self) -> broadcast::Receiver<WireEvent> {
        self.inner.external.subscribe()
    }

    /// Deliver an event to every subscriber. Never suspends.
    pub fn publish(&self, event: Event) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        // Snapshot the matching callbacks so a subscriber that publishes
        // in turn never re-enters the lock
        let callbacks: Vec<Subscriber> = {
            let subscribers = self.inner.subscribers.read();
            subscribers
                .iter()
                .filter(|r| match &r.topic {
                    Some(topic) => topic == event.name(),
                    None => true,
                })
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };
        for callback in callbacks {
            if let Err(e) = callback(&event) {
                warn!(event = event.name(), error = %e, "event subscriber failed");
            }
        }

        // send only fails when no external receiver exists, which is fine
        let wire = WireEvent::from_event(&event, chrono::Utc::now());
        let _ = self.inner.external.send(wire);
    }

    /// Total events published since startup (for `daemon.stats`).
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Number of local subscribers (for the health report).
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
