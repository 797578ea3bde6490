// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_core::{KanbanColumn, TaskId};
use parking_lot::Mutex;

fn moved(n: u32) -> Event {
    Event::TaskMoved { id: TaskId::from_string(format!("tsk-{n}")), column: KanbanColumn::Done }
}

#[test]
fn topic_subscriber_sees_only_its_topic() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    bus.subscribe(Some("task.moved"), move |e| {
        seen2.lock().push(e.name());
        Ok(())
    });

    bus.publish(moved(1));
    bus.publish(Event::DaemonReloaded);

    assert_eq!(*seen.lock(), ["task.moved"]);
}

#[test]
fn wildcard_subscriber_sees_everything() {
    let bus = EventBus::new();
    let count = Arc::new(Mutex::new(0u32));
    let count2 = Arc::clone(&count);
    bus.subscribe(None, move |_| {
        *count2.lock() += 1;
        Ok(())
    });

    bus.publish(moved(1));
    bus.publish(Event::DaemonReloaded);
    assert_eq!(*count.lock(), 2);
    assert_eq!(bus.published_count(), 2);
}

#[test]
fn failing_subscriber_does_not_stop_delivery() {
    let bus = EventBus::new();
    bus.subscribe(None, |_| Err("boom".to_string()));
    let delivered = Arc::new(Mutex::new(false));
    let delivered2 = Arc::clone(&delivered);
    bus.subscribe(None, move |_| {
        *delivered2.lock() = true;
        Ok(())
    });

    bus.publish(moved(1));
    assert!(*delivered.lock());
}

#[tokio::test]
async fn external_watchers_get_events_in_order() {
    let bus = EventBus::new();
    let mut rx_a = bus.watch();
    let mut rx_b = bus.watch();

    for n in 0..100 {
        bus.publish(moved(n));
    }

    for rx in [&mut rx_a, &mut rx_b] {
        for n in 0..100 {
            let wire = rx.recv().await.unwrap();
            assert_eq!(wire.name, "task.moved");
            assert_eq!(wire.payload["id"], format!("tsk-{n}"));
        }
    }
}

#[tokio::test]
async fn slow_watcher_drops_oldest_but_keeps_order() {
    let bus = EventBus::new();
    let mut rx = bus.watch();

    // Overflow the per-subscriber buffer (capacity 256)
    for n in 0..300 {
        bus.publish(moved(n));
    }

    // First recv reports the lag, subsequent events arrive in order
    let mut last_seen: Option<u32> = None;
    loop {
        match rx.recv().await {
            Ok(wire) => {
                let id = wire.payload["id"].as_str().unwrap().to_string();
                let n: u32 = id.trim_start_matches("tsk-").parse().unwrap();
                if let Some(prev) = last_seen {
                    assert!(n > prev, "events out of order: {n} after {prev}");
                }
                last_seen = Some(n);
                if n == 299 {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                assert!(missed > 0);
            }
            Err(e) => panic!("unexpected recv error: {e}"),
        }
    }
    assert_eq!(last_seen, Some(299));
}
