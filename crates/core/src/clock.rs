// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, for elapsed-time measurements.
    fn now(&self) -> Instant;
    /// Wall-clock time, for persisted timestamps and log lines.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    instant: Arc<Mutex<Instant>>,
    utc: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            instant: Arc::new(Mutex::new(Instant::now())),
            utc: Arc::new(Mutex::new(
                Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
            )),
        }
    }

    /// Advance both the monotonic and wall clocks by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.instant.lock() += duration;
        let mut utc = self.utc.lock();
        *utc += chrono::Duration::from_std(duration).unwrap_or_default();
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.instant.lock()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc.lock()
    }
}
