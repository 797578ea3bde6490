// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn section(max_restarts: u32, window: u64, backoff: u64) -> SupervisorSection {
    SupervisorSection { max_restarts, restart_window: window, restart_backoff: backoff }
}

#[test]
fn max_restarts_within_window_do_not_trip() {
    let mut policy = RestartPolicy::new(&section(5, 30, 60));
    let start = Instant::now();

    for n in 0..5 {
        let decision = policy.record_exit(start + Duration::from_secs(n));
        assert_eq!(decision, RestartDecision::Restart, "exit {n} should restart");
    }
    assert_eq!(policy.state(start + Duration::from_secs(5)), BreakerState::Closed);
}

#[test]
fn one_more_exit_trips_the_breaker() {
    let mut policy = RestartPolicy::new(&section(5, 30, 60));
    let start = Instant::now();

    for n in 0..5 {
        policy.record_exit(start + Duration::from_secs(n));
    }
    let decision = policy.record_exit(start + Duration::from_secs(5));
    assert_eq!(decision, RestartDecision::Open(Duration::from_secs(60)));
    assert!(matches!(
        policy.state(start + Duration::from_secs(6)),
        BreakerState::Open { .. }
    ));
}

#[test]
fn exits_outside_window_age_out() {
    let mut policy = RestartPolicy::new(&section(2, 30, 60));
    let start = Instant::now();

    policy.record_exit(start);
    policy.record_exit(start + Duration::from_secs(1));
    // 40s later the first two are out of the window: still restarting
    let decision = policy.record_exit(start + Duration::from_secs(41));
    assert_eq!(decision, RestartDecision::Restart);
    let decision = policy.record_exit(start + Duration::from_secs(42));
    assert_eq!(decision, RestartDecision::Restart);
    // Third within the window trips
    let decision = policy.record_exit(start + Duration::from_secs(43));
    assert_eq!(decision, RestartDecision::Open(Duration::from_secs(60)));
}

#[test]
fn breaker_resets_after_backoff() {
    let mut policy = RestartPolicy::new(&section(1, 30, 60));
    let start = Instant::now();

    policy.record_exit(start);
    let decision = policy.record_exit(start + Duration::from_secs(1));
    assert_eq!(decision, RestartDecision::Open(Duration::from_secs(60)));

    // After the backoff the counter starts fresh
    let later = start + Duration::from_secs(62);
    assert_eq!(policy.state(later), BreakerState::Closed);
    assert_eq!(policy.record_exit(later), RestartDecision::Restart);
    assert_eq!(
        policy.record_exit(later + Duration::from_secs(1)),
        RestartDecision::Open(Duration::from_secs(60))
    );
}

#[test]
fn rapid_crash_burst_matches_spec_scenario() {
    // 10 crashes in 10s with maxRestarts=5: 5 restarts, then the breaker
    // opens; every further exit inside the backoff keeps it open
    let mut policy = RestartPolicy::new(&section(5, 30, 60));
    let start = Instant::now();

    let mut restarts = 0;
    let mut opened = false;
    for n in 0..10u64 {
        match policy.record_exit(start + Duration::from_secs(n)) {
            RestartDecision::Restart if !opened => restarts += 1,
            RestartDecision::Restart => {}
            RestartDecision::Open(_) => opened = true,
        }
    }
    assert_eq!(restarts, 5);
    assert!(opened);
}
