//! Barrier crossing against slow and fast time authorities.

mod common;

use wpm_cosim::learning::ConvergenceFlags;
use wpm_cosim::sim::sync::{SteppingAuthority, TimeAuthority};

#[test]
fn grants_never_trail_barriers_with_a_slow_authority() {
    let mut driver = common::fixed_driver(
        common::max_day_scenario(2),
        SteppingAuthority::new(0, 45),
        ConvergenceFlags::default(),
    );
    let summary = driver.run().expect("run should succeed");

    let mut last_granted = 0;
    for r in &summary.records {
        if let Some(pre) = r.pre {
            assert!(pre.granted_secs >= pre.barrier.at_secs, "pre at {}", r.clock);
            assert!(pre.granted_secs >= last_granted);
            last_granted = pre.granted_secs;
        }
        assert!(r.post.granted_secs >= r.post.barrier.at_secs, "post at {}", r.clock);
        assert!(r.post.granted_secs >= last_granted);
        last_granted = r.post.granted_secs;
    }
}

#[test]
fn slow_authority_needs_ceil_requests_per_tick() {
    // 300 s ticks, 100 s grants: the first post barrier (0 s) still takes one
    // request, the catch-up to 300 s takes two, every later tick takes three.
    let mut driver = common::fixed_driver(
        common::max_day_scenario(1),
        SteppingAuthority::new(0, 100),
        ConvergenceFlags::default(),
    );
    let summary = driver.run().expect("run should succeed");

    assert_eq!(summary.records[0].requests(), 1);
    assert_eq!(summary.records[1].requests(), 2);
    assert!(summary.records[2..].iter().all(|r| r.requests() == 3));
    let total: u64 = summary.records.iter().map(|r| r.requests()).sum();
    assert_eq!(total, driver.gate().authority().requests());
}

#[test]
fn pre_barrier_only_from_day_two() {
    let mut driver = common::lockstep_driver(common::max_day_scenario(2));
    let summary = driver.run().expect("run should succeed");

    for r in &summary.records {
        assert_eq!(r.pre.is_some(), r.clock.day > 1, "at {}", r.clock);
    }
    let first_day_two = summary
        .records
        .iter()
        .find(|r| r.clock.day == 2)
        .and_then(|r| r.pre)
        .map(|c| c.barrier.at_secs);
    assert_eq!(first_day_two, Some(86_400 - 150));
}

/// Authority that hands out grants short of the request a few times
/// before catching up.
struct Lagging {
    lag: u32,
    calls: u32,
}

impl TimeAuthority for Lagging {
    fn request_time(&mut self, requested_secs: u64) -> u64 {
        self.calls += 1;
        if self.calls % self.lag == 0 {
            requested_secs
        } else {
            requested_secs.saturating_sub(1)
        }
    }
}

#[test]
fn lagging_authority_is_retried_until_granted() {
    let mut driver = common::fixed_driver(
        common::max_day_scenario(1),
        Lagging { lag: 4, calls: 0 },
        ConvergenceFlags::default(),
    );
    let summary = driver.run().expect("run should succeed");

    assert_eq!(summary.records[0].post.requests, 1);
    assert_eq!(summary.records[1].post.requests, 3);
    assert!(summary.records[2..].iter().all(|r| r.post.requests == 4));
    assert_eq!(summary.stop.map(|s| s.explanation), Some("1".to_string()));
}

/// Authority that grants an hour past every request.
#[derive(Default)]
struct Overshooting {
    calls: u64,
}

impl TimeAuthority for Overshooting {
    fn request_time(&mut self, requested_secs: u64) -> u64 {
        self.calls += 1;
        requested_secs + 3_600
    }
}

#[test]
fn every_tick_commits_its_post_barrier_even_when_already_granted() {
    let mut driver = common::fixed_driver(
        common::max_day_scenario(2),
        Overshooting::default(),
        ConvergenceFlags::default(),
    );
    let summary = driver.run().expect("run should succeed");

    assert!(
        summary.records.iter().all(|r| r.post.requests == 1),
        "every post barrier should be requested exactly once"
    );
    assert!(summary.records.iter().filter_map(|r| r.pre).all(|c| c.requests == 0));
    let total: u64 = summary.records.iter().map(|r| r.requests()).sum();
    assert_eq!(total, driver.gate().authority().calls);
    assert_eq!(total, summary.ticks() as u64);
}
