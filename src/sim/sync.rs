//! Request/grant time synchronization with the co-simulation federation.

use std::fmt;

use log::{debug, trace, warn};

use super::clock::{ClockState, TICK_MINUTES};

/// External arbiter of global simulated time.
///
/// A request names the simulated second this federate wants to reach.
/// The authority answers with the time it is willing to grant right now,
/// which may be short of the request while other federates catch up.
pub trait TimeAuthority {
    /// Requests simulated time `requested_secs` and returns the granted time.
    fn request_time(&mut self, requested_secs: u64) -> u64;
}

impl<T: TimeAuthority + ?Sized> TimeAuthority for &mut T {
    fn request_time(&mut self, requested_secs: u64) -> u64 {
        (**self).request_time(requested_secs)
    }
}

/// Single-federate authority that grants every request in full.
#[derive(Debug, Default, Clone)]
pub struct LockstepAuthority {
    granted: u64,
    requests: u64,
}

impl LockstepAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests answered so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl TimeAuthority for LockstepAuthority {
    fn request_time(&mut self, requested_secs: u64) -> u64 {
        self.requests += 1;
        self.granted = self.granted.max(requested_secs);
        self.granted
    }
}

/// Authority that only ever moves `step_secs` per request, regardless of
/// what was asked. Models a busy federation.
#[derive(Debug, Clone)]
pub struct SteppingAuthority {
    now: u64,
    step_secs: u64,
    requests: u64,
}

impl SteppingAuthority {
    /// # Panics
    ///
    /// Panics if `step_secs` is zero.
    pub fn new(start_secs: u64, step_secs: u64) -> Self {
        assert!(step_secs > 0, "step_secs must be > 0");
        Self {
            now: start_secs,
            step_secs,
            requests: 0,
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl TimeAuthority for SteppingAuthority {
    fn request_time(&mut self, _requested_secs: u64) -> u64 {
        self.requests += 1;
        self.now += self.step_secs;
        self.now
    }
}

/// Which of the two per-tick barriers a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Staggered half-interval barrier crossed before clearing (day >= 2).
    Pre,
    /// Barrier crossed right after clearing, before publication.
    Post,
}

impl fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierKind::Pre => write!(f, "pre"),
            BarrierKind::Post => write!(f, "post"),
        }
    }
}

/// A simulated-time value the federation must reach before this federate
/// proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBarrier {
    pub kind: BarrierKind,
    pub at_secs: u64,
}

impl TimeBarrier {
    /// Pre-clearing barrier for `clock`, half a sub-interval before the
    /// current 5-minute mark.
    ///
    /// Returns `None` on day 1 and on minutes that are not 5-minute marks.
    pub fn pre_clearing(clock: &ClockState, sub_interval_minutes: u32) -> Option<Self> {
        if clock.day <= 1 || clock.minute % TICK_MINUTES != 0 {
            return None;
        }
        let half_interval = u64::from(60 * sub_interval_minutes) / 2;
        Some(Self {
            kind: BarrierKind::Pre,
            at_secs: clock.elapsed_secs().saturating_sub(half_interval),
        })
    }

    /// Post-clearing barrier for `clock`: one second before the mark from
    /// day 2 onward, exactly on the mark during day 1.
    pub fn post_clearing(clock: &ClockState) -> Self {
        let mark = clock.elapsed_secs();
        let at_secs = if clock.day > 1 { mark - 1 } else { mark };
        Self {
            kind: BarrierKind::Post,
            at_secs,
        }
    }
}

/// Outcome of crossing one barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub barrier: TimeBarrier,
    /// Time granted by the authority, always `>= barrier.at_secs`.
    pub granted_secs: u64,
    /// Requests issued while crossing. A post barrier always issues at
    /// least one; a pre barrier issues none if an earlier grant covers it.
    pub requests: u64,
}

/// Blocking gate in front of a [`TimeAuthority`].
///
/// Crossing a barrier re-issues the same request until the grant reaches
/// it. The post barrier commits the tick, so it is requested at least once
/// even when an earlier grant already covers it. There is no timeout: a
/// stalled authority stalls the simulation.
#[derive(Debug)]
pub struct TimeSyncGate<A: TimeAuthority> {
    authority: A,
    granted_secs: u64,
}

impl<A: TimeAuthority> TimeSyncGate<A> {
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            granted_secs: 0,
        }
    }

    /// Highest simulated time granted so far.
    pub fn granted_secs(&self) -> u64 {
        self.granted_secs
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut A {
        &mut self.authority
    }

    /// Blocks until the federation grants at least `barrier.at_secs`.
    pub fn cross(&mut self, barrier: TimeBarrier) -> Crossing {
        let requested = barrier.at_secs;
        let mut requests = 0_u64;

        if barrier.kind == BarrierKind::Post {
            self.request(barrier, &mut requests);
        }
        while self.granted_secs < requested {
            self.request(barrier, &mut requests);
        }

        debug!(
            "crossed {} barrier at {requested}s (granted {}s, {requests} request(s))",
            barrier.kind, self.granted_secs
        );

        Crossing {
            barrier,
            granted_secs: self.granted_secs,
            requests,
        }
    }

    fn request(&mut self, barrier: TimeBarrier, requests: &mut u64) {
        let granted = self.authority.request_time(barrier.at_secs);
        *requests += 1;
        if granted < self.granted_secs {
            warn!(
                "time authority regressed: granted {granted}s after {}s; ignoring",
                self.granted_secs
            );
            return;
        }
        trace!("{} barrier {}s: granted {granted}s", barrier.kind, barrier.at_secs);
        self.granted_secs = granted;
    }

    /// Convenience wrapper crossing a bare post barrier at `requested_secs`.
    pub fn cross_barrier(&mut self, requested_secs: u64) -> u64 {
        self.cross(TimeBarrier {
            kind: BarrierKind::Post,
            at_secs: requested_secs,
        })
        .granted_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> ClockState {
        ClockState { minute, hour, day }
    }

    #[test]
    fn no_pre_barrier_on_day_one() {
        assert_eq!(TimeBarrier::pre_clearing(&at(1, 12, 30), 5), None);
    }

    #[test]
    fn pre_barrier_is_half_interval_before_mark() {
        let b = TimeBarrier::pre_clearing(&at(2, 0, 0), 5).map(|b| b.at_secs);
        assert_eq!(b, Some(86_400 - 150));

        let b = TimeBarrier::pre_clearing(&at(3, 1, 10), 15).map(|b| b.at_secs);
        assert_eq!(b, Some(2 * 86_400 + 3_600 + 600 - 450));
    }

    #[test]
    fn post_barrier_day_one_is_on_the_mark() {
        assert_eq!(TimeBarrier::post_clearing(&at(1, 0, 0)).at_secs, 0);
        assert_eq!(TimeBarrier::post_clearing(&at(1, 2, 5)).at_secs, 7_500);
    }

    #[test]
    fn post_barrier_later_days_is_one_second_early() {
        assert_eq!(TimeBarrier::post_clearing(&at(2, 0, 0)).at_secs, 86_399);
    }

    #[test]
    fn barriers_never_decrease_across_ticks() {
        let mut clock = crate::sim::clock::SimulationClock::new();
        let mut last = 0;
        for _ in 0..(288 * 2 + 10) {
            let s = clock.state();
            if let Some(pre) = TimeBarrier::pre_clearing(&s, 5) {
                assert!(pre.at_secs >= last);
                last = pre.at_secs;
            }
            let post = TimeBarrier::post_clearing(&s);
            assert!(post.at_secs >= last);
            last = post.at_secs;
            clock.advance();
        }
    }

    #[test]
    fn lockstep_grants_in_one_request() {
        let mut gate = TimeSyncGate::new(LockstepAuthority::new());
        let c = gate.cross(TimeBarrier::post_clearing(&at(1, 0, 5)));
        assert_eq!(c.granted_secs, 300);
        assert_eq!(c.requests, 1);
    }

    #[test]
    fn already_granted_post_barrier_is_still_requested() {
        let mut gate = TimeSyncGate::new(LockstepAuthority::new());
        gate.cross_barrier(600);
        let c = gate.cross(TimeBarrier::post_clearing(&at(1, 0, 5)));
        assert_eq!(c.requests, 1);
        assert_eq!(c.granted_secs, 600);
        assert_eq!(gate.authority().requests(), 2);
    }

    #[test]
    fn already_granted_pre_barrier_issues_no_request() {
        let mut gate = TimeSyncGate::new(LockstepAuthority::new());
        gate.cross_barrier(90_000);
        let c = gate.cross(TimeBarrier::pre_clearing(&at(2, 0, 5), 5).expect("day 2 has a pre barrier"));
        assert_eq!(c.requests, 0);
        assert_eq!(c.granted_secs, 90_000);
    }

    #[test]
    fn first_post_barrier_at_zero_is_requested() {
        let mut gate = TimeSyncGate::new(LockstepAuthority::new());
        let c = gate.cross(TimeBarrier::post_clearing(&at(1, 0, 0)));
        assert_eq!(c.requests, 1);
        assert_eq!(gate.authority().requests(), 1);
    }

    #[test]
    fn stepping_authority_needs_ceil_requests() {
        for (start, step, target) in [(0_u64, 10_u64, 95_u64), (100, 7, 150), (0, 300, 300)] {
            let mut gate = TimeSyncGate::new(SteppingAuthority::new(start, step));
            let c = gate.cross(TimeBarrier {
                kind: BarrierKind::Pre,
                at_secs: target,
            });
            let expected = (target - start).div_ceil(step);
            assert_eq!(c.requests, expected, "start={start} step={step} t={target}");
            assert!(c.granted_secs >= target);
            assert_eq!(gate.authority().requests(), expected);
        }
    }

    struct Regressing {
        answers: Vec<u64>,
    }

    impl TimeAuthority for Regressing {
        fn request_time(&mut self, _requested_secs: u64) -> u64 {
            self.answers.remove(0)
        }
    }

    #[test]
    fn regressing_grant_is_not_trusted() {
        let mut gate = TimeSyncGate::new(Regressing {
            answers: vec![50, 20, 80, 120],
        });
        let c = gate.cross(TimeBarrier {
            kind: BarrierKind::Post,
            at_secs: 100,
        });
        assert_eq!(c.granted_secs, 120);
        assert_eq!(c.requests, 4);
        assert!(gate.granted_secs() >= 100);
    }
}
