//! Per-tick records, driver phases and the run summary.

use std::fmt;

use super::clock::ClockState;
use super::stopping::StopMask;
use super::sync::Crossing;

/// Where the tick driver is within the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPhase {
    #[default]
    Idle,
    WaitPreBarrier,
    Clearing,
    WaitPostBarrier,
    Publishing,
    EvaluatingStop,
    Advancing,
    Finalizing,
    Terminated,
}

impl TickPhase {
    pub fn is_terminal(self) -> bool {
        self == TickPhase::Terminated
    }
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickPhase::Idle => "idle",
            TickPhase::WaitPreBarrier => "wait-pre-barrier",
            TickPhase::Clearing => "clearing",
            TickPhase::WaitPostBarrier => "wait-post-barrier",
            TickPhase::Publishing => "publishing",
            TickPhase::EvaluatingStop => "evaluating-stop",
            TickPhase::Advancing => "advancing",
            TickPhase::Finalizing => "finalizing",
            TickPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Complete record of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    /// Clock reading the tick ran at.
    pub clock: ClockState,
    /// Pre-clearing crossing; `None` when the barrier does not apply.
    pub pre: Option<Crossing>,
    /// Post-clearing crossing.
    pub post: Crossing,
    /// Whether the market cleared without error.
    pub cleared: bool,
    /// Whether the day-ahead bundle was published.
    pub day_ahead_published: bool,
    /// Whether real-time results were published.
    pub real_time_published: bool,
    /// Stopping rules that fired this tick.
    pub mask: StopMask,
}

impl TickRecord {
    /// Requests issued to the time authority across both barriers.
    pub fn requests(&self) -> u64 {
        self.pre.map_or(0, |c| c.requests) + self.post.requests
    }

    pub fn stopped(&self) -> bool {
        !self.mask.is_empty()
    }
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pre = match self.pre {
            Some(c) => format!("{:>8}s", c.barrier.at_secs),
            None => format!("{:>9}", "-"),
        };
        write!(
            f,
            "{} (iv {:>3}) | pre={pre} post={:>8}s granted={:>8}s req={} | \
             cleared={} DA={} RT={}",
            self.clock,
            self.clock.interval_index(),
            self.post.barrier.at_secs,
            self.post.granted_secs,
            self.requests(),
            self.cleared,
            self.day_ahead_published,
            self.real_time_published,
        )?;
        if self.stopped() {
            write!(f, " | stop [{}]", self.mask.explain())?;
        }
        Ok(())
    }
}

/// Why and when the run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub day: u32,
    pub mask: StopMask,
    /// Rule numbers as rendered by [`StopMask::explain`].
    pub explanation: String,
}

impl StopReport {
    pub fn new(day: u32, mask: StopMask) -> Self {
        Self {
            day,
            mask,
            explanation: mask.explain(),
        }
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulation terminated on day {} by stopping rule(s) {}",
            self.day, self.explanation
        )
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<TickRecord>,
    /// Clock at the last executed tick.
    pub final_clock: ClockState,
    pub stop: Option<StopReport>,
}

impl RunSummary {
    pub fn ticks(&self) -> usize {
        self.records.len()
    }

    pub fn day_ahead_publications(&self) -> usize {
        self.records.iter().filter(|r| r.day_ahead_published).count()
    }

    pub fn real_time_publications(&self) -> usize {
        self.records.iter().filter(|r| r.real_time_published).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Ticks executed:         {}", self.ticks())?;
        writeln!(f, "Final clock:            {}", self.final_clock)?;
        writeln!(f, "DA publications:        {}", self.day_ahead_publications())?;
        writeln!(f, "RT publications:        {}", self.real_time_publications())?;
        match &self.stop {
            Some(stop) => write!(f, "Stop:                   {stop}"),
            None => write!(f, "Stop:                   none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::stopping::RuleKind;
    use crate::sim::sync::{BarrierKind, TimeBarrier};

    fn crossing(kind: BarrierKind, at_secs: u64, requests: u64) -> Crossing {
        Crossing {
            barrier: TimeBarrier { kind, at_secs },
            granted_secs: at_secs,
            requests,
        }
    }

    fn record(mask: StopMask) -> TickRecord {
        TickRecord {
            clock: ClockState { minute: 55, hour: 23, day: 7 },
            pre: Some(crossing(BarrierKind::Pre, 604_500, 1)),
            post: crossing(BarrierKind::Post, 604_499 + 151, 1),
            cleared: true,
            day_ahead_published: false,
            real_time_published: true,
            mask,
        }
    }

    #[test]
    fn requests_sum_both_barriers() {
        assert_eq!(record(StopMask::empty()).requests(), 2);
    }

    #[test]
    fn display_mentions_stop_only_when_stopped() {
        let quiet = format!("{}", record(StopMask::empty()));
        assert!(!quiet.contains("stop"));

        let mut mask = StopMask::empty();
        mask.insert(RuleKind::MaxDay);
        mask.insert(RuleKind::ActionProbability);
        let loud = format!("{}", record(mask));
        assert!(loud.ends_with("stop [1, and 3]"));
    }

    #[test]
    fn stop_report_carries_explanation() {
        let report = StopReport::new(7, StopMask::from_bits(0b1));
        assert_eq!(report.explanation, "1");
        assert_eq!(
            report.to_string(),
            "simulation terminated on day 7 by stopping rule(s) 1"
        );
    }

    #[test]
    fn phase_display_is_kebab_case() {
        assert_eq!(TickPhase::WaitPreBarrier.to_string(), "wait-pre-barrier");
        assert!(TickPhase::Terminated.is_terminal());
        assert!(!TickPhase::Idle.is_terminal());
    }
}
