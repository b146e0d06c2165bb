//! Tick driver: the per-tick state machine that gates, clears, publishes
//! and decides whether the run goes on.

use log::{debug, error, info, trace, warn};

use crate::agents::AgentRegistry;
use crate::archive::DailyArchive;
use crate::bus::{EventBus, format_values};
use crate::config::ScenarioConfig;
use crate::error::SimError;
use crate::learning::LearningCollaborator;
use crate::market::{ClearingContext, MarketClearing};

use super::clock::{ClockState, HOURS_PER_DAY, MINUTES_PER_HOUR, SimulationClock, TICK_MINUTES};
use super::stopping::{StopInputs, StoppingRuleEngine};
use super::sync::{Crossing, TimeAuthority, TimeBarrier, TimeSyncGate};
use super::types::{RunSummary, StopReport, TickPhase, TickRecord};

/// Orchestrator owning the clock, the time gate and every collaborator.
///
/// Generic over its collaborators for static dispatch. Ticks run strictly
/// one after another; the only point where a tick may wait is a barrier
/// crossing. The clock moves only at the end of a tick, after the stop
/// decision.
pub struct TickDriver<A, B, M, L>
where
    A: TimeAuthority,
    B: EventBus,
    M: MarketClearing,
    L: LearningCollaborator,
{
    config: ScenarioConfig,
    clock: SimulationClock,
    gate: TimeSyncGate<A>,
    stopping: StoppingRuleEngine,
    registry: AgentRegistry,
    bus: B,
    market: M,
    learning: L,
    archive: DailyArchive,
    phase: TickPhase,
    started: bool,
    stop: Option<StopReport>,
}

impl<A, B, M, L> TickDriver<A, B, M, L>
where
    A: TimeAuthority,
    B: EventBus,
    M: MarketClearing,
    L: LearningCollaborator,
{
    /// Creates a driver positioned at day 1, 00:00.
    ///
    /// # Arguments
    ///
    /// * `config` - Scenario configuration (validated here)
    /// * `registry` - Agent population
    /// * `authority` - Co-simulation time authority
    /// * `bus` - Shared event bus
    /// * `market` - Market-clearing collaborator
    /// * `learning` - Learning collaborator supplying convergence flags
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` with every validation problem if the
    /// configuration is invalid. No tick runs in that case.
    pub fn new(
        config: ScenarioConfig,
        registry: AgentRegistry,
        authority: A,
        bus: B,
        market: M,
        learning: L,
    ) -> Result<Self, SimError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SimError::Config(errors));
        }
        Ok(Self {
            stopping: StoppingRuleEngine::new(&config.stopping),
            config,
            clock: SimulationClock::new(),
            gate: TimeSyncGate::new(authority),
            registry,
            bus,
            market,
            learning,
            archive: DailyArchive::new(),
            phase: TickPhase::Idle,
            started: false,
            stop: None,
        })
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn clock(&self) -> ClockState {
        self.clock.state()
    }

    pub fn gate(&self) -> &TimeSyncGate<A> {
        &self.gate
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Mutable registry access; only reachable between ticks.
    pub fn registry_mut(&mut self) -> &mut AgentRegistry {
        &mut self.registry
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn market(&self) -> &M {
        &self.market
    }

    pub fn learning(&self) -> &L {
        &self.learning
    }

    pub fn archive(&self) -> &DailyArchive {
        &self.archive
    }

    pub fn stop_report(&self) -> Option<&StopReport> {
        self.stop.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Logs the startup banner, runs the initial equilibrium and loads the
    /// day-1 forecasts. Called implicitly by the first [`step`](Self::step).
    ///
    /// # Errors
    ///
    /// Returns `SimError::Bootstrap` if the initial equilibrium fails.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.started {
            return Ok(());
        }
        let sim = &self.config.simulation;
        info!(
            "starting run: seed {}, sub-interval {} min, event bus {}",
            sim.seed,
            sim.sub_interval_minutes,
            if sim.event_bus { "on" } else { "off" }
        );
        self.stopping.log_summary();

        self.market
            .compute_initial_equilibrium(&self.registry)
            .map_err(SimError::Bootstrap)?;
        let day = self.clock.day();
        self.registry.refresh_forecasts(day, None);
        self.started = true;
        Ok(())
    }

    /// Executes one tick and returns its record.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Terminated` once a stopping rule has ended the
    /// run, or `SimError::Bootstrap` if the implicit start fails.
    pub fn step(&mut self) -> Result<TickRecord, SimError> {
        if self.phase.is_terminal() {
            return Err(SimError::Terminated {
                day: self.clock.day(),
            });
        }
        self.start()?;

        let clock = self.clock.state();
        let sub_interval = self.config.simulation.sub_interval_minutes;

        // 1. Wait for the other federates to get close to this mark
        let pre = match TimeBarrier::pre_clearing(&clock, sub_interval) {
            Some(barrier) => {
                self.enter(TickPhase::WaitPreBarrier);
                Some(self.gate.cross(barrier))
            }
            None => None,
        };

        // 2. Clear
        self.enter(TickPhase::Clearing);
        let cleared = match self
            .market
            .clear_market(&ClearingContext::new(&clock, &self.registry))
        {
            Ok(()) => true,
            Err(e) => {
                error!("market clearing failed at {clock}: {e}");
                false
            }
        };

        // 3. Commit the tick with the federation
        self.enter(TickPhase::WaitPostBarrier);
        let post: Crossing = self.gate.cross(TimeBarrier::post_clearing(&clock));

        // 4. Publish
        self.enter(TickPhase::Publishing);
        let (day_ahead_published, real_time_published) = if self.config.simulation.event_bus && cleared {
            (self.publish_day_ahead(&clock), self.publish_real_time(&clock))
        } else {
            (false, false)
        };
        if is_last_tick_of_day(&clock) {
            self.archive_day(clock.day);
            self.learning.end_of_day(clock.day);
        }

        // 5. Stop?
        self.enter(TickPhase::EvaluatingStop);
        let shapes = self.registry.action_domain_shapes();
        let flags = self.learning.convergence();
        let mask = self.stopping.evaluate(&StopInputs {
            clock,
            learning: &shapes,
            flags: &flags,
        });

        let record = TickRecord {
            clock,
            pre,
            post,
            cleared,
            day_ahead_published,
            real_time_published,
            mask,
        };
        trace!("{record}");

        if mask.is_empty() {
            self.enter(TickPhase::Advancing);
            self.advance();
            self.enter(TickPhase::Idle);
        } else {
            self.enter(TickPhase::Finalizing);
            self.archive_day(clock.day);
            if let Err(e) = self.market.finalize_last_day() {
                error!("last-day settlement failed: {e}");
            }
            let report = StopReport::new(clock.day, mask);
            info!("{report}");
            self.stop = Some(report);
            self.enter(TickPhase::Terminated);
        }
        Ok(record)
    }

    /// Runs until a stopping rule ends the simulation.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`step`](Self::step).
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        self.run_with(usize::MAX)
    }

    /// Runs at most `max_ticks` ticks, stopping earlier if a rule fires.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`step`](Self::step).
    pub fn run_for(&mut self, max_ticks: usize) -> Result<RunSummary, SimError> {
        self.run_with(max_ticks)
    }

    fn run_with(&mut self, max_ticks: usize) -> Result<RunSummary, SimError> {
        let mut records = Vec::new();
        let mut final_clock = self.clock.state();
        while records.len() < max_ticks && !self.phase.is_terminal() {
            let record = self.step()?;
            final_clock = record.clock;
            records.push(record);
        }
        Ok(RunSummary {
            records,
            final_clock,
            stop: self.stop.clone(),
        })
    }

    fn enter(&mut self, next: TickPhase) {
        trace!("{} -> {next}", self.phase);
        self.phase = next;
    }

    fn advance(&mut self) {
        if !self.clock.advance() {
            return;
        }
        let day = self.clock.day();
        info!("day {} complete, entering day {day}", day - 1);
        let batch = self.config.simulation.event_bus.then(|| self.bus.poll());
        if let Some(events) = &batch {
            debug!("polled {} bus event(s) for day {day}", events.len());
        }
        self.registry.refresh_forecasts(day, batch.as_deref());
    }

    fn publish_day_ahead(&mut self, clock: &ClockState) -> bool {
        if clock.hour != self.config.simulation.day_ahead_publish_hour || clock.minute != 0 {
            return false;
        }
        let Some(lmp) = self.market.day_ahead_lmp() else {
            warn!("no day-ahead solution to publish on day {}", clock.day);
            return false;
        };
        let node = self.config.market.published_node.saturating_sub(1);
        let column: Option<Vec<f64>> = lmp.iter().map(|hour| hour.get(node).copied()).collect();
        let Some(column) = column else {
            warn!("day-ahead solution has no node {}", node + 1);
            return false;
        };
        let topic = self.config.bus.day_ahead_topic.clone();
        self.send(&topic, &format_values(&column))
    }

    fn publish_real_time(&mut self, clock: &ClockState) -> bool {
        let sub_interval = self.config.simulation.sub_interval_minutes;
        if clock.day <= 1 || clock.minute % sub_interval != 0 {
            return false;
        }
        let Some(lmp) = self.market.real_time_lmp(clock.interval_index()) else {
            warn!("no real-time solution to publish at {clock}");
            return false;
        };
        let payload = format_values(lmp);
        let topic = self.config.bus.real_time_topic.clone();
        self.send(&topic, &payload)
    }

    fn send(&mut self, topic: &str, payload: &str) -> bool {
        match self.bus.publish(topic, payload) {
            Ok(()) => {
                debug!("published {topic}: {payload}");
                true
            }
            Err(e) => {
                warn!("publish on {topic} failed: {e}");
                false
            }
        }
    }

    fn archive_day(&mut self, day: u32) {
        if let Some(lmp) = self.market.day_ahead_lmp() {
            self.archive.append(day, lmp);
        }
    }
}

fn is_last_tick_of_day(clock: &ClockState) -> bool {
    clock.hour == HOURS_PER_DAY - 1 && clock.minute == MINUTES_PER_HOUR - TICK_MINUTES
}
