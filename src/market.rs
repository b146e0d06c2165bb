//! Market-clearing collaborator seam and a seeded synthetic clearer.

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};

use crate::agents::AgentRegistry;
use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::noise::gaussian_noise;
use crate::sim::clock::{ClockState, HOURS_PER_DAY, TICKS_PER_DAY};

/// Everything the clearer sees for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ClearingContext<'a> {
    pub minute: u32,
    pub interval: u32,
    pub hour: u32,
    pub day: u32,
    pub registry: &'a AgentRegistry,
}

impl<'a> ClearingContext<'a> {
    pub fn new(clock: &ClockState, registry: &'a AgentRegistry) -> Self {
        Self {
            minute: clock.minute,
            interval: clock.interval_index(),
            hour: clock.hour,
            day: clock.day,
            registry,
        }
    }
}

/// External market operator: day-ahead and real-time clearing.
///
/// Called synchronously by the tick driver; at most one call is in flight.
pub trait MarketClearing {
    /// Competitive benchmark run before the first tick.
    fn compute_initial_equilibrium(&mut self, registry: &AgentRegistry) -> Result<(), MarketError>;

    /// Clears whatever market is due at this tick.
    fn clear_market(&mut self, ctx: &ClearingContext<'_>) -> Result<(), MarketError>;

    /// Current day-ahead LMPs, indexed `[hour][node]`.
    fn day_ahead_lmp(&self) -> Option<&[Vec<f64>]>;

    /// Real-time LMPs for `interval`, one per node.
    fn real_time_lmp(&self, interval: u32) -> Option<&[f64]>;

    /// Last-day settlement, called once when the run terminates.
    fn finalize_last_day(&mut self) -> Result<(), MarketError>;
}

/// Seeded stand-in for the UC/ED market operator.
///
/// Day-ahead prices follow the system net load (LSE demand minus NDG
/// forecast) between `base_price` and `base_price + price_spread`, never
/// below the cheapest GenCo's marginal cost. Real-time prices add Gaussian
/// noise on top of the hour's day-ahead price.
#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    config: MarketConfig,
    rng: StdRng,
    benchmark: Option<Vec<Vec<f64>>>,
    day_ahead: Option<Vec<Vec<f64>>>,
    real_time: Vec<Vec<f64>>,
    cleared_day: Option<u32>,
    settled: bool,
}

impl SyntheticMarket {
    pub fn new(config: &MarketConfig, seed: u64) -> Self {
        Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed),
            benchmark: None,
            day_ahead: None,
            real_time: Vec::with_capacity(TICKS_PER_DAY as usize),
            cleared_day: None,
            settled: false,
        }
    }

    /// Competitive benchmark prices from [`MarketClearing::compute_initial_equilibrium`].
    pub fn benchmark(&self) -> Option<&[Vec<f64>]> {
        self.benchmark.as_deref()
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    fn price_day(&self, registry: &AgentRegistry) -> Vec<Vec<f64>> {
        let nodes = self.config.nodes;
        let floor = registry
            .gencos()
            .iter()
            .map(|g| g.marginal_cost)
            .fold(f64::INFINITY, f64::min);
        let floor = if floor.is_finite() { floor } else { 0.0 };

        let loads: Vec<Vec<f64>> = (0..HOURS_PER_DAY as usize)
            .map(|h| registry.net_load_by_node(h, nodes))
            .collect();
        let totals: Vec<f64> = loads.iter().map(|l| l.iter().sum()).collect();
        let peak = totals.iter().copied().fold(0.0_f64, f64::max);

        loads
            .iter()
            .zip(&totals)
            .map(|(by_node, total)| {
                let share = if peak > 0.0 { total / peak } else { 0.0 };
                let system = self.config.base_price + self.config.price_spread * share;
                by_node
                    .iter()
                    .enumerate()
                    .map(|(n, _)| (system * (1.0 + 0.02 * n as f64)).max(floor))
                    .collect()
            })
            .collect()
    }
}

impl MarketClearing for SyntheticMarket {
    fn compute_initial_equilibrium(&mut self, registry: &AgentRegistry) -> Result<(), MarketError> {
        let prices = self.price_day(registry);
        let mean = prices.iter().flatten().sum::<f64>() / prices.iter().flatten().count().max(1) as f64;
        info!("competitive benchmark: mean LMP {mean:.2} $/MWh");
        self.benchmark = Some(prices);
        Ok(())
    }

    fn clear_market(&mut self, ctx: &ClearingContext<'_>) -> Result<(), MarketError> {
        if ctx.registry.gencos().is_empty() {
            return Err(MarketError::Clearing {
                day: ctx.day,
                interval: ctx.interval,
                reason: "no GenCo offers".to_string(),
            });
        }
        if self.cleared_day != Some(ctx.day) {
            self.day_ahead = Some(self.price_day(ctx.registry));
            self.real_time.clear();
            self.cleared_day = Some(ctx.day);
            debug!("day-ahead market cleared for day {}", ctx.day);
        }

        let hour_prices = self
            .day_ahead
            .as_ref()
            .and_then(|da| da.get(ctx.hour as usize))
            .ok_or(MarketError::NoSolution(ctx.day))?
            .clone();
        let noise_std = self.config.noise_std;
        let rt: Vec<f64> = hour_prices
            .iter()
            .map(|p| (p + gaussian_noise(&mut self.rng, noise_std)).max(0.0))
            .collect();

        let slot = ctx.interval as usize;
        if self.real_time.len() <= slot {
            self.real_time.resize(slot + 1, Vec::new());
        }
        self.real_time[slot] = rt;
        Ok(())
    }

    fn day_ahead_lmp(&self) -> Option<&[Vec<f64>]> {
        self.day_ahead.as_deref()
    }

    fn real_time_lmp(&self, interval: u32) -> Option<&[f64]> {
        self.real_time
            .get(interval as usize)
            .filter(|v| !v.is_empty())
            .map(Vec::as_slice)
    }

    fn finalize_last_day(&mut self) -> Result<(), MarketError> {
        let day = self
            .cleared_day
            .ok_or_else(|| MarketError::Settlement("no day was cleared".to_string()))?;
        self.settled = true;
        info!("last-day settlement complete for day {day}");
        Ok(())
    }
}
