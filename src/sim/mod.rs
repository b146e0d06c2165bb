/// Simulated wall clock in 5-minute ticks.
pub mod clock;
pub mod driver;
/// Stopping-rule evaluation and explanation.
pub mod stopping;
/// Barrier crossing against the co-simulation time authority.
pub mod sync;
pub mod types;
