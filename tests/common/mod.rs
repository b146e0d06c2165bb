//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use wpm_cosim::agents::AgentRegistry;
use wpm_cosim::bus::InMemoryBus;
use wpm_cosim::config::{ScenarioConfig, StoppingConfig};
use wpm_cosim::learning::{ConvergenceFlags, FixedFlags, SeededLearner};
use wpm_cosim::market::SyntheticMarket;
use wpm_cosim::sim::driver::TickDriver;
use wpm_cosim::sim::sync::{LockstepAuthority, TimeAuthority};

pub type FixedDriver<A> = TickDriver<A, InMemoryBus, SyntheticMarket, FixedFlags>;
pub type LearningDriver = TickDriver<LockstepAuthority, InMemoryBus, SyntheticMarket, SeededLearner>;

/// Baseline scenario with only the maximum-day rule enabled.
pub fn max_day_scenario(max_day: u32) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.stopping = StoppingConfig {
        max_day: Some(max_day),
        ..StoppingConfig::default()
    };
    cfg
}

/// Driver with the given authority and fixed convergence flags.
pub fn fixed_driver<A: TimeAuthority>(
    cfg: ScenarioConfig,
    authority: A,
    flags: ConvergenceFlags,
) -> FixedDriver<A> {
    let _ = env_logger::try_init();
    let registry = AgentRegistry::from_config(&cfg).expect("registry should build");
    let market = SyntheticMarket::new(&cfg.market, cfg.simulation.seed);
    TickDriver::new(cfg, registry, authority, InMemoryBus::new(), market, FixedFlags(flags))
        .expect("config should validate")
}

/// Lockstep driver with no convergence information.
pub fn lockstep_driver(cfg: ScenarioConfig) -> FixedDriver<LockstepAuthority> {
    fixed_driver(cfg, LockstepAuthority::new(), ConvergenceFlags::default())
}

/// Driver wired the way the binary wires it.
pub fn learning_driver(cfg: ScenarioConfig) -> LearningDriver {
    let _ = env_logger::try_init();
    let registry = AgentRegistry::from_config(&cfg).expect("registry should build");
    let seed = cfg.simulation.seed;
    let market = SyntheticMarket::new(&cfg.market, seed);
    let learner = SeededLearner::new(&registry.action_domain_shapes(), &cfg.stopping, seed + 57);
    TickDriver::new(
        cfg,
        registry,
        LockstepAuthority::new(),
        InMemoryBus::new(),
        market,
        learner,
    )
    .expect("config should validate")
}

/// Splits a published payload into its values.
pub fn payload_values(payload: &str) -> Vec<f64> {
    payload
        .split(", ")
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().expect("payload value should parse"))
        .collect()
}
