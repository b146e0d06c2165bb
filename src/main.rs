//! Co-simulation entry point: CLI wiring and config-driven driver construction.

use std::process;

use log::info;

use wpm_cosim::agents::AgentRegistry;
use wpm_cosim::archive::DailyArchive;
use wpm_cosim::bus::InMemoryBus;
use wpm_cosim::cli::{CliOptions, parse_args, print_usage};
use wpm_cosim::config::ScenarioConfig;
use wpm_cosim::error::SimError;
use wpm_cosim::io::export::{export_archive, export_ticks};
use wpm_cosim::learning::SeededLearner;
use wpm_cosim::market::SyntheticMarket;
use wpm_cosim::sim::driver::TickDriver;
use wpm_cosim::sim::sync::LockstepAuthority;
use wpm_cosim::sim::types::RunSummary;

/// Seed offset for the learning stand-in so it does not share a stream
/// with the market.
const LEARNER_SEED_OFFSET: u64 = 57;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            process::exit(1);
        }
    };
    if cli.help {
        print_usage();
        return;
    }

    // --scenario takes priority, then --preset
    let loaded = match (&cli.scenario, &cli.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path),
        (None, Some(name)) => ScenarioConfig::from_preset(name),
        (None, None) => Ok(ScenarioConfig::baseline()),
    };
    let mut scenario = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    cli.apply_overrides(&mut scenario);

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let registry = match AgentRegistry::from_config(&scenario) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let seed = scenario.simulation.seed;
    let market = SyntheticMarket::new(&scenario.market, seed);
    let learner = SeededLearner::new(
        &registry.action_domain_shapes(),
        &scenario.stopping,
        seed.wrapping_add(LEARNER_SEED_OFFSET),
    );

    let mut driver = match TickDriver::new(
        scenario,
        registry,
        LockstepAuthority::new(),
        InMemoryBus::new(),
        market,
        learner,
    ) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let summary = match driver.run() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    info!(
        "{} publication(s) on the event bus",
        driver.bus().published().len()
    );
    println!("{summary}");

    if let Err(e) = write_exports(&cli, &summary, driver.archive()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn write_exports(cli: &CliOptions, summary: &RunSummary, archive: &DailyArchive) -> Result<(), SimError> {
    if let Some(ref path) = cli.ticks_out {
        export_ticks(&summary.records, path)?;
        eprintln!("Tick records written to {}", path.display());
    }
    if let Some(ref path) = cli.archive_out {
        export_archive(archive, path)?;
        eprintln!("Day-ahead archive written to {}", path.display());
    }
    Ok(())
}
