use std::env;
use std::path::PathBuf;

use crate::config::ScenarioConfig;

#[derive(Debug, Default)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub max_day: Option<u32>,
    pub ticks_out: Option<PathBuf>,
    pub archive_out: Option<PathBuf>,
    pub help: bool,
}

impl CliOptions {
    /// Applies `--seed` and `--max-day` on top of a loaded scenario.
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(max_day) = self.max_day {
            config.stopping.max_day = Some(max_day);
        }
    }
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions::default();

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if opts.scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--max-day" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --max-day (expected a day number)")?;
                let day = raw
                    .parse::<u32>()
                    .map_err(|_| format!("--max-day value \"{raw}\" is not a valid day number"))?;
                opts.max_day = Some(day);
            }
            "--ticks-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --ticks-out (expected a file path)")?;
                if opts.ticks_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--ticks-out provided more than once".to_string());
                }
            }
            "--archive-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --archive-out (expected a file path)")?;
                if opts.archive_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--archive-out provided more than once".to_string());
                }
            }
            "--help" | "-h" => {
                opts.help = true;
                return Ok(opts);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if opts.scenario.is_none() && opts.preset.is_none() {
        opts.preset = Some("baseline".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("wpm-cosim - wholesale power market co-simulation driver");
    eprintln!();
    eprintln!("Usage: wpm-cosim [--scenario <path> | --preset <name>] [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>      Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>        Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>           Override random seed");
    eprintln!("  --max-day <u32>        Override the maximum day (stopping rule 1)");
    eprintln!("  --ticks-out <path>     Export tick records to CSV");
    eprintln!("  --archive-out <path>   Export archived day-ahead LMPs to CSV");
    eprintln!("  --help                 Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}
