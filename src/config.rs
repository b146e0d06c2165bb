//! TOML-based scenario configuration and preset definitions.

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::sim::clock::{HOURS_PER_DAY, MINUTES_PER_HOUR};

/// Top-level scenario configuration parsed from TOML.
///
/// Every section has a default matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Timing, seed and bus switch.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Parameters of the synthetic clearing collaborator.
    #[serde(default)]
    pub market: MarketConfig,
    /// Stopping rules; a rule is enabled by the presence of its settings.
    #[serde(default = "StoppingConfig::baseline")]
    pub stopping: StoppingConfig,
    /// Event-bus topic names.
    #[serde(default)]
    pub bus: BusConfig,
    /// Non-dispatchable forecast handling.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Agent population.
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Master random seed.
    pub seed: u64,
    /// Real-time sub-interval length in minutes (must divide 60).
    pub sub_interval_minutes: u32,
    /// Whether the external event bus is connected.
    pub event_bus: bool,
    /// Hour at which day-ahead results are released (minute 0).
    pub day_ahead_publish_hour: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 695_672_061,
            sub_interval_minutes: 5,
            event_bus: true,
            day_ahead_publish_hour: 17,
        }
    }
}

/// Synthetic market-clearing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketConfig {
    /// Number of buses in the network.
    pub nodes: usize,
    /// 1-based bus whose day-ahead LMPs are published.
    pub published_node: usize,
    /// Base price ($/MWh).
    pub base_price: f64,
    /// Price swing between the lightest and heaviest load hour ($/MWh).
    pub price_spread: f64,
    /// Gaussian noise standard deviation on real-time prices ($/MWh).
    pub noise_std: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            nodes: 5,
            published_node: 3,
            base_price: 25.0,
            price_spread: 12.0,
            noise_std: 1.5,
        }
    }
}

/// Consecutive-day convergence window shared by rules 3, 4 and 5.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckWindow {
    /// First day the check is evaluated (>= 1).
    pub start_day: u32,
    /// Number of consecutive days the difference must stay under threshold.
    pub day_length: u32,
    /// Maximum allowed day-over-day difference.
    pub threshold: f64,
}

/// Stopping-rule settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoppingConfig {
    /// Rule 1: stop at hour 23 of this day.
    pub max_day: Option<u32>,
    /// Rule 2: required single-action probability (gated by rule 1).
    pub threshold_probability: Option<f64>,
    /// Rule 3: action-probability consistency window.
    pub action_probability: Option<CheckWindow>,
    /// Rule 4: learning-result stability window.
    pub learning_result: Option<CheckWindow>,
    /// Rule 5: daily net earning threshold window.
    pub daily_net_earning: Option<CheckWindow>,
}

impl StoppingConfig {
    /// Baseline rules: a one-week horizon with threshold probability.
    pub fn baseline() -> Self {
        Self {
            max_day: Some(7),
            threshold_probability: Some(0.999),
            ..Self::default()
        }
    }

    /// Whether at least one rule can end the run.
    pub fn any_enabled(&self) -> bool {
        self.max_day.is_some()
            || self.threshold_probability.is_some()
            || self.action_probability.is_some()
            || self.learning_result.is_some()
            || self.daily_net_earning.is_some()
    }
}

/// Topic names on the shared event bus.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub day_ahead_topic: String,
    pub real_time_topic: String,
    /// Prefix of per-hour day-ahead NDG forecast topics (`<prefix><hour>`).
    pub forecast_topic_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            day_ahead_topic: "DailyLMP".to_string(),
            real_time_topic: "RTLMP".to_string(),
            forecast_topic_prefix: "ndgenforecastDAM_h".to_string(),
        }
    }
}

/// Non-dispatchable forecast handling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Keep forecasts received over the bus instead of reverting to the
    /// intrinsic profile after ingestion.
    pub adopt_bus_values: bool,
}

/// GenCo definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenCoConfig {
    pub name: String,
    /// 1-based bus.
    pub node: usize,
    pub capacity_mw: f64,
    /// Marginal cost ($/MWh).
    pub marginal_cost: f64,
    /// Action-domain grid sizes; all three equal to 1 means a fixed action.
    #[serde(default = "default_grid")]
    pub lower_ri_count: u32,
    #[serde(default = "default_grid")]
    pub upper_ri_count: u32,
    #[serde(default = "default_cap_grid")]
    pub upper_cap_count: u32,
}

fn default_grid() -> u32 {
    10
}

fn default_cap_grid() -> u32 {
    1
}

/// Load-serving entity with a fixed hourly demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LseConfig {
    pub name: String,
    pub node: usize,
    /// 24 hourly demand values (MW).
    pub demand_mw: Vec<f64>,
}

/// Non-dispatchable generator with an intrinsic hourly profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NdgConfig {
    pub name: String,
    pub node: usize,
    /// 24 hourly output values (MW).
    pub profile_mw: Vec<f64>,
}

/// Storage unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub name: String,
    pub node: usize,
    pub capacity_mwh: f64,
    pub max_power_mw: f64,
}

/// Agent population.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsConfig {
    pub genco: Vec<GenCoConfig>,
    pub lse: Vec<LseConfig>,
    pub ndg: Vec<NdgConfig>,
    pub storage: Vec<StorageConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        let genco = |name: &str, node, capacity_mw, marginal_cost| GenCoConfig {
            name: name.to_string(),
            node,
            capacity_mw,
            marginal_cost,
            lower_ri_count: default_grid(),
            upper_ri_count: default_grid(),
            upper_cap_count: default_cap_grid(),
        };
        Self {
            genco: vec![
                genco("GenCo1", 1, 110.0, 14.0),
                genco("GenCo2", 1, 100.0, 15.0),
                genco("GenCo3", 3, 520.0, 30.0),
                genco("GenCo4", 4, 200.0, 30.0),
                genco("GenCo5", 5, 600.0, 10.0),
            ],
            lse: vec![
                LseConfig {
                    name: "LSE1".to_string(),
                    node: 2,
                    demand_mw: daily_shape(300.0, 60.0),
                },
                LseConfig {
                    name: "LSE2".to_string(),
                    node: 3,
                    demand_mw: daily_shape(300.0, 60.0),
                },
                LseConfig {
                    name: "LSE3".to_string(),
                    node: 4,
                    demand_mw: daily_shape(250.0, 50.0),
                },
            ],
            ndg: vec![NdgConfig {
                name: "Wind1".to_string(),
                node: 5,
                profile_mw: daily_shape(40.0, -15.0),
            }],
            storage: vec![StorageConfig {
                name: "Storage1".to_string(),
                node: 2,
                capacity_mwh: 100.0,
                max_power_mw: 25.0,
            }],
        }
    }
}

/// Hourly sinusoid peaking mid-afternoon: `mean + amplitude * sin(...)`.
pub fn daily_shape(mean: f64, amplitude: f64) -> Vec<f64> {
    (0..HOURS_PER_DAY)
        .map(|h| mean + amplitude * ((f64::from(h) - 9.0) * PI / 12.0).sin())
        .collect()
}

impl ScenarioConfig {
    /// Returns the baseline scenario: one week on the 5-bus system.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            market: MarketConfig::default(),
            stopping: StoppingConfig::baseline(),
            bus: BusConfig::default(),
            forecast: ForecastConfig::default(),
            agents: AgentsConfig::default(),
        }
    }

    /// Returns the convergence preset: long horizon that is expected to end
    /// early through the learning windows (rules 3 to 5).
    pub fn convergence() -> Self {
        let window = |threshold| CheckWindow {
            start_day: 2,
            day_length: 3,
            threshold,
        };
        Self {
            stopping: StoppingConfig {
                max_day: Some(60),
                threshold_probability: Some(0.999),
                action_probability: Some(window(0.001)),
                learning_result: Some(window(0.5)),
                daily_net_earning: Some(window(25.0)),
            },
            ..Self::baseline()
        }
    }

    /// Returns the standalone preset: no event bus and a three-day horizon.
    pub fn standalone() -> Self {
        Self {
            simulation: SimulationConfig {
                event_bus: false,
                ..SimulationConfig::default()
            },
            stopping: StoppingConfig {
                max_day: Some(3),
                ..StoppingConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "convergence", "standalone"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "convergence" => Ok(Self::convergence()),
            "standalone" => Ok(Self::standalone()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        if s.sub_interval_minutes == 0 || MINUTES_PER_HOUR % s.sub_interval_minutes != 0 {
            errors.push(ConfigError::new(
                "simulation.sub_interval_minutes",
                format!("must evenly divide 60, got {}", s.sub_interval_minutes),
            ));
        }
        if s.day_ahead_publish_hour >= HOURS_PER_DAY {
            errors.push(ConfigError::new(
                "simulation.day_ahead_publish_hour",
                "must be < 24",
            ));
        }

        self.validate_stopping(&mut errors);

        let m = &self.market;
        if m.nodes == 0 {
            errors.push(ConfigError::new("market.nodes", "must be > 0"));
        }
        if m.published_node == 0 || m.published_node > m.nodes {
            errors.push(ConfigError::new(
                "market.published_node",
                format!("must be in [1, {}]", m.nodes),
            ));
        }
        if !m.noise_std.is_finite() || m.noise_std < 0.0 {
            errors.push(ConfigError::new("market.noise_std", "must be >= 0"));
        }

        let b = &self.bus;
        for (field, topic) in [
            ("bus.day_ahead_topic", &b.day_ahead_topic),
            ("bus.real_time_topic", &b.real_time_topic),
            ("bus.forecast_topic_prefix", &b.forecast_topic_prefix),
        ] {
            if topic.trim().is_empty() {
                errors.push(ConfigError::new(field, "must not be empty"));
            }
        }

        self.validate_agents(&mut errors);
        errors
    }

    fn validate_stopping(&self, errors: &mut Vec<ConfigError>) {
        let st = &self.stopping;
        if !st.any_enabled() {
            errors.push(ConfigError::new(
                "stopping",
                "no stopping rule enabled; the run would never end",
            ));
        }
        if st.max_day == Some(0) {
            errors.push(ConfigError::new("stopping.max_day", "must be >= 1"));
        }
        if let Some(p) = st.threshold_probability {
            if !(p > 0.0 && p <= 1.0) {
                errors.push(ConfigError::new(
                    "stopping.threshold_probability",
                    "must be in (0.0, 1.0]",
                ));
            }
            if st.max_day.is_none() {
                errors.push(ConfigError::new(
                    "stopping.threshold_probability",
                    "requires stopping.max_day",
                ));
            }
        }
        for (name, window) in [
            ("action_probability", st.action_probability),
            ("learning_result", st.learning_result),
            ("daily_net_earning", st.daily_net_earning),
        ] {
            let Some(w) = window else { continue };
            if w.start_day == 0 {
                errors.push(ConfigError::new(
                    format!("stopping.{name}.start_day"),
                    "must be >= 1",
                ));
            }
            if w.day_length == 0 {
                errors.push(ConfigError::new(
                    format!("stopping.{name}.day_length"),
                    "must be >= 1",
                ));
            }
            if !w.threshold.is_finite() || w.threshold < 0.0 {
                errors.push(ConfigError::new(
                    format!("stopping.{name}.threshold"),
                    "must be a finite value >= 0",
                ));
            }
        }
    }

    fn validate_agents(&self, errors: &mut Vec<ConfigError>) {
        let a = &self.agents;
        let nodes = self.market.nodes;
        let hours = HOURS_PER_DAY as usize;

        if a.genco.is_empty() {
            errors.push(ConfigError::new("agents.genco", "at least one GenCo is required"));
        }
        let mut seen = std::collections::HashSet::new();
        for (i, g) in a.genco.iter().enumerate() {
            if !seen.insert(g.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("agents.genco[{i}].name"),
                    format!("duplicate GenCo name \"{}\"", g.name),
                ));
            }
            if g.lower_ri_count == 0 || g.upper_ri_count == 0 || g.upper_cap_count == 0 {
                errors.push(ConfigError::new(
                    format!("agents.genco[{i}]"),
                    "action-domain grid sizes must be >= 1",
                ));
            }
        }

        let placements = a
            .genco
            .iter()
            .map(|g| ("genco", g.node))
            .chain(a.lse.iter().map(|l| ("lse", l.node)))
            .chain(a.ndg.iter().map(|n| ("ndg", n.node)))
            .chain(a.storage.iter().map(|s| ("storage", s.node)));
        let mut counters = std::collections::HashMap::new();
        for (kind, node) in placements {
            let i = counters.entry(kind).or_insert(0_usize);
            if node == 0 || node > nodes {
                errors.push(ConfigError::new(
                    format!("agents.{kind}[{i}].node"),
                    format!("must be in [1, {nodes}]"),
                ));
            }
            *i += 1;
        }

        for (i, l) in a.lse.iter().enumerate() {
            if l.demand_mw.len() != hours {
                errors.push(ConfigError::new(
                    format!("agents.lse[{i}].demand_mw"),
                    format!("must have {hours} hourly values, got {}", l.demand_mw.len()),
                ));
            }
        }
        for (i, n) in a.ndg.iter().enumerate() {
            if n.profile_mw.len() != hours {
                errors.push(ConfigError::new(
                    format!("agents.ndg[{i}].profile_mw"),
                    format!("must have {hours} hourly values, got {}", n.profile_mw.len()),
                ));
            }
        }
    }
}
